//! # Host configuration
//!
//! One default host per thread, installed once before anything is adapted:
//!
//! ```ignore
//! enhook_core::install_host(Rc::new(my_runtime))?;
//! let f = enhook_core::adapt(counter, Options::new())?;
//! ```
//!
//! Replacing the default host while adapters created from it are still alive
//! is refused with [`ConfigurationError::HostLocked`]. A single adapter can
//! bypass the default with [`Options::host`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ConfigurationError;
use crate::host::Host;
use crate::pool;

/// Nested renders a mount may run within one tick before it is suspended.
pub const RECURSION_LIMIT: u32 = 25;

thread_local! {
    static DEFAULT_HOST: RefCell<Option<Rc<dyn Host>>> = const { RefCell::new(None) };
}

/// Installs the default host for this thread.
pub fn install_host(host: Rc<dyn Host>) -> Result<(), ConfigurationError> {
    ensure_unlocked()?;
    DEFAULT_HOST.with(|h| *h.borrow_mut() = Some(host));
    log::debug!("default host installed");
    Ok(())
}

/// Removes the default host, returning it.
pub fn uninstall_host() -> Result<Option<Rc<dyn Host>>, ConfigurationError> {
    ensure_unlocked()?;
    Ok(DEFAULT_HOST.with(|h| h.borrow_mut().take()))
}

pub fn default_host() -> Option<Rc<dyn Host>> {
    DEFAULT_HOST.with(|h| h.borrow().clone())
}

fn ensure_unlocked() -> Result<(), ConfigurationError> {
    let live = pool::default_host_users();
    if live > 0 {
        return Err(ConfigurationError::HostLocked { live });
    }
    Ok(())
}

/// Per-adapter options.
#[derive(Clone, Default)]
pub struct Options {
    /// Return the last captured value instead of waiting for a deferred render.
    pub passive: bool,
    /// Host for this adapter only; falls back to the default host.
    pub host: Option<Rc<dyn Host>>,
    /// Name used in errors and logs.
    pub name: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    pub fn host(mut self, host: Rc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The host to use and whether it is the shared default.
    pub(crate) fn resolve_host(&self) -> Result<(Rc<dyn Host>, bool), ConfigurationError> {
        if let Some(host) = &self.host {
            return Ok((host.clone(), false));
        }
        default_host()
            .map(|h| (h, true))
            .ok_or(ConfigurationError::NoHost)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("passive", &self.passive)
            .field("host", &self.host.is_some())
            .field("name", &self.name)
            .finish()
    }
}
