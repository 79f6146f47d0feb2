//! # enhook
//!
//! Hook-style state primitives (a value cell, an effect, a memo) only work
//! inside a host runtime's render cycle. This crate lets a function that uses
//! them be called like any other function:
//!
//! - [`adapt`] wraps the function into a [`Hooked`] handle;
//! - every handle owns a hidden *virtual mount* in the host, created on the
//!   first call and rendered again on every later call, so state carries
//!   over from one call to the next;
//! - [`Hooked::call_with`] returns the value of its own render even when the
//!   host batches renders;
//! - [`Hooked::unhook`] tears the mount down and runs the function's
//!   cleanups.
//!
//! The host is anything implementing [`Host`]. Install one per thread with
//! [`install_host`] or pass one per adapter through [`Options::host`].
//!
//! ## Self-triggered renders
//!
//! A state update from inside the function re-renders the mount on the
//! host's schedule, with the context and arguments of the call that last
//! rendered it. A function that updates its own state on every render would
//! loop forever; after [`RECURSION_LIMIT`] such renders in one host tick the
//! mount is suspended for the rest of that tick and a
//! [`RecursionLimitExceeded`] warning is logged. The held-back render is
//! handed to [`Host::schedule`] and runs on a later tick.
//!
//! ## Errors
//!
//! Configuration problems and calls after `unhook` come back as
//! [`EnhookError`]. A panic inside the function reaches the caller that
//! requested the render unchanged; a panic in a render nobody requested is
//! logged instead.

pub mod adapter;
pub mod config;
pub mod error;
mod governor;
pub mod host;
pub mod pool;


pub use adapter::{Hooked, adapt};
pub use config::{Options, RECURSION_LIMIT, default_host, install_host, uninstall_host};
pub use error::{ConfigurationError, EnhookError, RecursionLimitExceeded, Result};
pub use host::{Commit, Component, Element, FnHost, Host, HostBuilder, MountTarget};
pub use pool::{AdapterId, Destroyed, MountState};
