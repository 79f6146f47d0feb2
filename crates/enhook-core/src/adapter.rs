//! # Invocation adapter
//!
//! [`adapt`] turns a function that uses host state primitives into a
//! [`Hooked`] handle that can be called like a plain function:
//!
//! ```ignore
//! let counter = adapt(|_: &(), step: &i32| {
//!     let (count, set_count) = use_state(|| 0);
//!     use_effect_with(*step, move || set_count.update(|c| c + 1));
//!     count
//! }, Options::new())?;
//!
//! assert_eq!(counter.call(1)?, 0);
//! ```
//!
//! Every handle owns one virtual mount. The first call creates it; each
//! later call renders the same mount again so state survives between calls.
//! Renders the host runs on its own (a state update from inside the
//! function, an effect, a timer) replay the context and arguments of the
//! call that produced the current element.
//!
//! In the default mode a call always returns the value of its own render,
//! flushing the host if it deferred. In passive mode a call after the first
//! one returns the last captured value when the host defers, and the
//! deferred render catches up on the host's schedule.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::config::{Options, RECURSION_LIMIT};
use crate::error::{ConfigurationError, EnhookError, RecursionLimitExceeded, Result};
use crate::governor::{Governor, Verdict};
use crate::host::{Commit, Component, Host};
use crate::pool::{self, AdapterId, MountState};

/// Context and arguments of one external call, frozen for every render it
/// causes.
struct CallFrame<C, A> {
    generation: u64,
    ctx: C,
    args: A,
}

/// The external call a render is expected to answer.
struct Request {
    generation: u64,
    /// The caller is still on the stack waiting for the outcome.
    listening: bool,
}

struct Mount<R> {
    generation: u64,
    rendered_generation: u64,
    request: Option<Request>,
    outcome: Option<std::thread::Result<R>>,
    captured: Option<R>,
}

impl<R> Default for Mount<R> {
    fn default() -> Self {
        Self {
            generation: 0,
            rendered_generation: 0,
            request: None,
            outcome: None,
            captured: None,
        }
    }
}

struct Shared<C, A, R> {
    id: AdapterId,
    name: String,
    passive: bool,
    host: Rc<dyn Host>,
    func: Box<dyn Fn(&C, &A) -> R>,
    mount: RefCell<Mount<R>>,
    governor: RefCell<Governor>,
    rendering: Cell<bool>,
    destroyed: Cell<bool>,
}

/// A stateful function turned into a plain callable.
pub struct Hooked<C, A, R> {
    shared: Rc<Shared<C, A, R>>,
}

impl<C, A, R> Clone for Hooked<C, A, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Wraps `func` into a [`Hooked`] backed by its own virtual mount.
///
/// Fails only when no host can be resolved from `options` or the default.
pub fn adapt<C, A, R, F>(func: F, options: Options) -> Result<Hooked<C, A, R>, ConfigurationError>
where
    F: Fn(&C, &A) -> R + 'static,
    C: 'static,
    A: 'static,
    R: Clone + 'static,
{
    let (host, default_host) = options.resolve_host()?;
    let id = pool::register(default_host);
    let name = options
        .name
        .unwrap_or_else(|| std::any::type_name::<F>().to_string());
    log::debug!("adapted `{name}` (passive: {})", options.passive);

    Ok(Hooked {
        shared: Rc::new(Shared {
            id,
            name,
            passive: options.passive,
            host,
            func: Box::new(func),
            mount: RefCell::new(Mount::default()),
            governor: RefCell::new(Governor::new(RECURSION_LIMIT)),
            rendering: Cell::new(false),
            destroyed: Cell::new(false),
        }),
    })
}

impl<C: 'static, A: 'static, R: Clone + 'static> Hooked<C, A, R> {
    /// Calls the function with an explicit context.
    pub fn call_with(&self, ctx: C, args: A) -> Result<R> {
        let s = &self.shared;
        if s.destroyed.get() {
            return Err(s.use_after_destroy());
        }
        if s.rendering.get() {
            return Err(EnhookError::Reentrant {
                name: s.name.clone(),
            });
        }
        let target = pool::get(s.id).map_err(|_| s.use_after_destroy())?;
        s.governor.borrow_mut().reset(s.host.tick());

        let (frame, awaited) = {
            let mut m = s.mount.borrow_mut();
            m.generation += 1;
            m.outcome = None;
            m.request = Some(Request {
                generation: m.generation,
                listening: true,
            });
            let awaited = !s.passive || m.captured.is_none();
            let frame = Rc::new(CallFrame {
                generation: m.generation,
                ctx,
                args,
            });
            (frame, awaited)
        };

        log::trace!("{}: render #{} into {target}", s.name, frame.generation);
        let element = s
            .host
            .create_element(Shared::component(s, frame), Some(&s.name));
        let commit = s.host.render(element, target);

        if commit == Commit::Deferred && awaited && s.outcome_pending() {
            s.host.flush(target);
        }

        let outcome = {
            let mut m = s.mount.borrow_mut();
            let outcome = m.outcome.take();
            if outcome.is_none() {
                if let Some(req) = m.request.as_mut() {
                    req.listening = false;
                }
                if !awaited && let Some(previous) = m.captured.clone() {
                    return Ok(previous);
                }
            }
            outcome
        };

        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(payload)) => panic::resume_unwind(payload),
            None if s.destroyed.get() => Err(s.use_after_destroy()),
            None => Err(EnhookError::CommitPending {
                name: s.name.clone(),
            }),
        }
    }

    /// Tears the virtual mount down. Cleanups registered by the function run
    /// once; later calls fail with [`EnhookError::UseAfterDestroy`]. Calling
    /// it again does nothing.
    pub fn unhook(&self) {
        let s = &self.shared;
        if s.destroyed.replace(true) {
            return;
        }
        s.mount.borrow_mut().request = None;
        if let Some(target) = pool::destroy(s.id) {
            log::debug!("{}: unhooking {target}", s.name);
            s.host.unmount(target);
        }
    }

    /// Last value the function produced, from any render.
    pub fn last_value(&self) -> Option<R> {
        self.shared.mount.borrow().captured.clone()
    }
}

impl<C: Default + 'static, A: 'static, R: Clone + 'static> Hooked<C, A, R> {
    /// Calls the function with a default context.
    pub fn call(&self, args: A) -> Result<R> {
        self.call_with(C::default(), args)
    }
}

impl<C, A, R> Hooked<C, A, R> {
    pub fn id(&self) -> AdapterId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_passive(&self) -> bool {
        self.shared.passive
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.get()
    }

    pub fn state(&self) -> MountState {
        pool::state(self.shared.id)
    }

    /// Number of external calls made so far.
    pub fn generation(&self) -> u64 {
        self.shared.mount.borrow().generation
    }

    /// Generation whose context and arguments produced the last value.
    pub fn rendered_generation(&self) -> u64 {
        self.shared.mount.borrow().rendered_generation
    }

    /// Whether self-triggered renders are paused for the current host tick.
    pub fn is_suspended(&self) -> bool {
        self.suspension().is_some()
    }

    /// The recursion warning in effect for the current host tick, if any.
    pub fn suspension(&self) -> Option<RecursionLimitExceeded> {
        let tick = self.shared.host.tick();
        let suspended = self.shared.governor.borrow().is_suspended(tick);
        suspended.then(|| self.shared.limit_exceeded(tick))
    }
}

impl<C, A, R> fmt::Debug for Hooked<C, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooked")
            .field("name", &self.shared.name)
            .field("passive", &self.shared.passive)
            .field("generation", &self.generation())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl<C: 'static, A: 'static, R: Clone + 'static> Shared<C, A, R> {
    fn component(this: &Rc<Self>, frame: Rc<CallFrame<C, A>>) -> Component {
        let weak = Rc::downgrade(this);
        Rc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.run(&frame);
            }
        })
    }

    /// One render of the wrapped function, as driven by the host.
    fn run(&self, frame: &CallFrame<C, A>) {
        if self.destroyed.get() {
            log::trace!("{}: render after unhook skipped", self.name);
            return;
        }

        let (requested, listening) = match &self.mount.borrow().request {
            Some(req) if req.generation == frame.generation => (true, req.listening),
            _ => (false, false),
        };

        if !requested {
            let tick = self.host.tick();
            let verdict = self.governor.borrow_mut().enter_nested(tick);
            match verdict {
                Verdict::Proceed => {}
                Verdict::Tripped => {
                    log::warn!("{}", self.limit_exceeded(tick));
                    self.resume_next_tick();
                    return;
                }
                Verdict::Suspended => {
                    self.resume_next_tick();
                    return;
                }
            }
        }

        if self.rendering.replace(true) {
            log::warn!("{}: host re-entered a render in progress", self.name);
            return;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| (self.func)(&frame.ctx, &frame.args)));
        self.rendering.set(false);

        let mut m = self.mount.borrow_mut();
        if requested {
            m.request = None;
        }
        match result {
            Ok(value) => {
                m.rendered_generation = frame.generation;
                if listening {
                    m.outcome = Some(Ok(value.clone()));
                }
                m.captured = Some(value);
            }
            Err(payload) if listening => m.outcome = Some(Err(payload)),
            Err(payload) => log::error!(
                "{}: panic in a render with no caller: {}",
                self.name,
                panic_message(payload.as_ref())
            ),
        }
    }
}

impl<C, A, R> Shared<C, A, R> {
    fn use_after_destroy(&self) -> EnhookError {
        EnhookError::UseAfterDestroy {
            name: self.name.clone(),
        }
    }

    fn limit_exceeded(&self, tick: u64) -> RecursionLimitExceeded {
        RecursionLimitExceeded {
            name: self.name.clone(),
            tick,
            limit: RECURSION_LIMIT,
        }
    }

    /// The skipped render still owes the latest state; ask for it again once
    /// the tick is over.
    fn resume_next_tick(&self) {
        if let Ok(target) = pool::get(self.id) {
            self.host.schedule(target);
        }
    }

    fn outcome_pending(&self) -> bool {
        self.mount.borrow().outcome.is_none()
    }
}

impl<C, A, R> Drop for Shared<C, A, R> {
    fn drop(&mut self) {
        if !self.destroyed.replace(true)
            && let Some(target) = pool::destroy(self.id)
        {
            log::debug!("{}: dropped, unmounting {target}", self.name);
            self.host.unmount(target);
        }
        pool::release(self.id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
