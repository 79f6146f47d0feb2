//! # Host capability
//!
//! A host is whatever runtime actually implements the state primitives
//! (value cells, effects, memos). The adapter only needs it to do three
//! things: wrap a component body into an element, render that element into
//! a mount target, and unmount the target again.
//!
//! Hosts come in two shapes:
//!
//! - synchronous hosts run the component body inside `render` and return
//!   [`Commit::Committed`];
//! - batching hosts queue the work and return [`Commit::Deferred`]. They
//!   should implement [`Host::flush`] so a caller that needs the value now
//!   can drive the pending render to completion.
//!
//! Implement [`Host`] directly, or assemble one from closures with
//! [`HostBuilder`] when adapting an existing runtime is just a few lines of
//! glue.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::ConfigurationError;

/// Opaque handle to the off-screen container of one virtual mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountTarget(pub(crate) u64);

impl MountTarget {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mount#{}", self.0)
    }
}

/// Component body handed to the host. Runs the wrapped function against one
/// bound call frame; the host calls it every time it renders the element.
pub type Component = Rc<dyn Fn()>;

/// Result of asking the host to render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commit {
    /// The component body already ran.
    Committed,
    /// The render was queued and will run on the host's scheduler.
    Deferred,
}

/// Host-side element: the component body plus whatever the host wants to
/// carry along with it.
pub struct Element {
    component: Component,
    name: Option<Rc<str>>,
    payload: Option<Box<dyn Any>>,
}

impl Element {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            name: None,
            payload: None,
        }
    }

    pub fn named(mut self, name: impl Into<Rc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_payload<T: 'static>(mut self, payload: T) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Runs the component body once.
    pub fn render(&self) {
        (self.component)()
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

pub trait Host {
    fn create_element(&self, component: Component, name: Option<&str>) -> Element;

    fn render(&self, element: Element, target: MountTarget) -> Commit;

    /// Tears the target down and runs the cleanups of every committed effect.
    ///
    /// May be called while the target is rendering; the host must then finish
    /// the render first and unmount afterwards.
    fn unmount(&self, target: MountTarget);

    /// Runs any render queued for `target` right now.
    fn flush(&self, _target: MountTarget) {}

    /// Renders `target` again on a later tick. Called for a mount whose
    /// self-triggered renders were paused for the rest of the current tick,
    /// so the update that was held back still lands.
    fn schedule(&self, _target: MountTarget) {}

    /// Current scheduling tick (frame number). Hosts without frames report 0.
    fn tick(&self) -> u64 {
        0
    }
}

type CreateFn = Box<dyn Fn(Component, Option<&str>) -> Element>;
type RenderFn = Box<dyn Fn(Element, MountTarget) -> Commit>;
type TargetFn = Box<dyn Fn(MountTarget)>;
type TickFn = Box<dyn Fn() -> u64>;

/// Assembles a [`Host`] out of closures.
///
/// ```
/// use enhook_core::{Commit, Element, HostBuilder};
///
/// let host = HostBuilder::new()
///     .create_element(|component, _name| Element::new(component))
///     .render(|element, _target| {
///         element.render();
///         Commit::Committed
///     })
///     .build()
///     .unwrap();
/// # let _ = host;
/// ```
#[derive(Default)]
pub struct HostBuilder {
    create_element: Option<CreateFn>,
    render: Option<RenderFn>,
    unmount: Option<TargetFn>,
    flush: Option<TargetFn>,
    schedule: Option<TargetFn>,
    tick: Option<TickFn>,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(
        mut self,
        f: impl Fn(Component, Option<&str>) -> Element + 'static,
    ) -> Self {
        self.create_element = Some(Box::new(f));
        self
    }

    pub fn render(mut self, f: impl Fn(Element, MountTarget) -> Commit + 'static) -> Self {
        self.render = Some(Box::new(f));
        self
    }

    pub fn unmount(mut self, f: impl Fn(MountTarget) + 'static) -> Self {
        self.unmount = Some(Box::new(f));
        self
    }

    pub fn flush(mut self, f: impl Fn(MountTarget) + 'static) -> Self {
        self.flush = Some(Box::new(f));
        self
    }

    pub fn schedule(mut self, f: impl Fn(MountTarget) + 'static) -> Self {
        self.schedule = Some(Box::new(f));
        self
    }

    pub fn tick(mut self, f: impl Fn() -> u64 + 'static) -> Self {
        self.tick = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<FnHost, ConfigurationError> {
        let create_element = self
            .create_element
            .ok_or(ConfigurationError::MissingCapability("create_element"))?;
        let render = self
            .render
            .ok_or(ConfigurationError::MissingCapability("render"))?;
        Ok(FnHost {
            create_element,
            render,
            unmount: self.unmount,
            flush: self.flush,
            schedule: self.schedule,
            tick: self.tick,
        })
    }
}

/// Host built by [`HostBuilder`].
pub struct FnHost {
    create_element: CreateFn,
    render: RenderFn,
    unmount: Option<TargetFn>,
    flush: Option<TargetFn>,
    schedule: Option<TargetFn>,
    tick: Option<TickFn>,
}

impl Host for FnHost {
    fn create_element(&self, component: Component, name: Option<&str>) -> Element {
        (self.create_element)(component, name)
    }

    fn render(&self, element: Element, target: MountTarget) -> Commit {
        (self.render)(element, target)
    }

    fn unmount(&self, target: MountTarget) {
        match &self.unmount {
            Some(f) => f(target),
            None => log::debug!("{target}: host has no unmount; cleanups will not run"),
        }
    }

    fn flush(&self, target: MountTarget) {
        if let Some(f) = &self.flush {
            f(target);
        }
    }

    fn schedule(&self, target: MountTarget) {
        if let Some(f) = &self.schedule {
            f(target);
        }
    }

    fn tick(&self) -> u64 {
        self.tick.as_ref().map(|f| f()).unwrap_or(0)
    }
}
