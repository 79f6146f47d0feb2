//! # Hooks
//!
//! Order-dependent state primitives. They only work inside a component body
//! rendered by a [`HookRuntime`](crate::HookRuntime): the Nth hook call of a
//! render always resolves to the Nth stored slot, so hooks must be called in
//! the same order on every render.
//!
//! ```ignore
//! let (count, set_count) = use_state(|| 0);
//! use_effect_with((), move || {
//!     set_count.set(1);
//!     on_cleanup(|| log::info!("gone"))
//! });
//! ```
//!
//! Effects are queued by the render and committed at the end of the frame.
//! Layout effects commit right after the render that queued them. Either
//! kind may return a [`Cleanup`], which runs before the effect runs again and
//! when the mount is torn down.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::instance::{Flags, Instance, new_effect_state, with_current};

/// Cleanup returned by an effect. Runs at most once, however often it is
/// invoked.
#[derive(Clone, Default)]
pub struct Cleanup(Option<Rc<RefCell<Option<Box<dyn FnOnce()>>>>>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Rc::new(RefCell::new(Some(Box::new(f))))))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn run(&self) {
        let f = self.0.as_ref().and_then(|cell| cell.borrow_mut().take());
        if let Some(f) = f {
            f()
        }
    }
}

impl From<()> for Cleanup {
    fn from(_: ()) -> Self {
        Cleanup::none()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "Cleanup(..)" } else { "Cleanup(none)" })
    }
}

/// Helper to return a cleanup from an effect.
pub fn on_cleanup(f: impl FnOnce() + 'static) -> Cleanup {
    Cleanup::new(f)
}

/// Setter half of [`use_state`]. Cheap to clone; keeps working from effects,
/// timers and other components.
pub struct StateSetter<T> {
    cell: Rc<RefCell<T>>,
    instance: Weak<Instance>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> StateSetter<T> {
    /// Stores `value` and queues a render. Storing an equal value does
    /// nothing.
    pub fn set(&self, value: T) {
        {
            let mut cell = self.cell.borrow_mut();
            if *cell == value {
                return;
            }
            *cell = value;
        }
        self.invalidate();
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.cell.borrow());
        self.set(next);
    }

    /// Latest stored value, including updates not rendered yet.
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }

    fn invalidate(&self) {
        match self.instance.upgrade() {
            Some(instance) => instance.invalidate(),
            None => log::trace!("state set on a torn down mount; ignored"),
        }
    }
}

/// Persistent value cell.
pub fn use_state<T: Clone + PartialEq + 'static>(
    init: impl FnOnce() -> T,
) -> (T, StateSetter<T>) {
    with_current("use_state", |instance| {
        let cell = instance.slot(|| RefCell::new(init()));
        let value = cell.borrow().clone();
        (
            value,
            StateSetter {
                cell,
                instance: Rc::downgrade(instance),
            },
        )
    })
}

/// Dispatch half of [`use_reducer`].
pub struct Dispatch<S, A> {
    setter: StateSetter<S>,
    reducer: fn(&S, A) -> S,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            setter: self.setter.clone(),
            reducer: self.reducer,
        }
    }
}

impl<S: Clone + PartialEq + 'static, A> Dispatch<S, A> {
    pub fn dispatch(&self, action: A) {
        let reducer = self.reducer;
        self.setter.update(|s| reducer(s, action));
    }
}

pub fn use_reducer<S: Clone + PartialEq + 'static, A>(
    reducer: fn(&S, A) -> S,
    init: impl FnOnce() -> S,
) -> (S, Dispatch<S, A>) {
    let (state, setter) = use_state(init);
    (state, Dispatch { setter, reducer })
}

/// Mutable box that survives renders and never triggers one.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
    with_current("use_ref", |instance| instance.slot(|| RefCell::new(init())))
}

/// Recomputes only when `deps` differs from the previous render's.
pub fn use_memo<D, T>(deps: D, compute: impl FnOnce(&D) -> T) -> T
where
    D: PartialEq + 'static,
    T: Clone + 'static,
{
    with_current("use_memo", |instance| {
        let memo = instance.slot(|| RefCell::new(None::<(D, T)>));
        let mut memo = memo.borrow_mut();
        match memo.as_ref() {
            Some((prev, value)) if *prev == deps => value.clone(),
            _ => {
                let value = compute(&deps);
                *memo = Some((deps, value.clone()));
                value
            }
        }
    })
}

pub(crate) struct EffectState {
    pub deps: Option<Box<dyn Any>>,
    pub cleanup: Cleanup,
}

/// An effect queued by a render, waiting for commit.
pub(crate) struct EffectJob {
    state: Rc<RefCell<EffectState>>,
    run: Box<dyn FnOnce() -> Cleanup>,
}

impl EffectJob {
    pub fn commit(self) {
        let previous = std::mem::take(&mut self.state.borrow_mut().cleanup);
        previous.run();
        let cleanup = (self.run)();
        self.state.borrow_mut().cleanup = cleanup;
    }
}

fn queue_effect<D, C>(
    hook: &str,
    deps: Option<D>,
    effect: impl FnOnce() -> C + 'static,
    layout: bool,
) where
    D: PartialEq + 'static,
    C: Into<Cleanup>,
{
    with_current(hook, |instance| {
        let state = Rc::clone(&*instance.slot(|| new_effect_state(instance)));
        let changed = match (&deps, &state.borrow().deps) {
            (Some(next), Some(prev)) => prev.downcast_ref::<D>() != Some(next),
            _ => true,
        };
        if !changed {
            return;
        }
        state.borrow_mut().deps = deps.map(|d| Box::new(d) as Box<dyn Any>);
        let job = EffectJob {
            state: state.clone(),
            run: Box::new(move || effect().into()),
        };
        instance.push_effect(job, layout);
    })
}

/// Runs after every render.
pub fn use_effect<C: Into<Cleanup>>(effect: impl FnOnce() -> C + 'static) {
    queue_effect::<(), C>("use_effect", None, effect, false)
}

/// Runs after renders where `deps` changed, and after the first one.
pub fn use_effect_with<D, C>(deps: D, effect: impl FnOnce() -> C + 'static)
where
    D: PartialEq + 'static,
    C: Into<Cleanup>,
{
    queue_effect("use_effect_with", Some(deps), effect, false)
}

/// Like [`use_effect`], but commits right after the render.
pub fn use_layout_effect<C: Into<Cleanup>>(effect: impl FnOnce() -> C + 'static) {
    queue_effect::<(), C>("use_layout_effect", None, effect, true)
}

pub fn use_layout_effect_with<D, C>(deps: D, effect: impl FnOnce() -> C + 'static)
where
    D: PartialEq + 'static,
    C: Into<Cleanup>,
{
    queue_effect("use_layout_effect_with", Some(deps), effect, true)
}

/// Whether the calling component is in its first render.
pub fn is_first_render() -> bool {
    with_current("is_first_render", |instance| {
        instance.renders() == 0 && instance.flags().contains(Flags::RENDERING)
    })
}
