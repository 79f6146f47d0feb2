use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use enhook_core::{Element, MountTarget};
use smallvec::SmallVec;

use crate::hooks::{Cleanup, EffectJob, EffectState};
use crate::runtime::Inner;
use crate::scheduler::Job;

thread_local! {
    static CURRENT: RefCell<Vec<Rc<Instance>>> = const { RefCell::new(Vec::new()) };
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct Flags: u8 {
        /// A render is queued.
        const DIRTY = 1 << 0;
        const RENDERING = 1 << 1;
        /// Unmount was requested mid-render.
        const UNMOUNT_PENDING = 1 << 2;
        const UNMOUNTED = 1 << 3;
    }
}

/// Positional hook storage: the Nth hook call of a render gets the Nth slot.
#[derive(Default)]
struct Slots {
    slots: Vec<Box<dyn Any>>,
    cursor: usize,
}

/// Everything the runtime keeps for one mount target.
pub(crate) struct Instance {
    pub target: MountTarget,
    runtime: Weak<Inner>,
    element: RefCell<Option<Rc<Element>>>,
    slots: RefCell<Slots>,
    effects: RefCell<SmallVec<[EffectJob; 4]>>,
    layout_effects: RefCell<SmallVec<[EffectJob; 2]>>,
    effect_states: RefCell<Vec<Rc<RefCell<EffectState>>>>,
    flags: Cell<Flags>,
    renders: Cell<u64>,
}

impl Instance {
    pub fn new(target: MountTarget, runtime: Weak<Inner>) -> Self {
        Self {
            target,
            runtime,
            element: RefCell::new(None),
            slots: RefCell::new(Slots::default()),
            effects: RefCell::new(SmallVec::new()),
            layout_effects: RefCell::new(SmallVec::new()),
            effect_states: RefCell::new(Vec::new()),
            flags: Cell::new(Flags::empty()),
            renders: Cell::new(0),
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags.get()
    }

    pub fn set_flag(&self, flag: Flags, on: bool) {
        let mut f = self.flags.get();
        f.set(flag, on);
        self.flags.set(f);
    }

    pub fn renders(&self) -> u64 {
        self.renders.get()
    }

    pub fn set_element(&self, element: Element) {
        *self.element.borrow_mut() = Some(Rc::new(element));
    }

    pub fn element(&self) -> Option<Rc<Element>> {
        self.element.borrow().clone()
    }

    /// Queues a render unless one is already queued.
    pub fn invalidate(&self) {
        let flags = self.flags();
        if flags.intersects(Flags::UNMOUNTED | Flags::DIRTY) {
            return;
        }
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        self.set_flag(Flags::DIRTY, true);
        runtime.queue(Job::Render(self.target));
    }

    /// Slot-based storage, same order every render.
    pub fn slot<T: 'static>(&self, init: impl FnOnce() -> T) -> Rc<T> {
        let mut s = self.slots.borrow_mut();
        let cursor = s.cursor;
        s.cursor += 1;

        if cursor >= s.slots.len() {
            let rc: Rc<T> = Rc::new(init());
            s.slots.push(Box::new(rc.clone()));
            return rc;
        }

        if let Some(rc) = s.slots[cursor].downcast_ref::<Rc<T>>() {
            rc.clone()
        } else {
            log::warn!(
                "{}: hook {} changed type between renders; resetting it. \
                 Hooks must be called in the same order on every render.",
                self.target,
                cursor
            );
            let rc: Rc<T> = Rc::new(init());
            s.slots[cursor] = Box::new(rc.clone());
            rc
        }
    }

    pub fn track_effect(&self, state: Rc<RefCell<EffectState>>) {
        self.effect_states.borrow_mut().push(state);
    }

    pub fn push_effect(&self, job: EffectJob, layout: bool) {
        if layout {
            self.layout_effects.borrow_mut().push(job);
        } else {
            self.effects.borrow_mut().push(job);
        }
    }

    pub fn take_effects(&self) -> SmallVec<[EffectJob; 4]> {
        std::mem::take(&mut *self.effects.borrow_mut())
    }

    pub fn take_layout_effects(&self) -> SmallVec<[EffectJob; 2]> {
        std::mem::take(&mut *self.layout_effects.borrow_mut())
    }

    pub fn has_pending_effects(&self) -> bool {
        !self.effects.borrow().is_empty() || !self.layout_effects.borrow().is_empty()
    }

    /// Drops effects that never committed and runs every committed cleanup
    /// once.
    pub fn teardown(&self) {
        self.set_flag(Flags::UNMOUNTED, true);
        self.set_flag(Flags::DIRTY | Flags::UNMOUNT_PENDING, false);
        let dropped = self.take_effects().len() + self.take_layout_effects().len();
        if dropped > 0 {
            log::debug!("{}: dropped {dropped} uncommitted effect(s)", self.target);
        }

        let states = std::mem::take(&mut *self.effect_states.borrow_mut());
        for state in states {
            let cleanup = std::mem::take(&mut state.borrow_mut().cleanup);
            cleanup.run();
        }
        self.element.borrow_mut().take();
        self.slots.borrow_mut().slots.clear();
    }
}

/// Makes `instance` the target of hook calls for the duration of a render.
pub(crate) struct RenderGuard {
    instance: Rc<Instance>,
}

impl RenderGuard {
    pub fn enter(instance: &Rc<Instance>) -> Self {
        instance.set_flag(Flags::DIRTY, false);
        instance.set_flag(Flags::RENDERING, true);
        instance.slots.borrow_mut().cursor = 0;
        CURRENT.with(|c| c.borrow_mut().push(instance.clone()));
        RenderGuard {
            instance: instance.clone(),
        }
    }
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| {
            c.borrow_mut().pop();
        });
        self.instance.set_flag(Flags::RENDERING, false);
        self.instance.renders.set(self.instance.renders.get() + 1);
    }
}

/// Runs `f` against the instance currently rendering.
///
/// # Panics
///
/// When no render is in progress: hooks only work inside a component body.
pub(crate) fn with_current<R>(hook: &str, f: impl FnOnce(&Rc<Instance>) -> R) -> R {
    let instance = CURRENT.with(|c| c.borrow().last().cloned());
    match instance {
        Some(instance) => f(&instance),
        None => panic!("`{hook}` called outside of a render"),
    }
}

/// Cleanup slot kept alive with the effect hook that owns it.
pub(crate) fn new_effect_state(instance: &Instance) -> Rc<RefCell<EffectState>> {
    let state = Rc::new(RefCell::new(EffectState {
        deps: None,
        cleanup: Cleanup::none(),
    }));
    instance.track_effect(state.clone());
    state
}
