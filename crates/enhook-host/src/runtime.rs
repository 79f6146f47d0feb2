use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use enhook_core::{Commit, Component, Element, Host, MountTarget};

use crate::instance::{Flags, Instance, RenderGuard};
use crate::scheduler::{Job, Scheduler, TimerId};

/// Microtasks drained in one go before the queue is declared runaway.
const MICROTASK_LIMIT: usize = 10_000;

/// When `render` runs the component body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Inside `render`; the call returns [`Commit::Committed`].
    #[default]
    Sync,
    /// On the next microtask; the call returns [`Commit::Deferred`].
    Batched,
}

pub(crate) struct Inner {
    mode: RenderMode,
    instances: RefCell<BTreeMap<MountTarget, Rc<Instance>>>,
    scheduler: RefCell<Scheduler>,
}

impl Inner {
    pub(crate) fn queue(&self, job: Job) {
        self.scheduler.borrow_mut().queue(job);
    }
}

/// Hook runtime with a frame scheduler on a virtual clock.
///
/// Nothing runs on its own: drive it with [`frame`](Self::frame),
/// [`frames`](Self::frames), [`advance`](Self::advance) or
/// [`run_microtasks`](Self::run_microtasks).
#[derive(Clone)]
pub struct HookRuntime {
    inner: Rc<Inner>,
}

/// Non-owning handle, for effects and timers that must not keep the runtime
/// alive.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<Inner>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<HookRuntime> {
        self.inner.upgrade().map(|inner| HookRuntime { inner })
    }

    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> Option<TimerId> {
        self.upgrade().map(|rt| rt.set_timeout(delay, task))
    }

    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        if let Some(rt) = self.upgrade() {
            rt.queue_microtask(task);
        }
    }
}

impl Default for HookRuntime {
    fn default() -> Self {
        Self::new(RenderMode::default())
    }
}

impl HookRuntime {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            inner: Rc::new(Inner {
                mode,
                instances: RefCell::new(BTreeMap::new()),
                scheduler: RefCell::new(Scheduler::default()),
            }),
        }
    }

    pub fn sync() -> Self {
        Self::new(RenderMode::Sync)
    }

    pub fn batched() -> Self {
        Self::new(RenderMode::Batched)
    }

    pub fn mode(&self) -> RenderMode {
        self.inner.mode
    }

    /// This runtime as a shareable host for `enhook_core`.
    pub fn as_host(&self) -> Rc<dyn Host> {
        Rc::new(self.clone())
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn now(&self) -> Duration {
        self.inner.scheduler.borrow().now()
    }

    pub fn current_tick(&self) -> u64 {
        self.inner.scheduler.borrow().tick()
    }

    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        self.inner
            .scheduler
            .borrow_mut()
            .set_timeout(delay, Box::new(task))
    }

    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.inner.scheduler.borrow_mut().clear_timeout(id)
    }

    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.queue(Job::Task(Box::new(task)));
    }

    /// Mounted targets, in creation order.
    pub fn mounted(&self) -> Vec<MountTarget> {
        self.inner.instances.borrow().keys().copied().collect()
    }

    /// Completed renders of `target`.
    pub fn render_count(&self, target: MountTarget) -> Option<u64> {
        self.instance(target).map(|i| i.renders())
    }

    /// No queued microtasks, timers, held-back renders or uncommitted effects.
    pub fn is_idle(&self) -> bool {
        !self.inner.scheduler.borrow().has_work()
            && self
                .inner
                .instances
                .borrow()
                .values()
                .all(|i| !i.has_pending_effects())
    }

    /// Runs one frame: renders held back from the previous frame are queued,
    /// then due timers fire (each followed by a microtask drain), the
    /// remaining microtasks run, then every queued effect. Returns the new
    /// tick.
    pub fn frame(&self) -> u64 {
        let tick = self.inner.scheduler.borrow_mut().advance_frame();
        log::trace!("frame {tick}");

        let deferred = self.inner.scheduler.borrow_mut().take_deferred();
        for target in deferred {
            if let Some(instance) = self.instance(target) {
                instance.invalidate();
            }
        }

        loop {
            let task = self.inner.scheduler.borrow_mut().pop_due_timer();
            let Some(task) = task else { break };
            task();
            self.run_microtasks();
        }
        self.run_microtasks();
        self.commit_effects();
        self.run_microtasks();
        tick
    }

    pub fn frames(&self, n: usize) {
        for _ in 0..n {
            self.frame();
        }
    }

    /// Runs frames until at least `duration` of virtual time has passed.
    pub fn advance(&self, duration: Duration) {
        let until = self.now() + duration;
        while self.now() < until {
            self.frame();
        }
    }

    /// Drains the microtask queue, including tasks queued while draining.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self.inner.scheduler.borrow_mut().pop_microtask();
            let Some(job) = job else { break };
            ran += 1;
            if ran > MICROTASK_LIMIT {
                let dropped = self.inner.scheduler.borrow_mut().drop_microtasks();
                log::error!("microtask queue ran away; dropped {dropped} queued job(s)");
                break;
            }
            self.run_job(job);
        }
        ran
    }

    fn run_job(&self, job: Job) {
        match job {
            Job::Render(target) => {
                if let Some(instance) = self.instance(target)
                    && instance.flags().contains(Flags::DIRTY)
                {
                    self.render_instance(&instance);
                }
            }
            Job::Task(task) => task(),
        }
    }

    fn commit_effects(&self) {
        let instances: Vec<Rc<Instance>> =
            self.inner.instances.borrow().values().cloned().collect();
        for instance in instances {
            for job in instance.take_effects() {
                if instance.flags().contains(Flags::UNMOUNTED) {
                    break;
                }
                job.commit();
            }
        }
    }

    fn instance(&self, target: MountTarget) -> Option<Rc<Instance>> {
        self.inner.instances.borrow().get(&target).cloned()
    }

    fn instance_or_insert(&self, target: MountTarget) -> Rc<Instance> {
        self.inner
            .instances
            .borrow_mut()
            .entry(target)
            .or_insert_with(|| {
                log::debug!("{target} mounted");
                Rc::new(Instance::new(target, Rc::downgrade(&self.inner)))
            })
            .clone()
    }

    fn render_instance(&self, instance: &Rc<Instance>) {
        if instance.flags().contains(Flags::UNMOUNTED) {
            return;
        }
        let Some(element) = instance.element() else {
            return;
        };
        {
            let _guard = RenderGuard::enter(instance);
            element.render();
        }

        for job in instance.take_layout_effects() {
            if instance
                .flags()
                .intersects(Flags::UNMOUNT_PENDING | Flags::UNMOUNTED)
            {
                break;
            }
            job.commit();
        }
        if instance.flags().contains(Flags::UNMOUNT_PENDING) {
            self.teardown(instance);
        }
    }

    fn teardown(&self, instance: &Rc<Instance>) {
        self.inner.instances.borrow_mut().remove(&instance.target);
        instance.teardown();
        log::debug!("{} unmounted", instance.target);
    }
}

impl Host for HookRuntime {
    fn create_element(&self, component: Component, name: Option<&str>) -> Element {
        let element = Element::new(component);
        match name {
            Some(name) => element.named(name),
            None => element,
        }
    }

    fn render(&self, element: Element, target: MountTarget) -> Commit {
        let instance = self.instance_or_insert(target);
        instance.set_element(element);

        let busy = instance.flags().contains(Flags::RENDERING);
        match self.inner.mode {
            RenderMode::Sync if !busy => {
                self.render_instance(&instance);
                Commit::Committed
            }
            _ => {
                instance.invalidate();
                Commit::Deferred
            }
        }
    }

    fn unmount(&self, target: MountTarget) {
        let Some(instance) = self.instance(target) else {
            return;
        };
        if instance.flags().contains(Flags::RENDERING) {
            log::debug!("{target} unmount deferred until its render settles");
            instance.set_flag(Flags::UNMOUNT_PENDING, true);
            return;
        }
        self.teardown(&instance);
    }

    fn flush(&self, target: MountTarget) {
        if let Some(instance) = self.instance(target)
            && instance.flags().contains(Flags::DIRTY)
            && !instance.flags().contains(Flags::RENDERING)
        {
            self.inner.scheduler.borrow_mut().cancel_render(target);
            self.render_instance(&instance);
        }
    }

    fn schedule(&self, target: MountTarget) {
        log::trace!("{target} held back until the next frame");
        self.inner.scheduler.borrow_mut().defer_render(target);
    }

    fn tick(&self) -> u64 {
        self.current_tick()
    }
}

impl fmt::Debug for HookRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRuntime")
            .field("mode", &self.inner.mode)
            .field("tick", &self.current_tick())
            .field("mounted", &self.inner.instances.borrow().len())
            .finish()
    }
}
