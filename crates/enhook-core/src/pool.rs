//! Virtual mount pool.
//!
//! Maps each adapter instance to its off-screen target. Targets are created
//! lazily on first lookup and never handed out again once destroyed.

use std::cell::RefCell;

use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

use crate::host::MountTarget;

new_key_type! {
    /// Identity of one adapter instance (one `adapt` call).
    pub struct AdapterId;
}

/// Lifecycle of a virtual mount. `Destroyed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountState {
    Uninitialized,
    Mounted,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("virtual mount was destroyed")]
pub struct Destroyed;

enum Slot {
    Uninitialized,
    Mounted(MountTarget),
    Destroyed,
}

struct Entry {
    slot: Slot,
    default_host: bool,
}

struct MountPool {
    entries: SlotMap<AdapterId, Entry>,
    next_target: u64,
}

impl Default for MountPool {
    fn default() -> Self {
        Self {
            entries: SlotMap::with_key(),
            next_target: 1,
        }
    }
}

thread_local! {
    static POOL: RefCell<MountPool> = RefCell::new(MountPool::default());
}

pub(crate) fn register(default_host: bool) -> AdapterId {
    POOL.with(|p| {
        p.borrow_mut().entries.insert(Entry {
            slot: Slot::Uninitialized,
            default_host,
        })
    })
}

/// Target for `id`, created on first use. Fails once the mount is destroyed,
/// and for ids that were released.
pub fn get(id: AdapterId) -> Result<MountTarget, Destroyed> {
    POOL.with(|p| {
        let mut guard = p.borrow_mut();
        let p = &mut *guard;
        let next = MountTarget(p.next_target);
        let entry = p.entries.get_mut(id).ok_or(Destroyed)?;
        match entry.slot {
            Slot::Mounted(target) => Ok(target),
            Slot::Destroyed => Err(Destroyed),
            Slot::Uninitialized => {
                entry.slot = Slot::Mounted(next);
                p.next_target += 1;
                log::debug!("{next} created");
                Ok(next)
            }
        }
    })
}

/// Marks the mount destroyed. Returns the target if it had been created and
/// this call is the one that destroyed it; repeated calls return `None`.
pub fn destroy(id: AdapterId) -> Option<MountTarget> {
    POOL.with(|p| {
        let mut p = p.borrow_mut();
        let entry = p.entries.get_mut(id)?;
        match std::mem::replace(&mut entry.slot, Slot::Destroyed) {
            Slot::Mounted(target) => Some(target),
            Slot::Uninitialized | Slot::Destroyed => None,
        }
    })
}

/// Forgets `id` entirely. Only called once no handle to the adapter remains.
pub(crate) fn release(id: AdapterId) {
    POOL.with(|p| {
        p.borrow_mut().entries.remove(id);
    });
}

pub fn state(id: AdapterId) -> MountState {
    POOL.with(|p| match p.borrow().entries.get(id).map(|e| &e.slot) {
        Some(Slot::Uninitialized) => MountState::Uninitialized,
        Some(Slot::Mounted(_)) => MountState::Mounted,
        Some(Slot::Destroyed) | None => MountState::Destroyed,
    })
}

/// Live adapters bound to the default host.
pub(crate) fn default_host_users() -> usize {
    POOL.with(|p| {
        p.borrow()
            .entries
            .values()
            .filter(|e| e.default_host && !matches!(e.slot, Slot::Destroyed))
            .count()
    })
}
