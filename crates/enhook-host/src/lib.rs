//! # Reference hook runtime
//!
//! A small host for `enhook_core`: order-dependent hooks plus a frame
//! scheduler running on a virtual clock.
//!
//! ```ignore
//! use enhook_core::{adapt, Options};
//! use enhook_host::*;
//!
//! let rt = HookRuntime::batched();
//! let counter = adapt(
//!     |_: &(), _: &()| {
//!         let (count, set_count) = use_state(|| 0);
//!         use_effect_with((), move || set_count.set(1));
//!         count
//!     },
//!     Options::new().host(rt.as_host()),
//! )?;
//!
//! assert_eq!(counter.call(())?, 0);
//! rt.frames(2);
//! assert_eq!(counter.last_value(), Some(1));
//! ```
//!
//! Two render modes cover the two shapes hosts come in:
//!
//! - [`RenderMode::Sync`] renders inside `Host::render`;
//! - [`RenderMode::Batched`] queues the render on the microtask queue and
//!   only runs it early when flushed.
//!
//! A frame fires due timers, drains microtasks (renders queued by state
//! updates), then commits effects. Effects that update state cause renders
//! at the end of the same frame; their own effects wait for the next one.

pub mod hooks;
mod instance;
pub mod runtime;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use hooks::{
    Cleanup, Dispatch, StateSetter, is_first_render, on_cleanup, use_effect, use_effect_with,
    use_layout_effect, use_layout_effect_with, use_memo, use_reducer, use_ref, use_state,
};
pub use runtime::{HookRuntime, RenderMode, WeakRuntime};
pub use scheduler::{FRAME, TimerId};
