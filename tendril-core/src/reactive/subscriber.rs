//! Subscriber types for the reactive system.
//!
//! A subscriber is anything that can sit in a dependency set and be notified
//! when that set is triggered. Effects are the only concrete subscribers;
//! computed values subscribe through the effect they own.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::effect::EffectCore;

/// Unique identifier for an effect.
///
/// Used as the membership key in dependency sets and to recognise an effect
/// on the tracking context stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// A type-erased effect, as stored in dependency sets.
///
/// `Effect<T>` is generic over its body's return type; dependency sets hold
/// effects of every `T` side by side, so they only see this trait.
pub(crate) trait Subscriber {
    /// Bookkeeping shared by every effect regardless of its return type.
    fn core(&self) -> &EffectCore;

    /// Run the effect and discard its result.
    fn rerun(self: Rc<Self>);
}

/// Deliver a trigger to a subscriber: its scheduler if it has one,
/// otherwise a direct re-run. Stopped effects are inert observers.
pub(crate) fn notify(subscriber: Rc<dyn Subscriber>) {
    let core = subscriber.core();
    if !core.is_active() {
        return;
    }

    match core.scheduler() {
        Some(scheduler) => scheduler(),
        None => subscriber.rerun(),
    }
}
