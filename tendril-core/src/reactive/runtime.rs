//! Dependency Registry
//!
//! The registry connects observed objects to the effects that read them.
//!
//! # How It Works
//!
//! 1. When an effect reads `key` on an observed target, [`track`] adds the
//!    running effect to the dependency set for `(target, key)` and records
//!    that set on the effect, so the effect can leave it before its next run.
//!
//! 2. When an observed write changes `key`, [`trigger`] snapshots the set and
//!    notifies every member except the effect that is currently running.
//!
//! Refs and computed values own a single [`Dep`] directly instead of going
//! through the per-target map; they use [`track_dep`] and [`trigger_dep`].
//!
//! # Ownership
//!
//! Dependency sets hold their effects strongly: an effect stays subscribed
//! until it is stopped, whether or not anyone still holds its runner.
//! Effects only hold weak links back to their sets. The registry holds no
//! reference to the targets themselves; [`forget_target`] drops a target's
//! sets when the target is released from the arena.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{notify, EffectId, Subscriber};
use crate::observe::TargetId;

type KeyMap = FxHashMap<Rc<str>, Rc<Dep>>;

thread_local! {
    static TARGETS: RefCell<FxHashMap<TargetId, KeyMap>> = RefCell::new(FxHashMap::default());
}

/// A set of effects that depend on one reactive slot.
///
/// Iteration order is subscription order. An effect that leaves and joins
/// again moves to the end.
#[derive(Default)]
pub struct Dep {
    members: RefCell<Members>,
}

/// Subscribers keyed by a per-set sequence number, so leaving the set does
/// not shift the others.
#[derive(Default)]
struct Members {
    order: BTreeMap<u64, Rc<dyn Subscriber>>,
    slots: FxHashMap<EffectId, u64>,
    next: u64,
}

impl Dep {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of effects currently in the set.
    pub fn len(&self) -> usize {
        self.members.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().slots.is_empty()
    }

    pub(crate) fn contains(&self, id: EffectId) -> bool {
        self.members.borrow().slots.contains_key(&id)
    }

    fn insert(&self, id: EffectId, subscriber: Rc<dyn Subscriber>) {
        let mut members = self.members.borrow_mut();
        let seq = members.next;
        members.next += 1;
        members.slots.insert(id, seq);
        members.order.insert(seq, subscriber);
    }

    pub(crate) fn remove(&self, id: EffectId) {
        let removed = {
            let mut members = self.members.borrow_mut();
            members
                .slots
                .remove(&id)
                .and_then(|seq| members.order.remove(&seq))
        };
        drop(removed);
    }

    fn snapshot(&self) -> SmallVec<[Rc<dyn Subscriber>; 8]> {
        self.members.borrow().order.values().cloned().collect()
    }

    fn clear(&self) {
        let drained = {
            let mut members = self.members.borrow_mut();
            members.slots.clear();
            std::mem::take(&mut members.order)
        };
        drop(drained);
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers: Vec<_> = self
            .members
            .borrow()
            .order
            .values()
            .map(|subscriber| subscriber.core().id())
            .collect();
        f.debug_struct("Dep").field("subscribers", &subscribers).finish()
    }
}

/// Record that the running effect read `key` on `target`.
///
/// Does nothing outside an effect or while collection is paused.
pub fn track(target: TargetId, key: &str) {
    if !ReactiveContext::is_collecting() {
        return;
    }

    let dep = TARGETS.with(|targets| {
        let mut targets = targets.borrow_mut();
        let keys = targets.entry(target).or_default();
        match keys.get(key) {
            Some(dep) => dep.clone(),
            None => {
                let dep = Dep::new();
                keys.insert(Rc::from(key), dep.clone());
                dep
            }
        }
    });

    track_dep(&dep);
}

/// Add the running effect to `dep` and `dep` to the effect's own list.
pub(crate) fn track_dep(dep: &Rc<Dep>) {
    let Some(subscriber) = ReactiveContext::collecting_subscriber() else {
        return;
    };

    let id = subscriber.core().id();
    if dep.contains(id) {
        return;
    }

    dep.insert(id, subscriber.clone());
    subscriber.core().add_dep(dep);
}

/// Notify every effect that read `key` on `target`.
pub fn trigger(target: TargetId, key: &str) {
    let dep = TARGETS.with(|targets| {
        targets
            .borrow()
            .get(&target)
            .and_then(|keys| keys.get(key))
            .cloned()
    });

    if let Some(dep) = dep {
        trace!(object = ?target, key, subscribers = dep.len(), "trigger");
        trigger_dep(&dep);
    }
}

/// Notify a snapshot of `dep`, skipping the effect that is running now.
pub(crate) fn trigger_dep(dep: &Dep) {
    // Effects leave and re-join the set while they run; iterate a copy so
    // each member at trigger time is notified exactly once.
    let snapshot = dep.snapshot();
    let running = ReactiveContext::current();

    for subscriber in snapshot {
        if Some(subscriber.core().id()) == running {
            continue;
        }
        notify(subscriber);
    }
}

/// Number of effects subscribed to `(target, key)`.
pub fn subscriber_count(target: TargetId, key: &str) -> usize {
    TARGETS.with(|targets| {
        targets
            .borrow()
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map_or(0, |dep| dep.len())
    })
}

/// Drop every dependency set of a released target.
pub(crate) fn forget_target(target: TargetId) {
    let removed = TARGETS.with(|targets| targets.borrow_mut().remove(&target));
    if let Some(keys) = removed {
        trace!(object = ?target, keys = keys.len(), "forget target");
        for dep in keys.values() {
            // Effects keep weak links to these sets; emptying them here
            // releases the effects they were holding.
            dep.clear();
        }
    }
}
