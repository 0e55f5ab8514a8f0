//! Reactive Primitives
//!
//! This module implements the core reactive system: effects, the dependency
//! registry that connects them to observed state, refs and computed values.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a computation that re-runs whenever state it read during its
//! last run changes. Effects do not declare what they depend on; every read
//! made while the effect is running is recorded for it.
//!
//! ## Dependency Registry
//!
//! The registry maps an observed object and property key to the effects that
//! read it. Writes through the observation layer look up that set and re-run
//! (or schedule) its members.
//!
//! ## Refs
//!
//! A Ref is a single reactive cell with its own dependency set. Equal writes
//! (NaN-aware) do not notify.
//!
//! ## Computed Values
//!
//! A Computed is a derived value that caches its result. A dependency change
//! only marks it dirty; the getter runs again on the next read.
//!
//! # Implementation Notes
//!
//! The system uses a thread-local tracking context to detect dependencies
//! automatically. When observed state is read, we check whether an effect is
//! running with collection enabled and, if so, register the dependency.

mod computed;
mod context;
mod effect;
mod refs;
pub mod runtime;
mod subscriber;

pub use computed::{computed, computed_with, Computed};
pub use context::{untracked, ReactiveContext};
pub use effect::{effect, effect_with, stop, Effect, EffectOptions, Runner, Scheduler};
pub use refs::{is_ref, new_ref, shallow_ref, unref, Ref};
pub use runtime::{subscriber_count, track, trigger, Dep};
pub use subscriber::EffectId;
