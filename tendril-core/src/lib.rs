//! Tendril Core
//!
//! A fine-grained reactive dependency-tracking engine. Effects re-run
//! automatically whenever state they read changes, without declaring
//! subscriptions.
//!
//! It implements:
//!
//! - Observed objects (reactive, readonly and shallow handles)
//! - Effects with schedulers, lazy start and stop
//! - Refs and cached computed values
//! - A dependency registry keyed by object and property
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: effects, tracking context, dependency registry, refs and
//!   computed values
//! - `observe`: the object arena and the handles that intercept access
//! - `value`: the dynamic value type stored in objects and refs
//! - `diagnostics`: rejected writes and skipped runs, logged and capturable
//! - `error`: errors returned by the fallible APIs
//!
//! Everything is single-threaded: state lives in thread-locals and handles
//! are `!Send`.
//!
//! # Example
//!
//! ```rust,ignore
//! use tendril_core::prelude::*;
//!
//! let state = reactive(Object::from_json(json!({ "count": 0 }))?);
//!
//! // Derived value
//! let source = state.clone();
//! let doubled = computed(move || source.get("count").as_number().unwrap_or(0.0) * 2.0);
//!
//! // Effect
//! let reader = state.clone();
//! let _runner = effect(move || {
//!     println!("Count: {:?}, Doubled: {}", reader.get("count"), doubled.get());
//! });
//!
//! state.set("count", 5);
//! // Effect runs again, prints: "Count: 5, Doubled: 10"
//! ```

pub mod diagnostics;
pub mod error;
pub mod observe;
pub mod reactive;
pub mod value;

pub use error::{ReactiveError, Result};
pub use value::{Observable, Value};

/// Everything needed to build reactive state and effects.
pub mod prelude {
    pub use crate::observe::{
        is_proxy, is_reactive, is_readonly, is_shallow, observe, proxy_refs, reactive, readonly,
        shallow_reactive, shallow_readonly, to_raw, Access, ObserveMode, Object, Observed,
    };
    pub use crate::reactive::{
        computed, computed_with, effect, effect_with, is_ref, new_ref, shallow_ref, stop,
        untracked, unref, Computed, Effect, EffectOptions, Ref, Runner,
    };
    pub use crate::value::{Observable, Value};
}
