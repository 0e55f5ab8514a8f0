//! Observation Layer
//!
//! Wraps plain objects so that reads register the running effect and writes
//! re-run the effects that read the written key.
//!
//! # Modes
//!
//! - `Reactive`: reads track, writes trigger, nested objects are wrapped on
//!   read.
//! - `Readonly`: reads do not track, writes are rejected, nested objects
//!   come back readonly.
//! - `ShallowReactive` / `ShallowReadonly`: like the above for the object's
//!   own properties; nested objects come back raw.
//!
//! Every handle and raw object implements [`Access`], so code that only
//! reads and writes properties can take `&dyn Access`.

mod arena;
mod handle;
mod proxy_refs;

pub use arena::{Object, TargetId};
pub use handle::{
    is_observed, is_proxy, is_reactive, is_readonly, is_shallow, observe, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, ObserveMode, Observed, Target,
};
pub use proxy_refs::{proxy_refs, ProxyRefs};

use crate::value::Value;

/// Property access, intercepted or not.
pub trait Access {
    fn get(&self, key: &str) -> Value;
    fn set(&self, key: &str, value: Value);
}

impl Access for Object {
    fn get(&self, key: &str) -> Value {
        Object::get(self, key)
    }

    fn set(&self, key: &str, value: Value) {
        Object::set(self, key, value)
    }
}

impl Access for Observed {
    fn get(&self, key: &str) -> Value {
        Observed::get(self, key)
    }

    fn set(&self, key: &str, value: Value) {
        Observed::set(self, key, value)
    }
}

impl Access for Target {
    fn get(&self, key: &str) -> Value {
        Target::get(self, key)
    }

    fn set(&self, key: &str, value: Value) {
        Target::set(self, key, value)
    }
}

impl Access for ProxyRefs {
    fn get(&self, key: &str) -> Value {
        ProxyRefs::get(self, key)
    }

    fn set(&self, key: &str, value: Value) {
        ProxyRefs::set(self, key, value)
    }
}
