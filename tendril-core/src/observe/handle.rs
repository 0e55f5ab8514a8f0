//! Observed handles.
//!
//! An [`Observed`] wraps a raw [`Object`] (or, for a readonly layer over a
//! mutable handle, another `Observed`) and intercepts property access:
//!
//! - `get` reads through to the wrapped target, tracks the read unless the
//!   handle is readonly, and lazily wraps nested objects in the matching
//!   mode unless the handle is shallow.
//! - `set` writes to the raw object and triggers dependents when the value
//!   changed. Readonly handles reject the write and report a diagnostic.
//!
//! Wrapping is canonical: one cache per mode, keyed by the identity of the
//! wrapped target, returns the existing handle while it is alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::arena::{Object, TargetId};
use crate::diagnostics::{self, Diagnostic};
use crate::error::ReactiveError;
use crate::reactive::runtime;
use crate::value::{has_changed, Value};

/// How a handle intercepts access.
///
/// Two independent axes: readonly vs mutable, shallow vs deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserveMode {
    Reactive,
    Readonly,
    ShallowReactive,
    ShallowReadonly,
}

impl ObserveMode {
    pub const ALL: [ObserveMode; 4] = [
        ObserveMode::Reactive,
        ObserveMode::Readonly,
        ObserveMode::ShallowReactive,
        ObserveMode::ShallowReadonly,
    ];

    pub fn is_readonly(self) -> bool {
        matches!(self, ObserveMode::Readonly | ObserveMode::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, ObserveMode::ShallowReactive | ObserveMode::ShallowReadonly)
    }

    /// Mode used for nested objects read through a deep handle.
    fn child(self) -> ObserveMode {
        if self.is_readonly() {
            ObserveMode::Readonly
        } else {
            ObserveMode::Reactive
        }
    }

    fn index(self) -> usize {
        match self {
            ObserveMode::Reactive => 0,
            ObserveMode::Readonly => 1,
            ObserveMode::ShallowReactive => 2,
            ObserveMode::ShallowReadonly => 3,
        }
    }
}

/// Something that can be wrapped: a raw object or an existing handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Raw(Object),
    Observed(Observed),
}

impl Target {
    /// The raw object at the bottom of any handle layers.
    pub fn raw(&self) -> Object {
        match self {
            Target::Raw(object) => *object,
            Target::Observed(handle) => handle.raw(),
        }
    }

    fn identity(&self) -> Identity {
        match self {
            Target::Raw(object) => Identity::Target(object.id()),
            Target::Observed(handle) => Identity::Handle(handle.inner.id),
        }
    }

    pub fn get(&self, key: &str) -> Value {
        match self {
            Target::Raw(object) => object.get(key),
            Target::Observed(handle) => handle.get(key),
        }
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        match self {
            Target::Raw(object) => object.set(key, value),
            Target::Observed(handle) => handle.set(key, value),
        }
    }

    /// Split a value into a wrappable target, handing primitives back.
    pub(crate) fn from_value(value: Value) -> Result<Target, Value> {
        match value {
            Value::Object(object) => Ok(Target::Raw(object)),
            Value::Observed(handle) => Ok(Target::Observed(handle)),
            other => Err(other),
        }
    }
}

impl From<Object> for Target {
    fn from(object: Object) -> Self {
        Target::Raw(object)
    }
}

impl From<Observed> for Target {
    fn from(handle: Observed) -> Self {
        Target::Observed(handle)
    }
}

impl From<&Observed> for Target {
    fn from(handle: &Observed) -> Self {
        Target::Observed(handle.clone())
    }
}

impl TryFrom<Value> for Target {
    type Error = ReactiveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Target::from_value(value).map_err(|other| ReactiveError::NotObservable(other.kind()))
    }
}

/// Cache key: what a handle wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Target(TargetId),
    Handle(u64),
}

type WrapperCache = FxHashMap<Identity, Weak<ObservedInner>>;

thread_local! {
    static WRAPPERS: RefCell<[WrapperCache; 4]> = RefCell::new(Default::default());
}

fn next_handle_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct ObservedInner {
    id: u64,
    target: Target,
    mode: ObserveMode,
}

impl Drop for ObservedInner {
    fn drop(&mut self) {
        let identity = self.target.identity();
        let index = self.mode.index();

        // Thread-local teardown may already have destroyed the caches.
        let _ = WRAPPERS.try_with(|caches| {
            if let Ok(mut caches) = caches.try_borrow_mut() {
                let cache = &mut caches[index];
                if cache.get(&identity).is_some_and(|entry| entry.strong_count() == 0) {
                    cache.remove(&identity);
                }
            }
        });
    }
}

/// A reactive, readonly or shallow view over an object.
///
/// Cloning shares the handle; equality is handle identity.
#[derive(Clone)]
pub struct Observed {
    inner: Rc<ObservedInner>,
}

impl Observed {
    /// The mode this handle was created with.
    pub fn mode(&self) -> ObserveMode {
        self.inner.mode
    }

    /// What this handle wraps, one layer down.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// The raw object behind all handle layers.
    pub fn raw(&self) -> Object {
        self.inner.target.raw()
    }

    /// Whether reads through this handle are tracked somewhere down the
    /// chain: true for mutable handles, and for readonly layers over one.
    pub fn is_reactive(&self) -> bool {
        if self.inner.mode.is_readonly() {
            match &self.inner.target {
                Target::Observed(handle) => handle.is_reactive(),
                Target::Raw(_) => false,
            }
        } else {
            true
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.mode.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.mode.is_shallow()
    }

    /// Read a property through the handle.
    pub fn get(&self, key: &str) -> Value {
        let mode = self.inner.mode;
        let value = self.inner.target.get(key);

        if !mode.is_readonly() {
            runtime::track(self.raw().id(), key);
        }

        if mode.is_shallow() {
            return value;
        }

        match Target::from_value(value) {
            Ok(nested) => Value::Observed(wrap(nested, mode.child())),
            Err(value) => value,
        }
    }

    /// Write a property through the handle.
    ///
    /// Triggers dependents of `key` when the stored value changed. On a
    /// readonly handle the write is rejected and reported.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let mode = self.inner.mode;
        let object = self.raw();

        if mode.is_readonly() {
            diagnostics::report(Diagnostic::ReadonlyWriteRejected {
                key: key.to_string(),
                target: object.id(),
            });
            return;
        }

        let value = value.into();
        let value = if mode.is_shallow() { value } else { to_raw(value) };

        match object.try_set(key, value.clone()) {
            Ok(previous) => {
                if has_changed(&value, &previous.unwrap_or_default()) {
                    runtime::trigger(object.id(), key);
                }
            }
            Err(error) => debug!(%error, key, "write through handle dropped"),
        }
    }

    /// Whether both handles are the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Observed {}

impl std::fmt::Debug for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observed")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("raw", &self.raw().id())
            .finish()
    }
}

/// Wrap `target` in `mode`, reusing the canonical handle when one exists.
fn wrap(target: Target, mode: ObserveMode) -> Observed {
    if let Target::Observed(existing) = &target {
        // Handles are only layered to put a readonly view over a mutable one.
        if !(mode.is_readonly() && !existing.is_readonly()) {
            return existing.clone();
        }
    }

    let identity = target.identity();
    let cached = WRAPPERS.with(|caches| {
        let mut caches = caches.borrow_mut();
        let cache = &mut caches[mode.index()];
        let live = cache.get(&identity).and_then(Weak::upgrade);
        if live.is_none() {
            cache.remove(&identity);
        }
        live
    });
    if let Some(inner) = cached {
        return Observed { inner };
    }

    let inner = Rc::new(ObservedInner {
        id: next_handle_id(),
        target,
        mode,
    });
    WRAPPERS.with(|caches| {
        caches.borrow_mut()[mode.index()].insert(identity, Rc::downgrade(&inner));
    });

    Observed { inner }
}

/// Drop cached wrappers of a released object.
pub(crate) fn forget_target(target: TargetId) {
    WRAPPERS.with(|caches| {
        let mut caches = caches.borrow_mut();
        for mode in ObserveMode::ALL {
            let cache = &mut caches[mode.index()];
            cache.remove(&Identity::Target(target));
            cache.retain(|_, handle| handle.strong_count() > 0);
        }
    });
}

/// Wrap a value in `mode`. Primitives, refs and computed values are
/// returned unchanged.
pub fn observe(value: Value, mode: ObserveMode) -> Value {
    match Target::from_value(value) {
        Ok(target) => Value::Observed(wrap(target, mode)),
        Err(value) => value,
    }
}

/// Deep mutable handle: reads track, writes trigger, nested objects are
/// wrapped on read.
pub fn reactive(target: impl Into<Target>) -> Observed {
    wrap(target.into(), ObserveMode::Reactive)
}

/// Deep readonly handle: writes are rejected, nested objects are readonly.
pub fn readonly(target: impl Into<Target>) -> Observed {
    wrap(target.into(), ObserveMode::Readonly)
}

/// Mutable handle that tracks only its own properties.
pub fn shallow_reactive(target: impl Into<Target>) -> Observed {
    wrap(target.into(), ObserveMode::ShallowReactive)
}

/// Readonly handle over the top-level properties only.
pub fn shallow_readonly(target: impl Into<Target>) -> Observed {
    wrap(target.into(), ObserveMode::ShallowReadonly)
}

/// Whether `value` is an observed handle.
pub fn is_observed(value: &Value) -> bool {
    matches!(value, Value::Observed(_))
}

/// Whether reads through `value` are tracked.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Observed(handle) => handle.is_reactive(),
        _ => false,
    }
}

/// Whether writes through `value` are rejected.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Observed(handle) => handle.is_readonly(),
        Value::Computed(computed) => computed.is_readonly(),
        _ => false,
    }
}

pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Observed(handle) => handle.is_shallow(),
        Value::Ref(cell) => cell.is_shallow(),
        _ => false,
    }
}

/// Whether `value` is reactive or readonly.
pub fn is_proxy(value: &Value) -> bool {
    is_reactive(value) || is_readonly(value)
}

/// Strip every handle layer, returning the raw object behind `value`.
/// Anything else is returned unchanged.
pub fn to_raw(value: Value) -> Value {
    match value {
        Value::Observed(handle) => Value::Object(handle.raw()),
        other => other,
    }
}
