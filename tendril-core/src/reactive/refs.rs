//! Ref Implementation
//!
//! A Ref is a single reactive cell. It owns one dependency set instead of
//! going through the per-object registry.
//!
//! # How Refs Work
//!
//! 1. Reading a ref inside an effect adds the effect to the ref's set.
//!
//! 2. Writing compares the new raw value with the stored raw value using
//!    [`Observable::same_value`]. Equal writes are ignored; otherwise both
//!    the raw and the handed-out value are replaced and the set is
//!    triggered.
//!
//! 3. Deep refs hand out the reactive form of their payload (for
//!    [`Value`], objects come back wrapped). Shallow refs hand out exactly
//!    what was assigned.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::runtime::{self, Dep};
use crate::value::{Observable, Value};

struct RefInner<T> {
    /// Last assigned value in raw form; used for change detection.
    raw: RefCell<T>,

    /// Value handed out by `get`.
    value: RefCell<T>,

    shallow: bool,
    dep: Rc<Dep>,
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0);
///
/// let seen = count.clone();
/// let _log = effect(move || println!("count = {}", seen.get()));
///
/// count.set(5);  // Prints: "count = 5"
/// count.set(5);  // Equal write, nothing printed
/// ```
pub struct Ref<T: Observable> {
    inner: Rc<RefInner<T>>,
}

impl<T: Observable> Ref<T> {
    /// Create a deep ref.
    pub fn new(value: T) -> Self {
        Self::create(value, false)
    }

    /// Create a ref that stores and hands out values as given.
    pub fn shallow(value: T) -> Self {
        Self::create(value, true)
    }

    fn create(value: T, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            (value.to_raw(), value.to_reactive())
        };

        Self {
            inner: Rc::new(RefInner {
                raw: RefCell::new(raw),
                value: RefCell::new(value),
                shallow,
                dep: Dep::new(),
            }),
        }
    }

    /// Get the current value, registering the running effect.
    pub fn get(&self) -> T {
        runtime::track_dep(&self.inner.dep);
        self.inner.value.borrow().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value, notifying dependents if it differs from the old one.
    pub fn set(&self, value: T) {
        let raw = if self.inner.shallow {
            value.clone()
        } else {
            value.to_raw()
        };

        if self.inner.raw.borrow().same_value(&raw) {
            return;
        }

        let value = if self.inner.shallow {
            value
        } else {
            value.to_reactive()
        };

        // Old values are dropped only after both borrows have ended.
        let old_raw = self.inner.raw.replace(raw);
        let old_value = self.inner.value.replace(value);
        drop((old_raw, old_value));

        runtime::trigger_dep(&self.inner.dep);
    }

    /// Replace the value with `f(current)`.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// Notify dependents without changing the value.
    ///
    /// Useful after mutating the payload of a shallow ref in place.
    pub fn trigger(&self) {
        runtime::trigger_dep(&self.inner.dep);
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Number of effects currently depending on this ref.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.len()
    }

    /// Whether both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Ref<Value> {
    /// Wrap `value` in a deep ref, or return it if it already is one.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Ref(cell) => cell,
            other => Self::new(other),
        }
    }
}

impl<T: Observable> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Observable + std::fmt::Debug> std::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("value", &*self.inner.value.borrow())
            .field("shallow", &self.inner.shallow)
            .finish()
    }
}

/// Create a deep ref, or return `value` if it already is a ref.
pub fn new_ref(value: impl Into<Value>) -> Ref<Value> {
    Ref::from_value(value.into())
}

/// Create a shallow ref, or return `value` if it already is a ref.
pub fn shallow_ref(value: impl Into<Value>) -> Ref<Value> {
    match value.into() {
        Value::Ref(cell) => cell,
        other => Ref::shallow(other),
    }
}

/// Whether `value` is a ref or a computed value.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_) | Value::Computed(_))
}

/// The value behind a ref or computed value; anything else as is.
///
/// A computed value that cannot produce a value yet (it is reading itself)
/// unwraps to `Null`.
pub fn unref(value: Value) -> Value {
    match value {
        Value::Ref(cell) => cell.get(),
        Value::Computed(computed) => computed.try_get().unwrap_or_else(|error| {
            debug!(%error, computed = ?computed.id(), "unref fell back to null");
            Value::Null
        }),
        other => other,
    }
}
