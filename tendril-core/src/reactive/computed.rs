//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only after one of
//! its dependencies changed, and only when it is read.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect. Nothing runs on creation.
//!
//! 2. The first read runs the effect, caches the result and marks the value
//!    clean.
//!
//! 3. When a dependency changes, the effect's scheduler does not re-run the
//!    getter. It marks the value dirty and notifies whoever read the
//!    computed value, once per clean-to-dirty transition.
//!
//! 4. The next read sees the dirty flag and recomputes.
//!
//! A computed value is itself a dependency: reading it inside an effect
//! subscribes that effect to the computed's own set.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use super::effect::{Effect, EffectOptions};
use super::runtime::{self, Dep};
use super::subscriber::EffectId;
use crate::diagnostics::{self, Diagnostic};
use crate::error::{ReactiveError, Result};

struct ComputedInner<T: 'static> {
    /// Cached result of the last evaluation (None before the first).
    value: RefCell<Option<T>>,

    /// Whether the cache is stale.
    dirty: Cell<bool>,

    /// Effects that read this computed value.
    dep: Rc<Dep>,

    /// Lazy effect over the getter.
    effect: Effect<T>,

    setter: Option<Box<dyn Fn(T)>>,
}

impl<T: 'static> ComputedInner<T> {
    fn invalidate(&self) {
        if self.dirty.get() {
            return;
        }

        trace!(computed = ?self.effect.id(), "computed invalidated");
        self.dirty.set(true);
        runtime::trigger_dep(&self.dep);
    }
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        // Dependency sets hold the inner effect strongly.
        self.effect.stop();
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Object::from_json(json!({ "n": 1 }))?);
///
/// let source = state.clone();
/// let double = computed(move || source.get("n").as_number().unwrap_or(0.0) * 2.0);
///
/// assert_eq!(double.get(), 2.0);
/// state.set("n", 5);           // getter not called yet
/// assert_eq!(double.get(), 10.0);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a read-only computed value.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::create(getter, None)
    }

    /// Create a computed value whose `set` calls `setter`.
    pub fn with_setter<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::create(getter, Some(Box::new(setter)))
    }

    fn create<F>(getter: F, setter: Option<Box<dyn Fn(T)>>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let this = this.clone();
            let options = EffectOptions::new().lazy(true).scheduler(move || {
                if let Some(inner) = this.upgrade() {
                    inner.invalidate();
                }
            });

            ComputedInner {
                value: RefCell::new(None),
                dirty: Cell::new(true),
                dep: Dep::new(),
                effect: Effect::with_options(getter, options),
                setter,
            }
        });

        Self { inner }
    }

    /// Get the value, recomputing it first if it is dirty.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this computed value before it ever produced
    /// one. Use [`Computed::try_get`] to handle that case.
    pub fn get(&self) -> T {
        self.try_get()
            .expect("computed value read itself before producing a value")
    }

    /// Get the value, recomputing it first if it is dirty.
    ///
    /// A read from inside the computed's own getter returns the previous
    /// value, or [`ReactiveError::CyclicComputed`] if there is none yet.
    pub fn try_get(&self) -> Result<T> {
        let inner = &self.inner;
        runtime::track_dep(&inner.dep);

        if inner.dirty.get() {
            if let Some(value) = inner.effect.run() {
                let previous = inner.value.replace(Some(value.clone()));
                inner.dirty.set(false);
                drop(previous);
                return Ok(value);
            }
        }

        inner
            .value
            .borrow()
            .clone()
            .ok_or(ReactiveError::CyclicComputed)
    }

    /// Write through the setter.
    ///
    /// On a getter-only computed the write is rejected and reported.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => diagnostics::report(Diagnostic::ReadonlyComputedWrite {
                computed: self.id(),
            }),
        }
    }
}

impl<T: 'static> Computed<T> {
    /// ID of the internal effect.
    pub fn id(&self) -> EffectId {
        self.inner.effect.id()
    }

    /// Whether the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Whether the computed value was created without a setter.
    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// Number of effects currently depending on this computed value.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.len()
    }

    /// Whether both handles refer to the same computed value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("dirty", &self.is_dirty())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

/// Create a read-only computed value over `getter`.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

/// Create a writable computed value.
pub fn computed_with<T, F, S>(getter: F, setter: S) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    Computed::with_setter(getter, setter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
