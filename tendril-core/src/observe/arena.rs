//! Raw object arena.
//!
//! Plain objects live in a thread-local slot map and are addressed by
//! generational [`TargetId`]s. An [`Object`] is just such an id: copying it
//! does not copy the properties, and two `Object`s are the same object iff
//! their ids are equal.
//!
//! Objects are destroyed explicitly with [`Object::release`], which also
//! drops the dependency sets and cached wrappers keyed by the object. A
//! released id is never reused, so stale handles read as empty instead of
//! aliasing a newer object.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::error::{ReactiveError, Result};
use crate::reactive::runtime;
use crate::value::Value;

new_key_type! {
    /// Identity of a raw object in the arena.
    pub struct TargetId;
}

/// Properties of one raw object, in insertion order.
#[derive(Default)]
struct TargetSlot {
    props: IndexMap<Rc<str>, Value>,
}

thread_local! {
    static ARENA: RefCell<SlotMap<TargetId, TargetSlot>> = RefCell::new(SlotMap::with_key());
}

/// A plain, unobserved object.
///
/// Reads and writes through an `Object` are raw: they neither track nor
/// trigger. Wrap it with [`crate::observe::reactive`] (or one of the other
/// modes) to make access reactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Object {
    id: TargetId,
}

impl Object {
    /// Allocate a new empty object.
    pub fn new() -> Self {
        let id = ARENA.with(|arena| arena.borrow_mut().insert(TargetSlot::default()));
        Self { id }
    }

    /// Allocate an object holding `props` in iteration order.
    pub fn from_props<K, V, I>(props: I) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let props = props
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let id = ARENA.with(|arena| arena.borrow_mut().insert(TargetSlot { props }));
        Self { id }
    }

    /// Build an object graph from a JSON object.
    ///
    /// Nested objects become nested arena objects, arrays become
    /// [`Value::List`]s.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Value::from(json) {
            Value::Object(object) => Ok(object),
            other => Err(ReactiveError::NotObservable(other.kind())),
        }
    }

    /// Get the object's identity.
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Whether the object has not been released.
    pub fn is_alive(&self) -> bool {
        ARENA.with(|arena| arena.borrow().contains_key(self.id))
    }

    /// Read a property. Missing keys and released objects read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        self.try_get(key).unwrap_or_else(|error| {
            debug!(%error, key, "read from released object");
            Value::Null
        })
    }

    /// Read a property, failing if the object has been released.
    pub fn try_get(&self, key: &str) -> Result<Value> {
        ARENA.with(|arena| {
            arena
                .borrow()
                .get(self.id)
                .map(|slot| slot.props.get(key).cloned().unwrap_or_default())
                .ok_or(ReactiveError::TargetReleased(self.id))
        })
    }

    /// Write a property. Writes to a released object are dropped.
    pub fn set(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) {
        let key = key.into();
        if let Err(error) = self.try_set(key.clone(), value) {
            debug!(%error, key = %key, "write to released object dropped");
        }
    }

    /// Write a property, returning the value it replaced.
    pub fn try_set(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        let value = value.into();
        // The replaced value is returned, and so dropped, outside the borrow.
        ARENA.with(|arena| {
            arena
                .borrow_mut()
                .get_mut(self.id)
                .map(|slot| slot.props.insert(key, value))
                .ok_or(ReactiveError::TargetReleased(self.id))
        })
    }

    /// Whether the object has a property named `key`.
    pub fn has(&self, key: &str) -> bool {
        ARENA.with(|arena| {
            arena
                .borrow()
                .get(self.id)
                .is_some_and(|slot| slot.props.contains_key(key))
        })
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<Rc<str>> {
        ARENA.with(|arena| {
            arena
                .borrow()
                .get(self.id)
                .map(|slot| slot.props.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Snapshot of all properties in insertion order.
    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        ARENA.with(|arena| {
            arena
                .borrow()
                .get(self.id)
                .map(|slot| {
                    slot.props
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    pub fn len(&self) -> usize {
        ARENA.with(|arena| arena.borrow().get(self.id).map_or(0, |slot| slot.props.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy the object.
    ///
    /// Drops its properties, the dependency sets keyed by it, and any cached
    /// wrappers over it. Releasing twice is a no-op.
    pub fn release(self) {
        let removed = ARENA.with(|arena| arena.borrow_mut().remove(self.id));
        if removed.is_none() {
            return;
        }

        debug!(object = ?self.id, "releasing object");
        runtime::forget_target(self.id);
        super::handle::forget_target(self.id);
        drop(removed);
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}
