//! Dynamic values.
//!
//! [`Value`] is what observed objects store and what handle reads return.
//! Reference-like variants (objects, handles, refs, computed values, lists)
//! compare by identity; primitives compare by value with NaN-aware number
//! equality, see [`Value::same_value`].

use std::rc::Rc;

use serde::ser::Error as _;
use serde::{Serialize, Serializer};

use crate::error::{ReactiveError, Result};
use crate::observe::{self, Object, ObserveMode, Observed, TargetId};
use crate::reactive::{untracked, Computed, Ref};

/// A dynamically typed value held by an object property or a ref.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Object(Object),
    Observed(Observed),
    Ref(Ref<Value>),
    Computed(Computed<Value>),
}

impl Value {
    /// Name of the variant, as used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Observed(_) => "observed",
            Value::Ref(_) => "ref",
            Value::Computed(_) => "computed",
        }
    }

    /// Identity equality: `NaN` equals `NaN`, `0.0` and `-0.0` differ,
    /// strings compare by content and everything else by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Observed(a), Value::Observed(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::Computed(a), Value::Computed(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The raw object, if this is one. Handles are not unwrapped.
    pub fn as_object(&self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(*object),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn to_ref(&self) -> Option<Ref<Value>> {
        match self {
            Value::Ref(cell) => Some(cell.clone()),
            _ => None,
        }
    }

    pub fn to_computed(&self) -> Option<Computed<Value>> {
        match self {
            Value::Computed(computed) => Some(computed.clone()),
            _ => None,
        }
    }

    /// Read `key` from an object or handle. Anything else reads as `Null`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(object) => object.get(key),
            Value::Observed(handle) => handle.get(key),
            _ => Value::Null,
        }
    }

    /// Write `key` on an object or handle. Writes to anything else are
    /// dropped.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        match self {
            Value::Object(object) => object.set(key, value),
            Value::Observed(handle) => handle.set(key, value),
            other => tracing::debug!(key, kind = other.kind(), "write to non-object dropped"),
        }
    }

    /// Snapshot the value graph as JSON.
    ///
    /// Handles and refs are read through without tracking, computed values
    /// are evaluated. Fails with [`ReactiveError::CyclicValue`] if an object
    /// contains itself.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut visiting = Vec::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut Vec<TargetId>) -> Result<serde_json::Value> {
        use serde_json::Value as Json;

        Ok(match self {
            Value::Null => Json::Null,
            Value::Bool(value) => Json::Bool(*value),
            Value::Number(value) => serde_json::Number::from_f64(*value).map_or(Json::Null, Json::Number),
            Value::Str(value) => Json::String(value.to_string()),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(|item| item.to_json_inner(visiting))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(object) => object_to_json(*object, visiting)?,
            Value::Observed(handle) => object_to_json(handle.raw(), visiting)?,
            Value::Ref(cell) => cell.get_untracked().to_json_inner(visiting)?,
            Value::Computed(computed) => untracked(|| computed.try_get())?.to_json_inner(visiting)?,
        })
    }
}

fn object_to_json(object: Object, visiting: &mut Vec<TargetId>) -> Result<serde_json::Value> {
    let id = object.id();
    if visiting.contains(&id) {
        return Err(ReactiveError::CyclicValue);
    }
    if !object.is_alive() {
        return Err(ReactiveError::TargetReleased(id));
    }

    visiting.push(id);
    let mut map = serde_json::Map::new();
    for (key, value) in object.entries() {
        map.insert(key.to_string(), value.to_json_inner(visiting)?);
    }
    visiting.pop();

    Ok(serde_json::Value::Object(map))
}

fn same_number(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

/// Whether assigning `new` over `old` is an observable change.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !new.same_value(old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl PartialEq<f64> for Value {
    fn eq(&self, other: &f64) -> bool {
        matches!(self, Value::Number(value) if value == other)
    }
}

impl PartialEq<i32> for Value {
    fn eq(&self, other: &i32) -> bool {
        *self == f64::from(*other)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        matches!(self, Value::Bool(value) if value == other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Value::Str(value) if &**value == *other)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(object) => write!(f, "Object({:?})", object.id()),
            Value::Observed(handle) => std::fmt::Debug::fmt(handle, f),
            Value::Ref(cell) => std::fmt::Debug::fmt(cell, f),
            Value::Computed(computed) => std::fmt::Debug::fmt(computed, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(value) => Value::Bool(value),
            Json::Number(value) => Value::Number(value.as_f64().unwrap_or(f64::NAN)),
            Json::String(value) => Value::Str(value.into()),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Object(Object::from_props(
                map.into_iter().map(|(key, value)| (key, Value::from(value))),
            )),
        }
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(value as f64)
                }
            }
        )*
    };
}

value_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items.into())
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Observed> for Value {
    fn from(handle: Observed) -> Self {
        Value::Observed(handle)
    }
}

impl From<&Observed> for Value {
    fn from(handle: &Observed) -> Self {
        Value::Observed(handle.clone())
    }
}

impl From<Ref<Value>> for Value {
    fn from(cell: Ref<Value>) -> Self {
        Value::Ref(cell)
    }
}

impl From<Computed<Value>> for Value {
    fn from(computed: Computed<Value>) -> Self {
        Value::Computed(computed)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A payload that can live in a [`Ref`].
///
/// `same_value` decides whether an assignment is a change. `to_reactive` and
/// `to_raw` convert between the stored raw form and the form handed out by
/// deep refs; for plain data both are the identity.
pub trait Observable: Clone + 'static {
    fn same_value(&self, other: &Self) -> bool;

    fn to_reactive(&self) -> Self {
        self.clone()
    }

    fn to_raw(&self) -> Self {
        self.clone()
    }
}

impl Observable for Value {
    fn same_value(&self, other: &Self) -> bool {
        Value::same_value(self, other)
    }

    fn to_reactive(&self) -> Self {
        observe::observe(self.clone(), ObserveMode::Reactive)
    }

    fn to_raw(&self) -> Self {
        observe::to_raw(self.clone())
    }
}

macro_rules! observable_by_eq {
    ($($ty:ty),*) => {
        $(
            impl Observable for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

observable_by_eq!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, (), String,
    Rc<str>, &'static str
);

impl Observable for f64 {
    fn same_value(&self, other: &Self) -> bool {
        same_number(*self, *other)
    }
}

impl Observable for f32 {
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits() || (self.is_nan() && other.is_nan())
    }
}

impl<T: Observable> Observable for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn to_reactive(&self) -> Self {
        self.as_ref().map(T::to_reactive)
    }

    fn to_raw(&self) -> Self {
        self.as_ref().map(T::to_raw)
    }
}

impl<T: Observable> Observable for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}
