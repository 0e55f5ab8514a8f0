//! Ref-unwrapping view over an object.

use super::handle::Target;
use crate::reactive::{is_ref, unref, untracked};
use crate::value::Value;

/// View whose reads unwrap refs and whose writes go into the ref a property
/// holds, unless the new value is itself a ref.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRefs {
    target: Target,
}

impl ProxyRefs {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn get(&self, key: &str) -> Value {
        unref(self.target.get(key))
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let current = untracked(|| self.target.get(key));

        match current {
            Value::Ref(cell) if !is_ref(&value) => cell.set(value),
            Value::Computed(computed) if !is_ref(&value) => computed.set(value),
            _ => self.target.set(key, value),
        }
    }
}

/// Wrap `target` so refs in its properties read and write as plain values.
pub fn proxy_refs(target: impl Into<Target>) -> ProxyRefs {
    ProxyRefs {
        target: target.into(),
    }
}
