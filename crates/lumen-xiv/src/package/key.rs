use lumen_common::Keyed;

use crate::Name;

/// A shader key: a named switch whose values select render nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShaderKey {
    pub key: Name,
    pub default_value: Name,
    /// Every value seen for this key, the default included, in first-seen order.
    pub values: Vec<Name>,
}

impl ShaderKey {
    pub fn new(key: Name, default_value: Name) -> Self {
        Self {
            key,
            values: vec![default_value.clone()],
            default_value,
        }
    }

    /// Record a value, ignoring repeats.
    pub fn add_value(&mut self, value: Name) {
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }
}

impl Keyed for ShaderKey {
    type Key = Name;

    fn key(&self) -> Name {
        self.key.clone()
    }
}
