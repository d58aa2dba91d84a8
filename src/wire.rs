//! Generic wire values
//!
//! The type-erased tree exchanged with the codec: primitives and string-keyed
//! maps only. All typing is re-derived from the reader-side record type.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::PrimitiveKind;

/// Type-erased value tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Map(BTreeMap<String, WireValue>),
}

impl WireValue {
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, WireValue>> {
        match self {
            WireValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Field lookup on a map value
    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.as_map().and_then(|map| map.get(name))
    }

    /// Primitive kind of a scalar value; `None` for maps
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            WireValue::Null => Some(PrimitiveKind::Null),
            WireValue::Boolean(_) => Some(PrimitiveKind::Boolean),
            WireValue::Int(_) => Some(PrimitiveKind::Int),
            WireValue::Long(_) => Some(PrimitiveKind::Long),
            WireValue::Float(_) => Some(PrimitiveKind::Float),
            WireValue::Double(_) => Some(PrimitiveKind::Double),
            WireValue::Bytes(_) => Some(PrimitiveKind::Bytes),
            WireValue::String(_) => Some(PrimitiveKind::String),
            WireValue::Map(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.primitive_kind() {
            Some(kind) => kind.avro_name(),
            None => "map",
        }
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::String(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::String(value)
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        WireValue::Long(value)
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        WireValue::Boolean(value)
    }
}

impl FromIterator<(String, WireValue)> for WireValue {
    fn from_iter<I: IntoIterator<Item = (String, WireValue)>>(iter: I) -> Self {
        WireValue::Map(iter.into_iter().collect())
    }
}
