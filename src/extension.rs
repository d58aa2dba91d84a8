//! Extensions for non-primitive field types
//!
//! An [`Extension`] lets a type that is neither an Avro primitive nor a record
//! take part in schema derivation, marshalling and reconciliation. Extensions
//! live in an [`ExtensionRegistry`] keyed by exact [`TypeKey`]; there is no
//! structural matching.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{BridgeError, Result};
use crate::keys::{CourseKey, UsageKey};
use crate::record::Datum;
use crate::schema::SchemaNode;
use crate::types::{PrimitiveKind, TypeKey};
use crate::wire::WireValue;

/// Capability bundle for one native type
pub trait Extension: Send + Sync {
    /// The native type this extension handles
    fn type_key(&self) -> TypeKey;

    /// Schema emitted for fields of this type
    fn schema_fragment(&self) -> SchemaNode;

    /// Native value to wire primitive
    fn serialize(&self, value: &Datum) -> Result<WireValue>;

    /// Wire primitive back to a native value
    fn deserialize(&self, value: &WireValue) -> Result<Datum>;
}

fn expect_custom<'a, T: Any>(value: &'a Datum) -> Result<&'a T> {
    match value {
        Datum::Custom(custom) => custom
            .downcast_ref::<T>()
            .ok_or_else(|| BridgeError::mismatch(std::any::type_name::<T>(), value.kind_name())),
        other => Err(BridgeError::mismatch(std::any::type_name::<T>(), other.kind_name())),
    }
}

fn expect_str(value: &WireValue) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| BridgeError::mismatch("string", value.kind_name()))
}

/// UTC timestamps as RFC 3339 strings
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeExtension;

impl Extension for DateTimeExtension {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<DateTime<Utc>>()
    }

    fn schema_fragment(&self) -> SchemaNode {
        SchemaNode::Primitive(PrimitiveKind::String)
    }

    fn serialize(&self, value: &Datum) -> Result<WireValue> {
        let timestamp = expect_custom::<DateTime<Utc>>(value)?;
        Ok(WireValue::String(timestamp.to_rfc3339()))
    }

    fn deserialize(&self, value: &WireValue) -> Result<Datum> {
        let raw = expect_str(value)?;
        let timestamp = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| BridgeError::InvalidValue(format!("bad timestamp '{}': {}", raw, e)))?;
        Ok(Datum::custom(timestamp.with_timezone(&Utc)))
    }
}

/// Any `Display + FromStr` type carried as an Avro string
pub struct StringExtension<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> StringExtension<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for StringExtension<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extension for StringExtension<T>
where
    T: Any + Send + Sync + PartialEq + fmt::Debug + fmt::Display + FromStr,
    T::Err: fmt::Display,
{
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn schema_fragment(&self) -> SchemaNode {
        SchemaNode::Primitive(PrimitiveKind::String)
    }

    fn serialize(&self, value: &Datum) -> Result<WireValue> {
        Ok(WireValue::String(expect_custom::<T>(value)?.to_string()))
    }

    fn deserialize(&self, value: &WireValue) -> Result<Datum> {
        let raw = expect_str(value)?;
        let parsed = raw.parse::<T>().map_err(|e| {
            BridgeError::InvalidValue(format!(
                "cannot parse '{}' as {}: {}",
                raw,
                std::any::type_name::<T>(),
                e
            ))
        })?;
        Ok(Datum::custom(parsed))
    }
}

/// Type-keyed extension lookup table
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<TypeKey, Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    /// Registry with no extensions at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in extensions (timestamps, course and usage keys)
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(DateTimeExtension);
        registry.register(StringExtension::<CourseKey>::new());
        registry.register(StringExtension::<UsageKey>::new());
        registry
    }

    /// Register an extension, returning the one it replaces
    pub fn register<E: Extension + 'static>(&mut self, extension: E) -> Option<Arc<dyn Extension>> {
        self.register_shared(Arc::new(extension))
    }

    pub fn register_shared(&mut self, extension: Arc<dyn Extension>) -> Option<Arc<dyn Extension>> {
        self.extensions.insert(extension.type_key(), extension)
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<E: Extension + 'static>(mut self, extension: E) -> Self {
        self.register(extension);
        self
    }

    pub fn lookup(&self, key: &TypeKey) -> Option<&dyn Extension> {
        self.extensions.get(key).map(|e| e.as_ref())
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.extensions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.extensions.keys().map(|k| k.name()).collect();
        names.sort_unstable();
        f.debug_struct("ExtensionRegistry").field("types", &names).finish()
    }
}
