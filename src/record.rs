//! Record type declarations and native values
//!
//! A [`RecordType`] is the reader/writer-independent description of one payload
//! shape: a name and an ordered list of typed fields, each optionally carrying
//! a default. Native values are held as [`Datum`] trees; Rust structs take part
//! by implementing [`AvroRecord`].

use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{BridgeError, Result};
use crate::types::TypeKey;

// =============================================================================
// Native values
// =============================================================================

type AnyValue = dyn Any + Send + Sync;

/// An instance of a type that has no primitive mapping (e.g. a timestamp or an
/// opaque key). Serialized through the extension registered for its [`TypeKey`].
#[derive(Clone)]
pub struct CustomValue {
    key: TypeKey,
    value: Arc<AnyValue>,
    eq: fn(&AnyValue, &AnyValue) -> bool,
    fmt: fn(&AnyValue, &mut fmt::Formatter<'_>) -> fmt::Result,
}

impl CustomValue {
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync + PartialEq + fmt::Debug,
    {
        Self {
            key: TypeKey::of::<T>(),
            value: Arc::new(value),
            eq: eq_as::<T>,
            fmt: fmt_as::<T>,
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

fn eq_as<T: Any + PartialEq>(a: &AnyValue, b: &AnyValue) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn fmt_as<T: Any + fmt::Debug>(value: &AnyValue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => fmt::Debug::fmt(value, f),
        None => f.write_str("<opaque>"),
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && (self.eq)(&*self.value, &*other.value)
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.fmt)(&*self.value, f)
    }
}

/// Native value tree
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Record(RecordInstance),
    Custom(CustomValue),
}

impl Datum {
    /// Wrap any extension-backed value
    pub fn custom<T>(value: T) -> Self
    where
        T: Any + Send + Sync + PartialEq + fmt::Debug,
    {
        Datum::Custom(CustomValue::new(value))
    }

    /// Wrap a typed record
    pub fn record<T: AvroRecord>(value: &T) -> Self {
        Datum::Record(value.to_instance())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Short description of the variant, for error messages
    pub fn kind_name(&self) -> String {
        match self {
            Datum::Null => "null".to_string(),
            Datum::Boolean(_) => "boolean".to_string(),
            Datum::Int(_) => "int".to_string(),
            Datum::Long(_) => "long".to_string(),
            Datum::Float(_) => "float".to_string(),
            Datum::Double(_) => "double".to_string(),
            Datum::Bytes(_) => "bytes".to_string(),
            Datum::String(_) => "string".to_string(),
            Datum::Record(instance) => format!("record {}", instance.type_name()),
            Datum::Custom(value) => value.type_key().name().to_string(),
        }
    }

    /// Runtime type identity; `None` for records, which are identified by name
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            Datum::Null => Some(TypeKey::of::<()>()),
            Datum::Boolean(_) => Some(TypeKey::of::<bool>()),
            Datum::Int(_) => Some(TypeKey::of::<i32>()),
            Datum::Long(_) => Some(TypeKey::of::<i64>()),
            Datum::Float(_) => Some(TypeKey::of::<f32>()),
            Datum::Double(_) => Some(TypeKey::of::<f64>()),
            Datum::Bytes(_) => Some(TypeKey::of::<Vec<u8>>()),
            Datum::String(_) => Some(TypeKey::of::<String>()),
            Datum::Record(_) => None,
            Datum::Custom(value) => Some(value.type_key()),
        }
    }

    /// Convert a record datum into a typed record
    pub fn into_record<T: AvroRecord>(self) -> Result<T> {
        match self {
            Datum::Record(instance) => T::from_instance(instance),
            other => Err(BridgeError::mismatch(
                format!("record {}", T::record_type().name()),
                other.kind_name(),
            )),
        }
    }

    /// Clone out an extension-backed value of type `T`
    pub fn into_custom<T: Any + Clone>(self) -> Result<T> {
        match &self {
            Datum::Custom(value) => value
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| BridgeError::mismatch(std::any::type_name::<T>(), self.kind_name())),
            _ => Err(BridgeError::mismatch(std::any::type_name::<T>(), self.kind_name())),
        }
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::String(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::String(value.to_string())
    }
}

impl From<bool> for Datum {
    fn from(value: bool) -> Self {
        Datum::Boolean(value)
    }
}

impl From<i32> for Datum {
    fn from(value: i32) -> Self {
        Datum::Int(value)
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Long(value)
    }
}

impl From<f32> for Datum {
    fn from(value: f32) -> Self {
        Datum::Float(value)
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::Double(value)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(value: Vec<u8>) -> Self {
        Datum::Bytes(value)
    }
}

impl From<RecordInstance> for Datum {
    fn from(value: RecordInstance) -> Self {
        Datum::Record(value)
    }
}

impl From<CustomValue> for Datum {
    fn from(value: CustomValue) -> Self {
        Datum::Custom(value)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Datum::Null)
    }
}

/// Typed extraction from a [`Datum`]
pub trait FromDatum: Sized {
    fn from_datum(datum: Datum) -> Result<Self>;
}

impl FromDatum for Datum {
    fn from_datum(datum: Datum) -> Result<Self> {
        Ok(datum)
    }
}

impl FromDatum for String {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::String(value) => Ok(value),
            other => Err(BridgeError::mismatch("string", other.kind_name())),
        }
    }
}

impl FromDatum for bool {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Boolean(value) => Ok(value),
            other => Err(BridgeError::mismatch("boolean", other.kind_name())),
        }
    }
}

impl FromDatum for i32 {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Int(value) => Ok(value),
            Datum::Long(value) => i32::try_from(value).map_err(|_| {
                BridgeError::InvalidValue(format!("{} does not fit in an int", value))
            }),
            other => Err(BridgeError::mismatch("int", other.kind_name())),
        }
    }
}

impl FromDatum for i64 {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Long(value) => Ok(value),
            Datum::Int(value) => Ok(i64::from(value)),
            other => Err(BridgeError::mismatch("long", other.kind_name())),
        }
    }
}

impl FromDatum for f32 {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Float(value) => Ok(value),
            other => Err(BridgeError::mismatch("float", other.kind_name())),
        }
    }
}

impl FromDatum for f64 {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Double(value) => Ok(value),
            Datum::Float(value) => Ok(f64::from(value)),
            other => Err(BridgeError::mismatch("double", other.kind_name())),
        }
    }
}

impl FromDatum for Vec<u8> {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Bytes(value) => Ok(value),
            other => Err(BridgeError::mismatch("bytes", other.kind_name())),
        }
    }
}

impl FromDatum for RecordInstance {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Record(value) => Ok(value),
            other => Err(BridgeError::mismatch("record", other.kind_name())),
        }
    }
}

impl<T: FromDatum> FromDatum for Option<T> {
    fn from_datum(datum: Datum) -> Result<Self> {
        match datum {
            Datum::Null => Ok(None),
            other => T::from_datum(other).map(Some),
        }
    }
}

/// Implements `From<T> for Datum` and `FromDatum for T` for an
/// extension-backed type (stored as [`Datum::Custom`]).
#[macro_export]
macro_rules! custom_datum {
    ($ty:ty) => {
        impl From<$ty> for $crate::Datum {
            fn from(value: $ty) -> Self {
                $crate::Datum::custom(value)
            }
        }

        impl $crate::FromDatum for $ty {
            fn from_datum(datum: $crate::Datum) -> $crate::Result<Self> {
                datum.into_custom::<$ty>()
            }
        }
    };
}

custom_datum!(DateTime<Utc>);

// =============================================================================
// Record instances
// =============================================================================

/// A native record: type name plus field values in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInstance {
    type_name: String,
    fields: Vec<(String, Datum)>,
}

impl RecordInstance {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Datum>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing any existing value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Datum>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> &[(String, Datum)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove a field and convert it
    pub fn take<T: FromDatum>(&mut self, name: &str) -> Result<T> {
        let position = self.fields.iter().position(|(n, _)| n == name).ok_or_else(|| {
            BridgeError::MissingRequiredField {
                record: self.type_name.clone(),
                field: name.to_string(),
            }
        })?;
        let (_, value) = self.fields.remove(position);
        T::from_datum(value)
    }

    /// Remove a nested record field and convert it to `T`
    pub fn take_record<T: AvroRecord>(&mut self, name: &str) -> Result<T> {
        self.take::<Datum>(name)?.into_record()
    }

    /// Like [`take_record`](Self::take_record), mapping null to `None`
    pub fn take_optional_record<T: AvroRecord>(&mut self, name: &str) -> Result<Option<T>> {
        match self.take::<Datum>(name)? {
            Datum::Null => Ok(None),
            other => other.into_record().map(Some),
        }
    }
}

// =============================================================================
// Record type declarations
// =============================================================================

/// Reference to a nested record type
#[derive(Clone)]
pub enum RecordRef {
    /// A record type built at runtime
    Shared(Arc<RecordType>),
    /// A record type produced on demand (lets record graphs refer to themselves)
    Deferred(fn() -> RecordType),
}

impl RecordRef {
    pub fn resolve(&self) -> Cow<'_, RecordType> {
        match self {
            RecordRef::Shared(record) => Cow::Borrowed(record.as_ref()),
            RecordRef::Deferred(build) => Cow::Owned(build()),
        }
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordRef({})", self.resolve().name())
    }
}

/// Declared type of a field
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Primitive, container, or extension-backed native type
    Native(TypeKey),
    /// Nested record
    Record(RecordRef),
}

impl FieldType {
    pub fn of<T: Any>() -> Self {
        FieldType::Native(TypeKey::of::<T>())
    }

    pub fn record<T: AvroRecord>() -> Self {
        FieldType::Record(RecordRef::Deferred(T::record_type))
    }

    pub fn nested(record: RecordType) -> Self {
        FieldType::Record(RecordRef::Shared(Arc::new(record)))
    }

    pub fn shared(record: Arc<RecordType>) -> Self {
        FieldType::Record(RecordRef::Shared(record))
    }

    /// Human-readable type name
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Native(key) => key.name().to_string(),
            FieldType::Record(record) => record.resolve().name().to_string(),
        }
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::Native(a), FieldType::Native(b)) => a == b,
            (FieldType::Record(a), FieldType::Record(b)) => {
                a.resolve().name() == b.resolve().name()
            }
            _ => false,
        }
    }
}

/// One declared field
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// Default applied by [`RecordType::construct`] when the field is absent
    pub default: Option<Datum>,
}

impl FieldDef {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Description of a record type: a name and its fields in declaration order
#[derive(Debug, Clone)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldDef>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            default: None,
        });
        self
    }

    /// Add a field with a default value
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<Datum>,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            default: Some(default.into()),
        });
        self
    }

    /// Add a field that defaults to null
    pub fn optional_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_with_default(name, field_type, Datum::Null)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Build an instance from named values, applying defaults for absent
    /// fields. Fails on absent fields without a default and on names the
    /// type does not declare.
    pub fn construct(&self, mut values: BTreeMap<String, Datum>) -> Result<RecordInstance> {
        let mut instance = RecordInstance::new(&self.name);

        for field in &self.fields {
            let value = match values.remove(&field.name) {
                Some(value) => value,
                None => field.default.clone().ok_or_else(|| BridgeError::MissingRequiredField {
                    record: self.name.clone(),
                    field: field.name.clone(),
                })?,
            };
            instance.fields.push((field.name.clone(), value));
        }

        if let Some(unexpected) = values.keys().next() {
            return Err(BridgeError::InvalidValue(format!(
                "{} has no field named '{}'",
                self.name, unexpected
            )));
        }

        Ok(instance)
    }
}

/// A Rust type with a record type description
pub trait AvroRecord: Sized + 'static {
    fn record_type() -> RecordType;

    fn to_instance(&self) -> RecordInstance;

    fn from_instance(instance: RecordInstance) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_data() -> RecordType {
        RecordType::new("TestData")
            .field("sub_name", FieldType::of::<String>())
            .field("course_id", FieldType::of::<String>())
            .field_with_default("added_key", FieldType::of::<String>(), "default_value")
    }

    #[test]
    fn test_construct_applies_defaults() {
        let mut values = BTreeMap::new();
        values.insert("sub_name".to_string(), Datum::from("foo"));
        values.insert("course_id".to_string(), Datum::from("bar"));

        let instance = test_data().construct(values).unwrap();
        assert_eq!(instance.get("added_key"), Some(&Datum::from("default_value")));
        assert_eq!(instance.fields()[0].0, "sub_name");
    }

    #[test]
    fn test_construct_reports_missing_required_field() {
        let mut values = BTreeMap::new();
        values.insert("sub_name".to_string(), Datum::from("foo"));

        let err = test_data().construct(values).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::MissingRequiredField { ref field, .. } if field == "course_id"
        ));
    }

    #[test]
    fn test_construct_rejects_unknown_field() {
        let mut values = BTreeMap::new();
        values.insert("sub_name".to_string(), Datum::from("foo"));
        values.insert("course_id".to_string(), Datum::from("bar"));
        values.insert("surprise".to_string(), Datum::from(1_i64));

        assert!(test_data().construct(values).is_err());
    }

    #[test]
    fn test_custom_value_equality() {
        let now = Utc::now();
        assert_eq!(Datum::from(now), Datum::from(now));
        assert_ne!(Datum::custom(1_u8), Datum::custom(1_u16));
    }

    #[test]
    fn test_take_converts_and_removes() {
        let mut instance = RecordInstance::new("X").with("a", 3_i32).with("b", Datum::Null);
        assert_eq!(instance.take::<i64>("a").unwrap(), 3);
        assert_eq!(instance.take::<Option<String>>("b").unwrap(), None);
        assert!(instance.is_empty());
        assert!(instance.take::<String>("a").is_err());
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut instance = RecordInstance::new("X").with("a", 1_i64).with("b", 2_i64);
        instance.set("a", 5_i64);
        assert_eq!(instance.fields()[0], ("a".to_string(), Datum::Long(5)));
        assert_eq!(instance.len(), 2);
    }
}
