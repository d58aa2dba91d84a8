//! Native values to wire values
//!
//! Record instances are walked against their declared [`RecordType`], so
//! extension lookup follows the field declaration. Loose mappings (signal
//! keyword arguments) have no declaration to consult and dispatch on the
//! runtime type of each value instead.
//!
//! No schema validation happens here: a primitive of the wrong kind passes
//! through and is rejected by the codec.

use std::collections::BTreeMap;

use crate::error::{BridgeError, Result};
use crate::extension::ExtensionRegistry;
use crate::record::{Datum, FieldType, RecordInstance, RecordType};
use crate::wire::WireValue;

pub struct Marshaller<'a> {
    registry: &'a ExtensionRegistry,
}

impl<'a> Marshaller<'a> {
    pub fn new(registry: &'a ExtensionRegistry) -> Self {
        Self { registry }
    }

    /// Marshal an instance of `record`. Instance fields the type does not
    /// declare are dropped; declared fields missing from the instance stay
    /// missing.
    pub fn to_wire(&self, instance: &RecordInstance, record: &RecordType) -> Result<WireValue> {
        tracing::trace!(record = record.name(), fields = instance.len(), "marshalling record");
        let mut map = BTreeMap::new();
        for field in record.fields() {
            if let Some(value) = instance.get(&field.name) {
                map.insert(field.name.clone(), self.declared_value(value, &field.field_type)?);
            }
        }
        Ok(WireValue::Map(map))
    }

    /// Marshal a loose name → value mapping
    pub fn to_wire_loose(&self, values: &BTreeMap<String, Datum>) -> Result<WireValue> {
        values
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.runtime_value(value)?)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(WireValue::Map)
    }

    fn declared_value(&self, value: &Datum, field_type: &FieldType) -> Result<WireValue> {
        if value.is_null() {
            return Ok(WireValue::Null);
        }
        match (field_type, value) {
            (FieldType::Native(key), _) => match self.registry.lookup(key) {
                Some(extension) => extension.serialize(value),
                None => self.runtime_value(value),
            },
            (FieldType::Record(record_ref), Datum::Record(instance)) => {
                self.to_wire(instance, &record_ref.resolve())
            }
            (FieldType::Record(_), other) => self.runtime_value(other),
        }
    }

    fn runtime_value(&self, value: &Datum) -> Result<WireValue> {
        if let Some(extension) = value.type_key().and_then(|key| self.registry.lookup(&key)) {
            return extension.serialize(value);
        }
        match value {
            Datum::Null => Ok(WireValue::Null),
            Datum::Boolean(v) => Ok(WireValue::Boolean(*v)),
            Datum::Int(v) => Ok(WireValue::Int(*v)),
            Datum::Long(v) => Ok(WireValue::Long(*v)),
            Datum::Float(v) => Ok(WireValue::Float(*v)),
            Datum::Double(v) => Ok(WireValue::Double(*v)),
            Datum::Bytes(v) => Ok(WireValue::Bytes(v.clone())),
            Datum::String(v) => Ok(WireValue::String(v.clone())),
            Datum::Record(instance) => instance
                .fields()
                .iter()
                .map(|(name, field)| Ok((name.clone(), self.runtime_value(field)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(WireValue::Map),
            Datum::Custom(custom) => Err(BridgeError::ExtensionNotFound {
                type_name: custom.type_key().name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Extension;
    use crate::keys::CourseKey;
    use crate::schema::SchemaNode;
    use crate::types::{PrimitiveKind, TypeKey};
    use chrono::{TimeZone, Utc};

    fn course() -> RecordType {
        RecordType::new("CourseData")
            .field("course_key", FieldType::of::<CourseKey>())
            .field("display_name", FieldType::of::<String>())
            .optional_field("start", FieldType::of::<chrono::DateTime<Utc>>())
    }

    #[test]
    fn test_simple_record() {
        let record = RecordType::new("TestData")
            .field("sub_name", FieldType::of::<String>())
            .field("course_id", FieldType::of::<String>());
        let instance = RecordInstance::new("TestData")
            .with("sub_name", "foo")
            .with("course_id", "bar");

        let registry = ExtensionRegistry::with_defaults();
        let wire = Marshaller::new(&registry).to_wire(&instance, &record).unwrap();

        let expected: WireValue = [
            ("sub_name".to_string(), WireValue::from("foo")),
            ("course_id".to_string(), WireValue::from("bar")),
        ]
        .into_iter()
        .collect();
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_extensions_and_nulls() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let instance = RecordInstance::new("CourseData")
            .with("course_key", CourseKey::new("edX", "DemoX", "2024"))
            .with("display_name", "Demo")
            .with("start", start);

        let registry = ExtensionRegistry::with_defaults();
        let marshaller = Marshaller::new(&registry);
        let wire = marshaller.to_wire(&instance, &course()).unwrap();
        assert_eq!(wire.get("course_key"), Some(&WireValue::from("course-v1:edX+DemoX+2024")));
        assert_eq!(wire.get("start"), Some(&WireValue::from("2024-01-02T03:04:05+00:00")));

        let mut without_start = instance.clone();
        without_start.set("start", Datum::Null);
        let wire = marshaller.to_wire(&without_start, &course()).unwrap();
        assert_eq!(wire.get("start"), Some(&WireValue::Null));
    }

    #[test]
    fn test_undeclared_instance_fields_are_dropped() {
        let record = RecordType::new("Small").field("a", FieldType::of::<i64>());
        let instance = RecordInstance::new("Small").with("a", 1_i64).with("b", 2_i64);

        let registry = ExtensionRegistry::empty();
        let wire = Marshaller::new(&registry).to_wire(&instance, &record).unwrap();
        assert_eq!(wire.as_map().unwrap().len(), 1);
    }

    #[test]
    fn test_loose_mapping_uses_runtime_types() {
        let nested = RecordInstance::new("CourseData")
            .with("course_key", CourseKey::new("edX", "DemoX", "2024"))
            .with("display_name", "Demo");
        let mut values = BTreeMap::new();
        values.insert("course".to_string(), Datum::Record(nested));
        values.insert("count".to_string(), Datum::Long(3));

        let registry = ExtensionRegistry::with_defaults();
        let wire = Marshaller::new(&registry).to_wire_loose(&values).unwrap();

        let course = wire.get("course").unwrap();
        assert_eq!(course.get("course_key"), Some(&WireValue::from("course-v1:edX+DemoX+2024")));
        assert_eq!(wire.get("count"), Some(&WireValue::Long(3)));
    }

    #[test]
    fn test_loose_custom_without_extension_fails() {
        let mut values = BTreeMap::new();
        values.insert("key".to_string(), Datum::from(CourseKey::new("a", "b", "c")));

        let registry = ExtensionRegistry::empty();
        let err = Marshaller::new(&registry).to_wire_loose(&values).unwrap_err();
        assert!(matches!(err, BridgeError::ExtensionNotFound { .. }));
    }

    #[test]
    fn test_runtime_extension_overrides_primitive() {
        struct Shout;

        impl Extension for Shout {
            fn type_key(&self) -> TypeKey {
                TypeKey::of::<String>()
            }

            fn schema_fragment(&self) -> SchemaNode {
                SchemaNode::Primitive(PrimitiveKind::String)
            }

            fn serialize(&self, value: &Datum) -> Result<WireValue> {
                match value {
                    Datum::String(s) => Ok(WireValue::String(s.to_uppercase())),
                    other => Err(BridgeError::mismatch("string", other.kind_name())),
                }
            }

            fn deserialize(&self, value: &WireValue) -> Result<Datum> {
                Ok(Datum::String(value.as_str().unwrap_or_default().to_lowercase()))
            }
        }

        let registry = ExtensionRegistry::empty().with(Shout);
        let mut values = BTreeMap::new();
        values.insert("greeting".to_string(), Datum::from("hi"));
        let wire = Marshaller::new(&registry).to_wire_loose(&values).unwrap();
        assert_eq!(wire.get("greeting"), Some(&WireValue::from("HI")));
    }
}
