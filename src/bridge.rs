//! Construction-time facades over derivation, marshalling and the codec
//!
//! [`AvroBridge`] carries one record type inside a CloudEvents envelope.
//! [`SignalBridge`] carries the keyword arguments of a [`Signal`] under a
//! fixed `OpenedxSignal` wrapper. Both derive and validate their schema once,
//! at construction.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::checksum::Checksum;
use crate::codec::AvroCodec;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::extension::ExtensionRegistry;
use crate::marshal::Marshaller;
use crate::reconcile::Reconciler;
use crate::record::{AvroRecord, RecordInstance, RecordType};
use crate::schema::{FieldSchema, RecordSchema, SchemaBuilder, SchemaNode};
use crate::signal::{Signal, SignalData};
use crate::types::PrimitiveKind;
use crate::wire::WireValue;

pub const CLOUD_EVENT_NAMESPACE: &str = "io.cloudevents";
pub const CLOUD_EVENT_RECORD: &str = "CloudEvent";
pub const CLOUD_EVENT_SPEC_VERSION: &str = "1.0";
const CLOUD_EVENT_DOC: &str = "Avro Event Format for CloudEvents created with avro-event-bridge";

pub const SIGNAL_RECORD: &str = "OpenedxSignal";
pub const SIGNAL_DATA_RECORD: &str = "OpenEdxPublicSignal";

/// Field carrying the payload in both envelopes
const DATA_FIELD: &str = "data";

/// Per-event envelope values that would otherwise be generated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOverrides {
    /// Defaults to a random UUID
    pub id: Option<String>,
    /// Defaults to the current time, RFC 3339
    pub time: Option<String>,
}

impl EventOverrides {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }
}

fn cloud_event_schema(data: RecordSchema) -> RecordSchema {
    let string = || SchemaNode::Primitive(PrimitiveKind::String);
    RecordSchema {
        name: CLOUD_EVENT_RECORD.to_string(),
        namespace: Some(CLOUD_EVENT_NAMESPACE.to_string()),
        doc: Some(CLOUD_EVENT_DOC.to_string()),
        fields: vec![
            FieldSchema::new("id", string()),
            FieldSchema::new("type", string()),
            FieldSchema::new("specversion", string())
                .with_default(Value::from(CLOUD_EVENT_SPEC_VERSION)),
            FieldSchema::new("time", string()),
            FieldSchema::new("source", string()),
            FieldSchema::new("sourcehost", string()),
            FieldSchema::new("minorversion", SchemaNode::Primitive(PrimitiveKind::Int)),
            FieldSchema::new(DATA_FIELD, SchemaNode::Record(data)),
        ],
    }
}

fn data_of<'w>(envelope: &'w WireValue, record: &str) -> Result<&'w WireValue> {
    envelope.get(DATA_FIELD).ok_or_else(|| BridgeError::MissingRequiredField {
        record: record.to_string(),
        field: DATA_FIELD.to_string(),
    })
}

// =============================================================================
// Record bridge
// =============================================================================

/// Serializes instances of one record type as CloudEvents
#[derive(Debug)]
pub struct AvroBridge {
    record_type: RecordType,
    registry: ExtensionRegistry,
    config: BridgeConfig,
    codec: AvroCodec,
    checksum: Checksum,
}

impl AvroBridge {
    pub fn new(
        record_type: RecordType,
        registry: ExtensionRegistry,
        config: BridgeConfig,
    ) -> Result<Self> {
        let data = SchemaBuilder::new(&registry).derive(&record_type)?;
        let codec = AvroCodec::new(SchemaNode::Record(cloud_event_schema(data)))?;
        let checksum = codec.node().checksum();

        tracing::debug!(
            record = record_type.name(),
            fields = record_type.fields().len(),
            checksum = checksum.short(),
            "derived record bridge schema"
        );

        Ok(Self {
            record_type,
            registry,
            config,
            codec,
            checksum,
        })
    }

    /// Bridge for a Rust type's record description
    pub fn for_record<T: AvroRecord>(
        registry: ExtensionRegistry,
        config: BridgeConfig,
    ) -> Result<Self> {
        Self::new(T::record_type(), registry, config)
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaNode {
        self.codec.node()
    }

    /// Key-sorted JSON text of the envelope schema
    pub fn schema_str(&self) -> String {
        self.schema().canonical_json()
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Envelope map for `instance`, ready for the codec
    pub fn to_wire(
        &self,
        instance: &RecordInstance,
        overrides: Option<EventOverrides>,
    ) -> Result<WireValue> {
        let overrides = overrides.unwrap_or_default();
        let data = Marshaller::new(&self.registry).to_wire(instance, &self.record_type)?;

        let mut envelope = BTreeMap::new();
        envelope.insert(
            "id".to_string(),
            WireValue::String(overrides.id.unwrap_or_else(|| Uuid::new_v4().to_string())),
        );
        envelope.insert("type".to_string(), WireValue::from(self.config.event_type.as_str()));
        envelope.insert("specversion".to_string(), WireValue::from(CLOUD_EVENT_SPEC_VERSION));
        envelope.insert(
            "time".to_string(),
            WireValue::String(overrides.time.unwrap_or_else(|| Utc::now().to_rfc3339())),
        );
        envelope.insert("source".to_string(), WireValue::from(self.config.source.as_str()));
        envelope.insert("sourcehost".to_string(), WireValue::from(self.config.sourcehost.as_str()));
        envelope.insert("minorversion".to_string(), WireValue::Int(0));
        envelope.insert(DATA_FIELD.to_string(), data);
        Ok(WireValue::Map(envelope))
    }

    /// Rebuild the payload of an already decoded envelope
    pub fn from_wire(&self, envelope: &WireValue) -> Result<RecordInstance> {
        let data = data_of(envelope, CLOUD_EVENT_RECORD)?;
        Reconciler::new(&self.registry).from_wire(data, &self.record_type)
    }

    pub fn serialize(&self, instance: &RecordInstance) -> Result<Vec<u8>> {
        self.serialize_with(instance, EventOverrides::default())
    }

    pub fn serialize_with(
        &self,
        instance: &RecordInstance,
        overrides: EventOverrides,
    ) -> Result<Vec<u8>> {
        let envelope = self.to_wire(instance, Some(overrides))?;
        self.codec.encode(&envelope)
    }

    /// `writer` is the schema the bytes were written with, when it is not
    /// this bridge's own schema
    pub fn deserialize(&self, bytes: &[u8], writer: Option<&SchemaNode>) -> Result<RecordInstance> {
        let envelope = self.codec.decode(bytes, writer)?;
        self.from_wire(&envelope)
    }

    pub fn serialize_record<T: AvroRecord>(&self, value: &T) -> Result<Vec<u8>> {
        self.serialize(&value.to_instance())
    }

    pub fn deserialize_record<T: AvroRecord>(
        &self,
        bytes: &[u8],
        writer: Option<&SchemaNode>,
    ) -> Result<T> {
        T::from_instance(self.deserialize(bytes, writer)?)
    }
}

// =============================================================================
// Signal bridge
// =============================================================================

/// Serializes signal keyword arguments
#[derive(Debug)]
pub struct SignalBridge {
    signal: Signal,
    registry: ExtensionRegistry,
    codec: AvroCodec,
}

impl SignalBridge {
    pub fn new(signal: Signal, registry: ExtensionRegistry) -> Result<Self> {
        let mut builder = SchemaBuilder::new(&registry);
        let mut seen = HashSet::new();
        let mut payload = RecordSchema::new(SIGNAL_DATA_RECORD);
        for (name, field_type) in signal.fields() {
            if !seen.insert(name.as_str()) {
                return Err(BridgeError::DuplicateField {
                    record: SIGNAL_DATA_RECORD.to_string(),
                    field: name.clone(),
                });
            }
            payload.fields.push(builder.derive_field(name, field_type, false)?);
        }

        let mut envelope = RecordSchema::new(SIGNAL_RECORD);
        envelope.fields.push(FieldSchema::new(DATA_FIELD, SchemaNode::Record(payload)));
        let codec = AvroCodec::new(SchemaNode::Record(envelope))?;

        tracing::debug!(
            event_type = signal.event_type(),
            fields = signal.fields().len(),
            "derived signal bridge schema"
        );

        Ok(Self {
            signal,
            registry,
            codec,
        })
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn schema(&self) -> &SchemaNode {
        self.codec.node()
    }

    pub fn schema_str(&self) -> String {
        self.schema().canonical_json()
    }

    pub fn checksum(&self) -> Checksum {
        self.schema().checksum()
    }

    pub fn serialize_signal(&self, data: &SignalData) -> Result<Vec<u8>> {
        let payload = Marshaller::new(&self.registry).to_wire_loose(data)?;
        let envelope: WireValue = std::iter::once((DATA_FIELD.to_string(), payload)).collect();
        self.codec.encode(&envelope)
    }

    pub fn deserialize_signal(
        &self,
        bytes: &[u8],
        writer: Option<&SchemaNode>,
    ) -> Result<SignalData> {
        let envelope = self.codec.decode(bytes, writer)?;
        let data = data_of(&envelope, SIGNAL_RECORD)?;
        Reconciler::new(&self.registry).from_wire_loose(data, &self.signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CourseKey;
    use crate::record::{Datum, FieldType};
    use serde_json::json;

    fn test_data() -> RecordType {
        RecordType::new("TestData")
            .field("sub_name", FieldType::of::<String>())
            .field("course_id", FieldType::of::<String>())
    }

    fn bridge(record: RecordType) -> AvroBridge {
        AvroBridge::new(record, ExtensionRegistry::with_defaults(), BridgeConfig::default())
            .unwrap()
    }

    #[test]
    fn test_envelope_schema_shape() {
        let schema: Value = serde_json::from_str(&bridge(test_data()).schema_str()).unwrap();

        assert_eq!(schema["name"], "CloudEvent");
        assert_eq!(schema["namespace"], "io.cloudevents");
        assert_eq!(
            schema["fields"][2],
            json!({"name": "specversion", "type": "string", "default": "1.0"})
        );
        assert_eq!(
            schema["fields"][7],
            json!({
                "name": "data",
                "type": {
                    "name": "TestData",
                    "type": "record",
                    "fields": [
                        {"name": "sub_name", "type": "string"},
                        {"name": "course_id", "type": "string"},
                    ],
                },
            })
        );
    }

    #[test]
    fn test_to_wire_envelope() {
        let bridge = bridge(test_data());
        let instance = RecordInstance::new("TestData")
            .with("sub_name", "foo")
            .with("course_id", "bar");
        let overrides = EventOverrides::default().id("event-1").time("2024-01-01T00:00:00+00:00");

        let wire = bridge.to_wire(&instance, Some(overrides)).unwrap();
        assert_eq!(wire.get("id"), Some(&WireValue::from("event-1")));
        assert_eq!(wire.get("time"), Some(&WireValue::from("2024-01-01T00:00:00+00:00")));
        assert_eq!(wire.get("type"), Some(&WireValue::from("org.openedx.test.test.test.v0")));
        assert_eq!(wire.get("minorversion"), Some(&WireValue::Int(0)));
        assert_eq!(
            wire.get("data").and_then(|d| d.get("sub_name")),
            Some(&WireValue::from("foo"))
        );
    }

    #[test]
    fn test_generated_ids_differ() {
        let bridge = bridge(test_data());
        let instance = RecordInstance::new("TestData")
            .with("sub_name", "foo")
            .with("course_id", "bar");
        let first = bridge.to_wire(&instance, None).unwrap();
        let second = bridge.to_wire(&instance, None).unwrap();
        assert_ne!(first.get("id"), second.get("id"));
    }

    #[test]
    fn test_round_trip() {
        let bridge = bridge(test_data());
        let instance = RecordInstance::new("TestData")
            .with("sub_name", "foo")
            .with("course_id", "bar");

        let bytes = bridge.serialize(&instance).unwrap();
        assert_eq!(bridge.deserialize(&bytes, None).unwrap(), instance);
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(bridge(test_data()).checksum(), bridge(test_data()).checksum());
    }

    #[test]
    fn test_unsupported_field_fails_construction() {
        let record = RecordType::new("Bad").field("items", FieldType::of::<Vec<String>>());
        let err =
            AvroBridge::new(record, ExtensionRegistry::with_defaults(), BridgeConfig::default())
                .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedContainerType { .. }));
    }

    #[test]
    fn test_signal_schema_shape() {
        let signal = Signal::new("org.openedx.test.test.test.v0")
            .data("course_key", FieldType::of::<CourseKey>())
            .data("count", FieldType::of::<i64>());
        let bridge = SignalBridge::new(signal, ExtensionRegistry::with_defaults()).unwrap();

        let schema: Value = serde_json::from_str(&bridge.schema_str()).unwrap();
        assert_eq!(
            schema,
            json!({
                "name": "OpenedxSignal",
                "type": "record",
                "fields": [{
                    "name": "data",
                    "type": {
                        "name": "OpenEdxPublicSignal",
                        "type": "record",
                        "fields": [
                            {"name": "course_key", "type": "string"},
                            {"name": "count", "type": "long"},
                        ],
                    },
                }],
            })
        );
    }

    #[test]
    fn test_signal_round_trip() {
        let signal = Signal::new("org.openedx.test.test.test.v0")
            .data("course_key", FieldType::of::<CourseKey>())
            .data("count", FieldType::of::<i64>());
        let bridge = SignalBridge::new(signal, ExtensionRegistry::with_defaults()).unwrap();

        let mut data = SignalData::new();
        data.insert("course_key".to_string(), Datum::from(CourseKey::new("edX", "DemoX", "2024")));
        data.insert("count".to_string(), Datum::Long(7));

        let bytes = bridge.serialize_signal(&data).unwrap();
        assert_eq!(bridge.deserialize_signal(&bytes, None).unwrap(), data);
    }

    #[test]
    fn test_signal_duplicate_key_rejected() {
        let signal = Signal::new("org.openedx.test.test.test.v0")
            .data("a", FieldType::of::<String>())
            .data("a", FieldType::of::<String>());
        let err = SignalBridge::new(signal, ExtensionRegistry::with_defaults()).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateField { .. }));
    }
}
