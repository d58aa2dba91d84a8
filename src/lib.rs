//! Avro Event Bridge
//!
//! Derives Avro schemas from record type declarations, marshals native
//! instances into schema-conformant values and reconciles payloads written
//! under an older or newer version of a record back into instances of the
//! reader's current type.
//!
//! ## Features
//!
//! - **Schema derivation**: one schema per record type, nested records defined
//!   once and referenced by name afterwards
//! - **Extensions**: timestamps, course keys and usage keys out of the box;
//!   any other type can register its own
//! - **Version skew**: extra writer fields are ignored, missing ones are filled
//!   from the reader's defaults
//! - **CloudEvents envelope** for record payloads, `OpenedxSignal` wrapper for
//!   signal keyword arguments
//! - **Compatibility checking** and SHA256 schema fingerprints
//!
//! ## Pipeline
//!
//! ```text
//! RecordType ──SchemaBuilder──▶ SchemaNode ──apache-avro──▶ Schema
//!
//! RecordInstance ──Marshaller──▶ WireValue ──AvroCodec──▶ bytes
//! bytes ──AvroCodec (+ writer schema)──▶ WireValue ──Reconciler──▶ RecordInstance
//! ```

pub mod bridge;
pub mod checksum;
pub mod codec;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod extension;
pub mod keys;
pub mod marshal;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod signal;
pub mod types;
pub mod wire;

pub use bridge::{AvroBridge, EventOverrides, SignalBridge};
pub use checksum::Checksum;
pub use codec::AvroCodec;
pub use compatibility::{CompatibilityChecker, CompatibilityResult};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use extension::{Extension, ExtensionRegistry, StringExtension};
pub use keys::{CourseKey, UsageKey};
pub use marshal::Marshaller;
pub use reconcile::Reconciler;
pub use record::{AvroRecord, CustomValue, Datum, FieldType, FromDatum, RecordInstance, RecordType};
pub use schema::{RecordSchema, SchemaBuilder, SchemaNode};
pub use signal::{Signal, SignalData};
pub use types::{PrimitiveKind, TypeKey};
pub use wire::WireValue;
