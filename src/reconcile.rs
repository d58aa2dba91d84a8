//! Wire values back to native instances
//!
//! Reconciliation is driven only by the reader-side [`RecordType`]. Whatever
//! schema produced the payload is irrelevant here:
//!
//! - wire fields the target does not declare are ignored (an old consumer
//!   reading a newer producer's payload);
//! - target fields missing from the wire are filled by the target's defaults
//!   (a new consumer reading an older producer's payload). A missing field
//!   without a default fails with `MissingRequiredField`.
//!
//! A wire `null` for a field that has a default is treated as absent, so the
//! reader's own default applies rather than the null written on the wire.
//! The input tree is never modified.

use std::collections::BTreeMap;

use crate::error::{BridgeError, Result};
use crate::extension::ExtensionRegistry;
use crate::record::{Datum, FieldType, RecordInstance, RecordType};
use crate::signal::{Signal, SignalData};
use crate::types::{CatalogEntry, PrimitiveCatalog};
use crate::wire::WireValue;

pub struct Reconciler<'a> {
    registry: &'a ExtensionRegistry,
    catalog: PrimitiveCatalog,
}

impl<'a> Reconciler<'a> {
    pub fn new(registry: &'a ExtensionRegistry) -> Self {
        Self {
            registry,
            catalog: PrimitiveCatalog::new(),
        }
    }

    /// Rebuild an instance of `target` from a wire map
    pub fn from_wire(&self, wire: &WireValue, target: &RecordType) -> Result<RecordInstance> {
        let map = wire.as_map().ok_or_else(|| {
            BridgeError::mismatch(format!("record {}", target.name()), wire.kind_name())
        })?;
        tracing::trace!(record = target.name(), wire_fields = map.len(), "reconciling record");

        let mut values = BTreeMap::new();
        for field in target.fields() {
            match map.get(&field.name) {
                None => {}
                Some(WireValue::Null) if field.has_default() => {}
                Some(WireValue::Null) => {
                    values.insert(field.name.clone(), Datum::Null);
                }
                Some(value) => {
                    let datum = self.value(&field.name, value, &field.field_type)?;
                    values.insert(field.name.clone(), datum);
                }
            }
        }

        target.construct(values)
    }

    /// Rebuild signal keyword arguments. Keys absent from the wire stay absent.
    pub fn from_wire_loose(&self, wire: &WireValue, signal: &Signal) -> Result<SignalData> {
        let map = wire.as_map().ok_or_else(|| {
            BridgeError::mismatch(format!("signal {}", signal.event_type()), wire.kind_name())
        })?;

        let mut data = SignalData::new();
        for (name, field_type) in signal.fields() {
            let datum = match map.get(name) {
                None => continue,
                Some(WireValue::Null) => Datum::Null,
                Some(value) => self.value(name, value, field_type)?,
            };
            data.insert(name.clone(), datum);
        }
        Ok(data)
    }

    fn value(&self, field: &str, value: &WireValue, field_type: &FieldType) -> Result<Datum> {
        match field_type {
            FieldType::Record(record_ref) => {
                self.from_wire(value, &record_ref.resolve()).map(Datum::Record)
            }
            FieldType::Native(key) => {
                if let Some(extension) = self.registry.lookup(key) {
                    return extension.deserialize(value);
                }
                match self.catalog.get(key) {
                    Some(CatalogEntry::Scalar(_)) => primitive(value),
                    Some(CatalogEntry::Container(kind)) => {
                        Err(BridgeError::UnsupportedContainerType {
                            field: field.to_string(),
                            type_name: key.name().to_string(),
                            kind: kind.to_string(),
                        })
                    }
                    None => Err(BridgeError::UnsupportedType {
                        field: field.to_string(),
                        type_name: key.name().to_string(),
                    }),
                }
            }
        }
    }
}

fn primitive(value: &WireValue) -> Result<Datum> {
    Ok(match value {
        WireValue::Null => Datum::Null,
        WireValue::Boolean(v) => Datum::Boolean(*v),
        WireValue::Int(v) => Datum::Int(*v),
        WireValue::Long(v) => Datum::Long(*v),
        WireValue::Float(v) => Datum::Float(*v),
        WireValue::Double(v) => Datum::Double(*v),
        WireValue::Bytes(v) => Datum::Bytes(v.clone()),
        WireValue::String(v) => Datum::String(v.clone()),
        WireValue::Map(_) => return Err(BridgeError::mismatch("primitive", "map")),
    })
}
