//! Avro binary encoding of wire values
//!
//! Wire maps carry no Avro type information, so encoding walks the
//! [`SchemaNode`] alongside the value: records are emitted in schema field
//! order, unions get a branch index and references resolve to the record
//! defined earlier in the same schema. Decoding goes the other way and
//! collapses union branches back into plain values.
//!
//! When a writer schema is supplied to [`AvroCodec::decode`], apache-avro's
//! schema resolution projects the payload onto the reader schema first.

use std::collections::{BTreeMap, HashMap};

use apache_avro::types::Value as AvroValue;
use apache_avro::Schema;
use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::schema::{RecordSchema, SchemaNode};
use crate::types::PrimitiveKind;
use crate::wire::WireValue;

/// Encoder/decoder bound to one schema
#[derive(Debug, Clone)]
pub struct AvroCodec {
    node: SchemaNode,
    schema: Schema,
}

impl AvroCodec {
    /// Parse `node` with apache-avro; fails if the schema is not valid Avro
    pub fn new(node: SchemaNode) -> Result<Self> {
        let schema = parse_schema(&node)?;
        Ok(Self { node, schema })
    }

    pub fn node(&self) -> &SchemaNode {
        &self.node
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encode a wire value as a single Avro datum (no container header)
    pub fn encode(&self, value: &WireValue) -> Result<Vec<u8>> {
        let names = collect_records(&self.node);
        let avro = to_avro(value, &self.node, &names)?;
        let bytes = apache_avro::to_avro_datum(&self.schema, avro)?;
        tracing::trace!(bytes = bytes.len(), "encoded avro datum");
        Ok(bytes)
    }

    /// Decode a datum. `writer` is the schema the bytes were produced with
    /// when it differs from this codec's schema.
    pub fn decode(&self, bytes: &[u8], writer: Option<&SchemaNode>) -> Result<WireValue> {
        let mut reader = bytes;
        let value = match writer {
            Some(writer) if *writer != self.node => {
                let writer = parse_schema(writer)?;
                apache_avro::from_avro_datum(&writer, &mut reader, Some(&self.schema))?
            }
            _ => apache_avro::from_avro_datum(&self.schema, &mut reader, None)?,
        };
        from_avro(value)
    }
}

/// Validate a schema tree by handing its JSON form to apache-avro
pub fn parse_schema(node: &SchemaNode) -> Result<Schema> {
    Ok(Schema::parse(&node.to_json())?)
}

/// One-shot encode; prefer [`AvroCodec`] when encoding repeatedly
pub fn encode(schema: &SchemaNode, value: &WireValue) -> Result<Vec<u8>> {
    AvroCodec::new(schema.clone())?.encode(value)
}

/// One-shot decode against `reader`, resolving from `writer` when given
pub fn decode(bytes: &[u8], reader: &SchemaNode, writer: Option<&SchemaNode>) -> Result<WireValue> {
    AvroCodec::new(reader.clone())?.decode(bytes, writer)
}

/// Record definitions reachable from `node`, by name
fn collect_records(node: &SchemaNode) -> HashMap<String, &RecordSchema> {
    fn walk<'n>(node: &'n SchemaNode, names: &mut HashMap<String, &'n RecordSchema>) {
        match node {
            SchemaNode::Record(record) => {
                names.insert(record.name.clone(), record);
                for field in &record.fields {
                    walk(&field.schema, names);
                }
            }
            SchemaNode::Union(variants) => variants.iter().for_each(|v| walk(v, names)),
            SchemaNode::Primitive(_) | SchemaNode::Reference(_) => {}
        }
    }

    let mut names = HashMap::new();
    walk(node, &mut names);
    names
}

fn to_avro(
    value: &WireValue,
    schema: &SchemaNode,
    names: &HashMap<String, &RecordSchema>,
) -> Result<AvroValue> {
    match schema {
        SchemaNode::Primitive(kind) => primitive_to_avro(value, *kind),
        SchemaNode::Record(record) => record_to_avro(value, record, names),
        SchemaNode::Reference(name) => {
            let record = names.get(name).ok_or_else(|| {
                BridgeError::Codec(format!("reference to undefined record {}", name))
            })?;
            record_to_avro(value, record, names)
        }
        SchemaNode::Union(variants) => {
            // the last branch error is the informative one for ["null", T]
            let mut last_error = None;
            for (index, variant) in variants.iter().enumerate() {
                match to_avro(value, variant, names) {
                    Ok(inner) => return Ok(AvroValue::Union(index as u32, Box::new(inner))),
                    Err(err) => last_error = Some(err),
                }
            }
            Err(last_error.unwrap_or_else(|| {
                BridgeError::mismatch(schema.type_label(), value.kind_name())
            }))
        }
    }
}

fn record_to_avro(
    value: &WireValue,
    record: &RecordSchema,
    names: &HashMap<String, &RecordSchema>,
) -> Result<AvroValue> {
    let map = value
        .as_map()
        .ok_or_else(|| {
            BridgeError::mismatch(format!("record {}", record.name), value.kind_name())
        })?;

    let mut fields = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let avro = match (map.get(&field.name), &field.default) {
            (Some(value), _) => to_avro(value, &field.schema, names)?,
            (None, Some(default)) => to_avro(&json_to_wire(default)?, &field.schema, names)?,
            (None, None) => {
                return Err(BridgeError::MissingRequiredField {
                    record: record.name.clone(),
                    field: field.name.clone(),
                })
            }
        };
        fields.push((field.name.clone(), avro));
    }
    Ok(AvroValue::Record(fields))
}

fn primitive_to_avro(value: &WireValue, kind: PrimitiveKind) -> Result<AvroValue> {
    let avro = match (kind, value) {
        (PrimitiveKind::Null, WireValue::Null) => AvroValue::Null,
        (PrimitiveKind::Boolean, WireValue::Boolean(v)) => AvroValue::Boolean(*v),
        (PrimitiveKind::Int, WireValue::Int(v)) => AvroValue::Int(*v),
        (PrimitiveKind::Int, WireValue::Long(v)) if i32::try_from(*v).is_ok() => {
            AvroValue::Int(*v as i32)
        }
        (PrimitiveKind::Long, WireValue::Long(v)) => AvroValue::Long(*v),
        (PrimitiveKind::Long, WireValue::Int(v)) => AvroValue::Long(i64::from(*v)),
        (PrimitiveKind::Float, WireValue::Float(v)) => AvroValue::Float(*v),
        (PrimitiveKind::Double, WireValue::Double(v)) => AvroValue::Double(*v),
        (PrimitiveKind::Double, WireValue::Float(v)) => AvroValue::Double(f64::from(*v)),
        (PrimitiveKind::Bytes, WireValue::Bytes(v)) => AvroValue::Bytes(v.clone()),
        (PrimitiveKind::String, WireValue::String(v)) => AvroValue::String(v.clone()),
        (kind, other) => return Err(BridgeError::mismatch(kind.avro_name(), other.kind_name())),
    };
    Ok(avro)
}

/// Schema defaults are JSON; only scalar defaults can appear in derived schemas
fn json_to_wire(value: &Value) -> Result<WireValue> {
    match value {
        Value::Null => Ok(WireValue::Null),
        Value::Bool(v) => Ok(WireValue::Boolean(*v)),
        Value::Number(n) => n
            .as_i64()
            .map(WireValue::Long)
            .or_else(|| n.as_f64().map(WireValue::Double))
            .ok_or_else(|| BridgeError::InvalidValue(format!("unrepresentable default {}", n))),
        Value::String(s) => Ok(WireValue::String(s.clone())),
        other => Err(BridgeError::InvalidValue(format!("unsupported default {}", other))),
    }
}

fn from_avro(value: AvroValue) -> Result<WireValue> {
    Ok(match value {
        AvroValue::Null => WireValue::Null,
        AvroValue::Boolean(v) => WireValue::Boolean(v),
        AvroValue::Int(v) => WireValue::Int(v),
        AvroValue::Long(v) => WireValue::Long(v),
        AvroValue::Float(v) => WireValue::Float(v),
        AvroValue::Double(v) => WireValue::Double(v),
        AvroValue::Bytes(v) => WireValue::Bytes(v),
        AvroValue::Fixed(_, v) => WireValue::Bytes(v),
        AvroValue::String(v) => WireValue::String(v),
        AvroValue::Enum(_, symbol) => WireValue::String(symbol),
        AvroValue::Union(_, inner) => from_avro(*inner)?,
        AvroValue::Record(fields) => WireValue::Map(
            fields
                .into_iter()
                .map(|(name, value)| Ok((name, from_avro(value)?)))
                .collect::<Result<BTreeMap<_, _>>>()?,
        ),
        other => return Err(BridgeError::Codec(format!("unsupported avro value {:?}", other))),
    })
}
