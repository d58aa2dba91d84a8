//! Avro schema trees and their derivation from record types
//!
//! [`SchemaBuilder`] walks a [`RecordType`] once and produces a [`RecordSchema`]:
//!
//! 1. a field whose type has a registered extension gets the extension's fragment;
//! 2. a catalog primitive gets its Avro kind;
//! 3. a catalog container is rejected;
//! 4. a nested record is defined in full the first time its name is seen in
//!    this derivation and referenced by bare name afterwards, as long as its
//!    field names match the first definition;
//! 5. anything else is rejected.
//!
//! A field that declares any default becomes `["null", T]` with a `null`
//! default. The concrete default is not carried to the wire; readers apply it
//! themselves during reconciliation.

use std::collections::{HashMap, HashSet};

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::checksum::Checksum;
use crate::error::{BridgeError, Result};
use crate::extension::ExtensionRegistry;
use crate::record::{FieldType, RecordType};
use crate::types::{CatalogEntry, PrimitiveCatalog, PrimitiveKind};

/// Deepest record nesting accepted by [`SchemaBuilder`]
pub const MAX_NESTING_DEPTH: usize = 32;

// =============================================================================
// Schema tree
// =============================================================================

/// A node of a derived Avro schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Primitive(PrimitiveKind),
    /// Full definition of a named record
    Record(RecordSchema),
    /// Bare name of a record defined earlier in the same schema
    Reference(String),
    Union(Vec<SchemaNode>),
}

/// A named record definition
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub fields: Vec<FieldSchema>,
}

/// One field of a record definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub schema: SchemaNode,
    /// JSON default; `Some(Value::Null)` is an explicit `"default": null`
    pub default: Option<Value>,
}

impl SchemaNode {
    /// `["null", inner]`
    pub fn nullable(inner: SchemaNode) -> Self {
        SchemaNode::Union(vec![SchemaNode::Primitive(PrimitiveKind::Null), inner])
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            SchemaNode::Union(variants) => variants
                .iter()
                .any(|v| *v == SchemaNode::Primitive(PrimitiveKind::Null)),
            SchemaNode::Primitive(PrimitiveKind::Null) => true,
            _ => false,
        }
    }

    /// The non-null branch of a `["null", T]` union, or the node itself
    pub fn non_null(&self) -> &SchemaNode {
        match self {
            SchemaNode::Union(variants) if variants.len() == 2 && self.is_nullable() => variants
                .iter()
                .find(|v| **v != SchemaNode::Primitive(PrimitiveKind::Null))
                .unwrap_or(self),
            _ => self,
        }
    }

    pub fn as_record(&self) -> Option<&RecordSchema> {
        match self {
            SchemaNode::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Short label used when comparing schemas ("string", "record UserData", ...)
    pub fn type_label(&self) -> String {
        match self {
            SchemaNode::Primitive(kind) => kind.avro_name().to_string(),
            SchemaNode::Record(record) => record.name.clone(),
            SchemaNode::Reference(name) => name.clone(),
            SchemaNode::Union(variants) => {
                let labels: Vec<_> = variants.iter().map(|v| v.type_label()).collect();
                format!("[{}]", labels.join(", "))
            }
        }
    }

    /// Avro JSON form
    pub fn to_json(&self) -> Value {
        match self {
            SchemaNode::Primitive(kind) => Value::String(kind.avro_name().to_string()),
            SchemaNode::Reference(name) => Value::String(name.clone()),
            SchemaNode::Union(variants) => {
                Value::Array(variants.iter().map(|v| v.to_json()).collect())
            }
            SchemaNode::Record(record) => record.to_json(),
        }
    }

    /// Deterministic, key-sorted JSON text
    pub fn canonical_json(&self) -> String {
        // serde_json::Map is ordered by key, so serialization is already sorted
        self.to_json().to_string()
    }

    /// SHA-256 of [`canonical_json`](Self::canonical_json)
    pub fn checksum(&self) -> Checksum {
        Checksum::from_str(&self.canonical_json())
    }

    /// Parse an Avro JSON schema restricted to the shapes this crate emits
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(PrimitiveKind::from_avro_name(name)
                .map(SchemaNode::Primitive)
                .unwrap_or_else(|| SchemaNode::Reference(name.clone()))),
            Value::Array(variants) => variants
                .iter()
                .map(SchemaNode::from_json)
                .collect::<Result<Vec<_>>>()
                .map(SchemaNode::Union),
            Value::Object(object) => match object.get("type") {
                Some(Value::String(kind)) if kind == "record" => {
                    RecordSchema::from_json(object).map(SchemaNode::Record)
                }
                Some(inner @ Value::String(_)) if object.get("fields").is_none() => {
                    SchemaNode::from_json(inner)
                }
                _ => Err(BridgeError::InvalidValue(format!("unsupported schema node: {}", value))),
            },
            other => Err(BridgeError::InvalidValue(format!("unsupported schema node: {}", other))),
        }
    }

    pub fn parse_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            doc: None,
            fields: Vec::new(),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("type".to_string(), json!("record"));
        object.insert("name".to_string(), json!(self.name));
        if let Some(namespace) = &self.namespace {
            object.insert("namespace".to_string(), json!(namespace));
        }
        if let Some(doc) = &self.doc {
            object.insert("doc".to_string(), json!(doc));
        }
        let fields = self
            .fields
            .iter()
            .map(|field| {
                let mut entry = Map::new();
                entry.insert("name".to_string(), json!(field.name));
                entry.insert("type".to_string(), field.schema.to_json());
                if let Some(default) = &field.default {
                    entry.insert("default".to_string(), default.clone());
                }
                Value::Object(entry)
            })
            .collect();
        object.insert("fields".to_string(), Value::Array(fields));
        Value::Object(object)
    }

    fn from_json(object: &Map<String, Value>) -> Result<Self> {
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let name = text("name")
            .ok_or_else(|| BridgeError::InvalidValue("record without a name".to_string()))?;
        let raw_fields = object
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                BridgeError::InvalidValue(format!("record {} has no fields array", name))
            })?;

        let mut fields = Vec::with_capacity(raw_fields.len());
        for raw in raw_fields {
            let field_name = raw
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    BridgeError::InvalidValue(format!("unnamed field in record {}", name))
                })?;
            let schema = raw
                .get("type")
                .ok_or_else(|| {
                    BridgeError::InvalidValue(format!("field {} has no type", field_name))
                })?;
            fields.push(FieldSchema {
                name: field_name.to_string(),
                schema: SchemaNode::from_json(schema)?,
                default: raw.get("default").cloned(),
            });
        }

        Ok(Self {
            name,
            namespace: text("namespace"),
            doc: text("doc"),
            fields,
        })
    }
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, schema: SchemaNode) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Derives Avro schemas from record types. One builder is one derivation
/// pass: its set of defined record names is never shared.
pub struct SchemaBuilder<'a> {
    registry: &'a ExtensionRegistry,
    catalog: PrimitiveCatalog,
    /// Record names already defined in this pass, with their field names
    defined: HashMap<String, Vec<String>>,
    /// Records currently being expanded, outermost first
    ancestors: Vec<String>,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(registry: &'a ExtensionRegistry) -> Self {
        Self {
            registry,
            catalog: PrimitiveCatalog::new(),
            defined: HashMap::new(),
            ancestors: Vec::new(),
        }
    }

    /// Derive the full schema of `record`
    pub fn derive(&mut self, record: &RecordType) -> Result<RecordSchema> {
        self.define(record);
        self.record_schema(record)
    }

    /// Derive one field; `has_default` makes it nullable with a null default
    pub fn derive_field(
        &mut self,
        name: &str,
        field_type: &FieldType,
        has_default: bool,
    ) -> Result<FieldSchema> {
        let schema = self.type_schema(name, field_type)?;
        if has_default {
            Ok(FieldSchema::new(name, SchemaNode::nullable(schema)).with_default(Value::Null))
        } else {
            Ok(FieldSchema::new(name, schema))
        }
    }

    /// Whether a record name has been defined in this pass
    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains_key(name)
    }

    fn record_schema(&mut self, record: &RecordType) -> Result<RecordSchema> {
        if self.ancestors.len() >= MAX_NESTING_DEPTH {
            return Err(BridgeError::NestingTooDeep {
                path: self.path_to(record.name()),
                limit: MAX_NESTING_DEPTH,
            });
        }

        let mut names = HashSet::new();
        if let Some(duplicate) = record.fields().iter().find(|f| !names.insert(f.name.as_str())) {
            return Err(BridgeError::DuplicateField {
                record: record.name().to_string(),
                field: duplicate.name.clone(),
            });
        }

        self.ancestors.push(record.name().to_string());
        let fields = record
            .fields()
            .iter()
            .map(|field| self.derive_field(&field.name, &field.field_type, field.has_default()))
            .collect::<Result<Vec<_>>>();
        self.ancestors.pop();

        Ok(RecordSchema {
            name: record.name().to_string(),
            namespace: None,
            doc: None,
            fields: fields?,
        })
    }

    fn type_schema(&mut self, field: &str, field_type: &FieldType) -> Result<SchemaNode> {
        match field_type {
            FieldType::Native(key) => {
                if let Some(extension) = self.registry.lookup(key) {
                    return Ok(extension.schema_fragment());
                }
                match self.catalog.get(key) {
                    Some(CatalogEntry::Scalar(kind)) => Ok(SchemaNode::Primitive(kind)),
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
            FieldType::Record(record_ref) => {
                let nested = record_ref.resolve();
                let name = nested.name();

                if self.ancestors.iter().any(|a| a == name) {
                    return Err(BridgeError::RecursiveRecordType { path: self.path_to(name) });
                }
                if let Some(first) = self.defined.get(name) {
                    let second = field_names(&nested);
                    if *first != second {
                        return Err(BridgeError::ConflictingRecordName {
                            name: name.to_string(),
                            first: first.clone(),
                            second,
                        });
                    }
                    tracing::debug!(
                        record = name,
                        field,
                        "record already defined, emitting reference"
                    );
                    return Ok(SchemaNode::Reference(name.to_string()));
                }

                self.define(&nested);
                self.record_schema(&nested).map(SchemaNode::Record)
            }
        }
    }

    fn define(&mut self, record: &RecordType) {
        self.defined.insert(record.name().to_string(), field_names(record));
    }

    fn path_to(&self, name: &str) -> String {
        let mut path = self.ancestors.clone();
        path.push(name.to_string());
        path.join(" -> ")
    }
}

fn field_names(record: &RecordType) -> Vec<String> {
    record.fields().iter().map(|f| f.name.clone()).collect()
}
