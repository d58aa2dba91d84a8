//! Native type identities and the primitive type catalog
//!
//! Every native field type is identified by a [`TypeKey`]. The catalog maps a
//! closed set of keys to Avro kinds. Container kinds are listed only so that
//! they can be rejected by name when they show up as a bare field type.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::record::Datum;

/// Identity of a native type. Equality is by [`TypeId`] only.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full Rust type name, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Avro primitive type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
}

impl PrimitiveKind {
    /// Avro type name (e.g. "string")
    pub fn avro_name(&self) -> &'static str {
        match self {
            PrimitiveKind::Null => "null",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::String => "string",
        }
    }

    pub fn from_avro_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "bytes" => Some(Self::Bytes),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.avro_name())
    }
}

/// Container kinds known to the catalog (always rejected without an extension)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Array,
    Record,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Array => f.write_str("array"),
            ContainerKind::Record => f.write_str("record"),
        }
    }
}

/// What the catalog knows about a native type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry {
    Scalar(PrimitiveKind),
    Container(ContainerKind),
}

/// Fixed mapping from native primitive types to Avro kinds
#[derive(Debug, Clone)]
pub struct PrimitiveCatalog {
    entries: HashMap<TypeKey, CatalogEntry>,
}

impl PrimitiveCatalog {
    pub fn new() -> Self {
        let scalars = [
            (TypeKey::of::<()>(), PrimitiveKind::Null),
            (TypeKey::of::<bool>(), PrimitiveKind::Boolean),
            (TypeKey::of::<i32>(), PrimitiveKind::Int),
            (TypeKey::of::<i64>(), PrimitiveKind::Long),
            (TypeKey::of::<f32>(), PrimitiveKind::Float),
            (TypeKey::of::<f64>(), PrimitiveKind::Double),
            (TypeKey::of::<Vec<u8>>(), PrimitiveKind::Bytes),
            (TypeKey::of::<String>(), PrimitiveKind::String),
        ];
        let containers = [
            (TypeKey::of::<Vec<Datum>>(), ContainerKind::Array),
            (TypeKey::of::<Vec<String>>(), ContainerKind::Array),
            (TypeKey::of::<Vec<i32>>(), ContainerKind::Array),
            (TypeKey::of::<Vec<i64>>(), ContainerKind::Array),
            (TypeKey::of::<HashMap<String, Datum>>(), ContainerKind::Record),
            (TypeKey::of::<BTreeMap<String, Datum>>(), ContainerKind::Record),
            (TypeKey::of::<HashMap<String, String>>(), ContainerKind::Record),
            (TypeKey::of::<BTreeMap<String, String>>(), ContainerKind::Record),
        ];

        let entries = scalars
            .into_iter()
            .map(|(key, kind)| (key, CatalogEntry::Scalar(kind)))
            .chain(
                containers
                    .into_iter()
                    .map(|(key, kind)| (key, CatalogEntry::Container(kind))),
            )
            .collect();

        Self { entries }
    }

    pub fn get(&self, key: &TypeKey) -> Option<CatalogEntry> {
        self.entries.get(key).copied()
    }

    /// Scalar kind for a key, if it maps to one
    pub fn scalar(&self, key: &TypeKey) -> Option<PrimitiveKind> {
        match self.get(key) {
            Some(CatalogEntry::Scalar(kind)) => Some(kind),
            _ => None,
        }
    }
}

impl Default for PrimitiveCatalog {
    fn default() -> Self {
        Self::new()
    }
}
