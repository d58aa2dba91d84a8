//! Schema compatibility checking
//!
//! Compares two derived schemas of the same record and classifies every
//! difference under Avro resolution rules, from the point of view of a
//! reader on the new schema consuming data written with the old one.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::schema::{FieldSchema, RecordSchema, SchemaNode};
use crate::types::PrimitiveKind;

/// Result of a compatibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Whether the schemas are compatible
    pub is_compatible: bool,
    /// Whether this is a breaking change
    pub is_breaking: bool,
    /// List of changes detected
    pub changes: Vec<SchemaChange>,
    /// Summary of the compatibility check
    pub summary: String,
}

impl CompatibilityResult {
    pub fn compatible(changes: Vec<SchemaChange>) -> Self {
        let summary = if changes.is_empty() {
            "No changes detected".to_string()
        } else {
            format!("{} compatible changes detected", changes.len())
        };
        Self {
            is_compatible: true,
            is_breaking: false,
            changes,
            summary,
        }
    }

    pub fn incompatible(changes: Vec<SchemaChange>, reason: impl Into<String>) -> Self {
        Self {
            is_compatible: false,
            is_breaking: true,
            changes,
            summary: reason.into(),
        }
    }

    /// Changes that break resolution
    pub fn breaking_changes(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(|c| c.is_breaking)
    }
}

/// A detected change between schema versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaChange {
    pub change_type: ChangeType,
    /// Path to the changed field (e.g. "fields.user.fields.id")
    pub path: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub is_breaking: bool,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    FieldAdded,
    FieldRemoved,
    TypeChanged,
    /// Nullable <-> required
    OptionalityChanged,
}

/// Compatibility checker for derived schemas
pub struct CompatibilityChecker {
    /// Strict mode - any change is considered breaking
    strict_mode: bool,
}

impl CompatibilityChecker {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Compare `old` (writer) against `new` (reader). Both must be records
    /// with the same name.
    pub fn check(&self, old: &SchemaNode, new: &SchemaNode) -> Result<CompatibilityResult> {
        let (old, new) = match (old.as_record(), new.as_record()) {
            (Some(old), Some(new)) => (old, new),
            _ => {
                return Err(BridgeError::IncompatibleChange(
                    "Only record schemas can be compared".to_string(),
                ))
            }
        };
        if old.name != new.name {
            return Err(BridgeError::IncompatibleChange(format!(
                "Cannot compare record {} with record {}",
                old.name, new.name
            )));
        }

        let mut changes = Vec::new();
        self.detect_record_changes(old, new, "", &mut changes);
        let breaking_count = changes.iter().filter(|c| c.is_breaking).count();

        let result = if self.strict_mode && !changes.is_empty() {
            CompatibilityResult::incompatible(
                changes,
                format!("Strict mode: {} changes detected", breaking_count),
            )
        } else if breaking_count > 0 {
            CompatibilityResult::incompatible(
                changes,
                format!("{} breaking changes detected", breaking_count),
            )
        } else {
            CompatibilityResult::compatible(changes)
        };
        tracing::debug!(
            record = %old.name,
            breaking = breaking_count,
            "checked schema compatibility"
        );
        Ok(result)
    }

    fn detect_record_changes(
        &self,
        old: &RecordSchema,
        new: &RecordSchema,
        prefix: &str,
        changes: &mut Vec<SchemaChange>,
    ) {
        let path_of = |name: &str| format!("{}fields.{}", prefix, name);

        for old_field in &old.fields {
            if new.get_field(&old_field.name).is_none() {
                let had_default = old_field.default.is_some();
                changes.push(SchemaChange {
                    change_type: ChangeType::FieldRemoved,
                    path: path_of(&old_field.name),
                    old_value: Some(old_field.schema.type_label()),
                    new_value: None,
                    is_breaking: !had_default,
                    description: if had_default {
                        format!("Field '{}' with default was removed", old_field.name)
                    } else {
                        format!("Required field '{}' was removed (breaking)", old_field.name)
                    },
                });
            }
        }

        for new_field in &new.fields {
            if old.get_field(&new_field.name).is_none() {
                let has_default = new_field.default.is_some();
                changes.push(SchemaChange {
                    change_type: ChangeType::FieldAdded,
                    path: path_of(&new_field.name),
                    old_value: None,
                    new_value: Some(new_field.schema.type_label()),
                    is_breaking: !has_default,
                    description: if has_default {
                        format!("Field '{}' was added with default value", new_field.name)
                    } else {
                        format!("Field '{}' was added without default (breaking)", new_field.name)
                    },
                });
            }
        }

        for old_field in &old.fields {
            if let Some(new_field) = new.get_field(&old_field.name) {
                self.detect_field_changes(old_field, new_field, &path_of(&old_field.name), changes);
            }
        }
    }

    fn detect_field_changes(
        &self,
        old: &FieldSchema,
        new: &FieldSchema,
        path: &str,
        changes: &mut Vec<SchemaChange>,
    ) {
        let (old_inner, new_inner) = (old.schema.non_null(), new.schema.non_null());

        if old_inner.type_label() != new_inner.type_label() {
            let promoted = is_promotion(old_inner, new_inner);
            changes.push(SchemaChange {
                change_type: ChangeType::TypeChanged,
                path: format!("{}.type", path),
                old_value: Some(old_inner.type_label()),
                new_value: Some(new_inner.type_label()),
                is_breaking: !promoted,
                description: if promoted {
                    format!("Field '{}' type was promoted", old.name)
                } else {
                    format!("Field '{}' type changed", old.name)
                },
            });
        } else if let (SchemaNode::Record(old_record), SchemaNode::Record(new_record)) =
            (old_inner, new_inner)
        {
            self.detect_record_changes(old_record, new_record, &format!("{}.", path), changes);
        }

        let (was_nullable, is_nullable) = (old.schema.is_nullable(), new.schema.is_nullable());
        if was_nullable != is_nullable {
            // Nulls written by the old schema cannot be read as a required value
            let breaking = was_nullable && !is_nullable;
            changes.push(SchemaChange {
                change_type: ChangeType::OptionalityChanged,
                path: path.to_string(),
                old_value: Some(old.schema.type_label()),
                new_value: Some(new.schema.type_label()),
                is_breaking: breaking,
                description: if breaking {
                    format!("Field '{}' is no longer nullable (breaking)", old.name)
                } else {
                    format!("Field '{}' became nullable", old.name)
                },
            });
        }
    }
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Avro numeric promotions a reader applies to writer values
fn is_promotion(writer: &SchemaNode, reader: &SchemaNode) -> bool {
    use PrimitiveKind::*;
    matches!(
        (writer, reader),
        (SchemaNode::Primitive(Int), SchemaNode::Primitive(Long | Float | Double))
            | (SchemaNode::Primitive(Long), SchemaNode::Primitive(Float | Double))
            | (SchemaNode::Primitive(Float), SchemaNode::Primitive(Double))
            | (SchemaNode::Primitive(String), SchemaNode::Primitive(Bytes))
            | (SchemaNode::Primitive(Bytes), SchemaNode::Primitive(String))
    )
}
