//! Error types for the Avro bridge

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(
        "Field '{field}' has type {type_name}, which is not a primitive, a record, \
         or a type with a registered extension"
    )]
    UnsupportedType { field: String, type_name: String },

    #[error(
        "Field '{field}' has container type {type_name} ({kind}); \
         container fields are not supported"
    )]
    UnsupportedContainerType {
        field: String,
        type_name: String,
        kind: String,
    },

    #[error("Missing required field '{field}' for record {record}")]
    MissingRequiredField { record: String, field: String },

    #[error("No extension registered for type {type_name}")]
    ExtensionNotFound { type_name: String },

    #[error("Duplicate field '{field}' in record {record}")]
    DuplicateField { record: String, field: String },

    #[error("Record name {name} is used for two different shapes: {first:?} and {second:?}")]
    ConflictingRecordName {
        name: String,
        first: Vec<String>,
        second: Vec<String>,
    },

    #[error("Record type refers back to itself: {path}")]
    RecursiveRecordType { path: String },

    #[error("Record nesting exceeds {limit} levels at {path}")]
    NestingTooDeep { path: String, limit: usize },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Incompatible schemas: {0}")]
    IncompatibleChange(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Avro codec error: {0}")]
    Codec(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl From<apache_avro::Error> for BridgeError {
    fn from(err: apache_avro::Error) -> Self {
        BridgeError::Codec(err.to_string())
    }
}

impl BridgeError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        BridgeError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
