//! Signal declarations
//!
//! A signal is a named event whose payload is a loose set of keyword
//! arguments, each declared with a field type but without defaults.

use std::collections::BTreeMap;

use crate::record::{Datum, FieldType};

/// Payload of one signal: keyword name to value
pub type SignalData = BTreeMap<String, Datum>;

#[derive(Debug, Clone)]
pub struct Signal {
    event_type: String,
    init_data: Vec<(String, FieldType)>,
}

impl Signal {
    /// `event_type` follows `{reverse dns}.{subdomain}.{subject}.{action}.{major version}`
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            init_data: Vec::new(),
        }
    }

    /// Declare one keyword argument
    pub fn data(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.init_data.push((name.into(), field_type));
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.init_data
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldType> {
        self.init_data.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}
