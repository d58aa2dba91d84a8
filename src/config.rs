//! Envelope configuration for [`AvroBridge`](crate::bridge::AvroBridge)
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (bridge.toml)
//! - Environment variables (AVRO_BRIDGE__*)
//!
//! ## Example config file (bridge.toml):
//! ```toml
//! source = "/openedx/lms/web"
//! sourcehost = "edx.devstack.lms"
//! event_type = "org.openedx.learning.course.enrollment.created.v1"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Values stamped on every CloudEvent envelope a bridge emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Logical emitter of the event
    #[serde(default = "default_source")]
    pub source: String,

    /// Host that emitted the event
    #[serde(default = "default_sourcehost")]
    pub sourcehost: String,

    /// `{reverse dns}.{subdomain}.{subject}.{action}.{major version}`
    #[serde(default = "default_event_type")]
    pub event_type: String,
}

fn default_source() -> String {
    "/openedx/unknown/avro_attrs_bridge".to_string()
}

fn default_sourcehost() -> String {
    "unknown".to_string()
}

fn default_event_type() -> String {
    "org.openedx.test.test.test.v0".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            sourcehost: default_sourcehost(),
            event_type: default_event_type(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with `config_path` as a required extra file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["bridge.toml", ".bridge.toml", "config/bridge.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("org", "openedx", "avro-bridge") {
            let xdg_config = dirs.config_dir().join("bridge.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(Environment::with_prefix("AVRO_BRIDGE").separator("__"));

        let config = builder.build()?;
        let loaded: Self = config.try_deserialize()?;
        tracing::debug!(
            source = %loaded.source,
            event_type = %loaded.event_type,
            "loaded bridge config"
        );
        Ok(loaded)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }
}
