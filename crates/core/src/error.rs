//! Error types shared by the encoding and configuration layers.

use std::path::PathBuf;

/// Failures while turning an [`Event`](crate::event::Event) into a
/// routing key and payload.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The event lacks a field that the routing rule for its kind needs.
    #[error("Missing field `{field}` on {kind} event")]
    MissingField { kind: String, field: String },

    /// The configured payload format is not one we can produce.
    #[error("Unsupported encoding: {0}")]
    UnsupportedFormat(String),

    /// The payload could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while loading a [`BrokerConfig`](crate::config::BrokerConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Failed to read config file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
