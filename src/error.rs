//! Unified error taxonomy for schema registration, validation, and policy
//! configuration.
//!
//! Every fallible operation in this crate returns [`Result<T>`], an alias
//! over [`TelemetryError`]. Errors are never swallowed on the emission
//! path except for the two deliberate no-ops documented on
//! [`crate::emitter::EventEmitter::record_event`].

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// The complete set of failure modes this crate can surface.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The schema document itself is not valid JSON Schema, is missing a
    /// required top-level field, or violates the `categories` invariants.
    #[error("schema error: {0}")]
    Schema(String),

    /// Registration conflicts with an existing `(id, version)` entry under
    /// an incompatible duplicate policy, or the duplicate policy token
    /// itself is unrecognized.
    #[error("schema conflict for {id:?} version {version}: {reason}")]
    SchemaConflict {
        id: String,
        version: i64,
        reason: String,
    },

    /// `record_event` referenced a schema `(id, version)` that was never
    /// registered.
    #[error("schema {id:?} version {version} is not registered")]
    UnregisteredSchema { id: String, version: i64 },

    /// An event instance does not satisfy its schema.
    #[error("event failed schema validation at {instance_path}: {message}")]
    Validation {
        instance_path: String,
        message: String,
    },

    /// A configuration document (allowed-schemas policy, sink config)
    /// contains a key this crate does not recognize.
    #[error("unrecognized configuration key {key:?} in {context}")]
    Policy { key: String, context: String },

    /// A sink raised while accepting a capsule.
    #[error("sink {sink} failed to accept event: {source}")]
    Sink {
        sink: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TelemetryError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub(crate) fn conflict(id: impl Into<String>, version: i64, reason: impl Into<String>) -> Self {
        Self::SchemaConflict {
            id: id.into(),
            version,
            reason: reason.into(),
        }
    }

    pub(crate) fn unregistered(id: impl Into<String>, version: i64) -> Self {
        Self::UnregisteredSchema {
            id: id.into(),
            version,
        }
    }

    pub(crate) fn validation(instance_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            instance_path: instance_path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn policy(key: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Policy {
            key: key.into(),
            context: context.into(),
        }
    }
}
