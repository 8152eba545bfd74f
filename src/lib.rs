//! Structured-event telemetry: schema-validated, category-redacted event
//! emission for embedding in a host process.
//!
//! A host registers JSON Schema documents (each property tagged with the
//! categories of sensitive data it carries), configures which categories
//! and which individually-whitelisted properties each schema is allowed
//! to emit, and calls [`emitter::EventEmitter::record_event`] per event.
//! Every event is validated against its schema, redacted according to the
//! configured policy, wrapped in an envelope carrying a timestamp and
//! schema identity, and handed to every configured sink.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use telecapsule::emitter::EventEmitter;
//! use telecapsule::policy::AllowedSchemas;
//! use telecapsule::schema::DuplicatePolicy;
//! use telecapsule::sink::CollectorSink;
//!
//! let sink = Arc::new(CollectorSink::new("test"));
//! let emitter = EventEmitter::builder()
//!     .sink(sink.clone())
//!     .allowed_schemas(AllowedSchemas::from_value(&json!(["example.event"])).unwrap())
//!     .build()
//!     .unwrap();
//!
//! emitter.register_schema(json!({
//!     "$id": "example.event",
//!     "version": 1,
//!     "properties": {
//!         "action": {"type": "string", "categories": ["unrestricted"]}
//!     }
//! }), DuplicatePolicy::Raise).unwrap();
//!
//! emitter.record_event("example.event", 1, &json!({"action": "login"})).unwrap();
//! assert_eq!(sink.received().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod builder;
pub mod emitter;
pub mod envelope;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod policy;
pub mod registry;
pub mod schema;
pub mod sink;
pub mod validator;

pub use emitter::{EmitterBuilder, EventEmitter};
pub use envelope::{Capsule, TELEMETRY_METADATA_VERSION};
pub use error::{Result, TelemetryError};
pub use policy::{AllowedSchemas, EmitterConfig, SchemaPolicy, Settings};
pub use registry::SchemaRegistry;
pub use schema::{DuplicatePolicy, Schema};
pub use sink::Sink;
pub use validator::{CompiledValidator, ReferenceValidator, SchemaValidator};
