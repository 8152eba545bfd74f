//! Pluggable validation strategies (§4.A).
//!
//! [`SchemaValidator`] is implemented twice: [`ReferenceValidator`]
//! recompiles a `jsonschema::Validator` on every call (simplest, no cache
//! invalidation concerns), and [`CompiledValidator`] caches the compiled
//! validator keyed by `(id, version)` in a bounded LRU so a hot
//! `record_event` path skips recompilation without holding every schema a
//! long-lived host process has ever registered. Both surface failures
//! through the same [`TelemetryError`] variants; neither emits category
//! information, even though both are built on the same `jsonschema`
//! traversal machinery the [extractor](crate::extractor) uses.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde_json::Value;

use crate::error::{Result, TelemetryError};
use crate::schema::{validate_is_json_schema, Schema};

/// Strategy for checking schema well-formedness and validating event
/// instances against a registered schema.
pub trait SchemaValidator: Send + Sync {
    /// Verify that `document` is itself valid JSON Schema.
    fn check_schema(&self, document: &Value) -> Result<()>;

    /// Verify that `event` satisfies `schema`.
    fn validate(&self, event: &Value, schema: &Schema) -> Result<()>;
}

fn compile(schema: &Schema) -> Result<jsonschema::Validator> {
    jsonschema::validator_for(schema.document())
        .map_err(|e| TelemetryError::schema(format!("failed to compile schema: {e}")))
}

fn report_first_error(validator: &jsonschema::Validator, event: &Value) -> Result<()> {
    if let Some(e) = validator.iter_errors(event).next() {
        return Err(TelemetryError::validation(
            e.instance_path.to_string(),
            e.to_string(),
        ));
    }
    Ok(())
}

/// Reference implementation: compiles a fresh validator on every call.
///
/// Simplest correct implementation; appropriate when schemas change
/// frequently relative to emission volume, or as a baseline to check the
/// compiled fast path against.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceValidator;

impl SchemaValidator for ReferenceValidator {
    fn check_schema(&self, document: &Value) -> Result<()> {
        validate_is_json_schema(document)
    }

    fn validate(&self, event: &Value, schema: &Schema) -> Result<()> {
        let validator = compile(schema)?;
        report_first_error(&validator, event)
    }
}

/// Default number of compiled validators kept around at once. A host
/// process that registers far more schemas than this will simply pay for
/// recompilation on cache eviction rather than holding every validator it
/// has ever seen.
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Fast-path implementation: caches compiled validators keyed by
/// `(id, version)` in a bounded LRU, populated lazily on first use.
pub struct CompiledValidator {
    cache: Mutex<LruCache<(String, i64), Arc<jsonschema::Validator>>>,
}

impl CompiledValidator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn compiled_for(&self, schema: &Schema) -> Result<Arc<jsonschema::Validator>> {
        let key = (schema.id().to_string(), schema.version());
        let mut cache = self.cache.lock().expect("validator cache poisoned");

        if let Some(validator) = cache.get(&key) {
            return Ok(validator.clone());
        }

        let compiled = Arc::new(compile(schema)?);
        cache.put(key, compiled.clone());
        Ok(compiled)
    }

    /// Drop any cached validator for `(id, version)`, forcing recompilation
    /// on next use. Useful after an `allow`-policy re-registration changes
    /// a schema's document in place.
    pub fn invalidate(&self, id: &str, version: i64) {
        self.cache
            .lock()
            .expect("validator cache poisoned")
            .pop(&(id.to_string(), version));
    }

    /// Number of validators currently cached.
    pub fn len(&self) -> usize {
        self.cache.lock().expect("validator cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CompiledValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator for CompiledValidator {
    fn check_schema(&self, document: &Value) -> Result<()> {
        validate_is_json_schema(document)
    }

    fn validate(&self, event: &Value, schema: &Schema) -> Result<()> {
        let validator = self.compiled_for(schema)?;
        report_first_error(&validator, event)
    }
}
