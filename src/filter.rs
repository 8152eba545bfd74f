//! The redaction filter (§4.C): given category annotations and a policy,
//! produce a redacted deep copy of an event. The caller's original event
//! is never touched (F6).

use std::collections::HashSet;

use serde_json::Value;

use crate::extractor::{Annotations, Path, PathSegment};

/// `unrestricted` is always implicitly a member of `allowed_categories`
/// (F5) — this is a property of the policy's meaning, not something every
/// caller must remember to add.
const UNRESTRICTED: &str = "unrestricted";

/// Produce a redacted deep copy of `event`.
///
/// - F1: top-level keys with no category annotation at all are nulled.
/// - F2/F5: an annotated property passes through iff its categories are a
///   subset of `allowed_categories ∪ {unrestricted}`, or its top-level
///   ancestor is in `allowed_properties`.
/// - F3/F4: disallowed properties are nulled in place; attempting to null
///   a descendant of an already-nulled ancestor is detected and skipped.
pub fn apply(
    event: &Value,
    annotations: &Annotations,
    allowed_categories: &HashSet<String>,
    allowed_properties: &HashSet<String>,
) -> Value {
    let mut copy = event.clone();

    if let Some(object) = copy.as_object_mut() {
        let top_level_keys: Vec<String> = object.keys().cloned().collect();
        for key in top_level_keys {
            let top_level_path = vec![PathSegment::Key(key.clone())];
            if !annotations.contains_key(&top_level_path) {
                if let Some(value) = object.get_mut(&key) {
                    *value = Value::Null;
                }
            }
        }
    }

    for (path, categories) in annotations {
        let top_level_ancestor = match path.first() {
            Some(PathSegment::Key(key)) => key.as_str(),
            _ => continue,
        };

        let allowed = categories
            .iter()
            .all(|c| c == UNRESTRICTED || allowed_categories.contains(c))
            || allowed_properties.contains(top_level_ancestor);

        if !allowed {
            null_at_path(&mut copy, path);
        }
    }

    copy
}

/// Set the value at `path` to null, silently skipping if an ancestor along
/// the way is already null or missing (F4).
fn null_at_path(root: &mut Value, path: &Path) {
    let Some((last, ancestors)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for segment in ancestors {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => match map.get_mut(key) {
                Some(value) => value,
                None => return,
            },
            (PathSegment::Index(index), Value::Array(array)) => match array.get_mut(*index) {
                Some(value) => value,
                None => return,
            },
            _ => return,
        };
    }

    match (last, current) {
        (PathSegment::Key(key), Value::Object(map)) => {
            if let Some(value) = map.get_mut(key) {
                *value = Value::Null;
            }
        }
        (PathSegment::Index(index), Value::Array(array)) => {
            if let Some(value) = array.get_mut(*index) {
                *value = Value::Null;
            }
        }
        _ => {}
    }
}
