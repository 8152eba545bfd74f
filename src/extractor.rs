//! Category extraction (§4.B): walk a schema+instance pair and collect
//! `(path, categories)` annotations for every property the schema tags
//! with `categories`.
//!
//! The walk follows `$ref` and `allOf` (unioning categories discovered in
//! each composition branch) and deliberately never descends into `if`,
//! `not`, `anyOf`, `oneOf`, `then`, or `else` — those are disjunctive or
//! negated contexts whose category claims are not authoritative for an
//! instance that merely *may* match one of several branches.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::schema::Schema;

/// One step of a path from the event root to an annotated property: either
/// an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{k}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A path from the event root to an annotated property.
pub type Path = Vec<PathSegment>;

/// The set of categories declared on a property, after unioning every
/// schema-composition branch that contributed to its path.
pub type Categories = BTreeSet<String>;

/// Complete mapping from property path to its declared categories,
/// produced by a single [`extract`] call.
pub type Annotations = HashMap<Path, Categories>;

/// Guards against pathologically deep instances (and, indirectly, against
/// `$ref`/`allOf` cycles that would otherwise only be bounded by instance
/// depth per the spec).
pub const DEFAULT_MAX_TRAVERSAL_DEPTH: usize = 64;

const MAX_REF_EXPANSION: usize = 32;

/// Composition keywords whose branches are never authoritative for
/// category extraction (§4.B rule 5). `expand_fragments` only ever reads
/// `$ref` and `allOf`, so these are never consulted; kept as a named list
/// so tests can check every one of them, not just `anyOf`.
#[cfg(test)]
const IGNORED_KEYWORDS: &[&str] = &["if", "not", "anyOf", "oneOf", "then", "else"];

/// Walk `event` against `schema`, returning every category annotation
/// reached during the structural descent, using the default traversal
/// depth guard.
pub fn extract(event: &Value, schema: &Schema) -> Annotations {
    extract_with_depth(event, schema, DEFAULT_MAX_TRAVERSAL_DEPTH)
}

/// As [`extract`], with an explicit recursion-depth ceiling.
pub fn extract_with_depth(event: &Value, schema: &Schema, max_depth: usize) -> Annotations {
    let mut out = Annotations::new();
    let root = schema.document();
    walk(root, root, event, &mut Vec::new(), &mut out, 0, max_depth);
    out
}

fn resolve_json_pointer<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    root.pointer(pointer)
}

fn resolve_ref<'a>(root: &'a Value, node: &'a Value) -> &'a Value {
    let mut current = node;
    let mut hops = 0;
    while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
        if hops >= MAX_REF_EXPANSION {
            break;
        }
        match resolve_json_pointer(root, reference) {
            Some(target) => current = target,
            None => break,
        }
        hops += 1;
    }
    current
}

/// Resolve `$ref` and flatten `allOf` into the list of schema fragments
/// that jointly constrain this node. Never follows `anyOf`/`oneOf`/`if`/
/// `not`/`then`/`else` — see module docs.
fn expand_fragments<'a>(root: &'a Value, node: &'a Value, out: &mut Vec<&'a Value>, depth: usize) {
    if depth >= MAX_REF_EXPANSION {
        return;
    }
    let resolved = resolve_ref(root, node);
    out.push(resolved);
    if let Some(branches) = resolved.get("allOf").and_then(Value::as_array) {
        for branch in branches {
            expand_fragments(root, branch, out, depth + 1);
        }
    }
}

fn direct_categories(root: &Value, node: &Value) -> Categories {
    let mut fragments = Vec::new();
    expand_fragments(root, node, &mut fragments, 0);
    let mut categories = Categories::new();
    for fragment in fragments {
        if let Some(values) = fragment.get("categories").and_then(Value::as_array) {
            for value in values {
                if let Some(token) = value.as_str() {
                    categories.insert(token.to_string());
                }
            }
        }
    }
    categories
}

/// Resolve `$ref`/`allOf` for `node` and return every literal `categories`
/// value found among the resulting fragments, unvalidated.
///
/// Used by [`crate::schema::check_schema_shape`] so a direct property whose
/// schema is only a `$ref`/`allOf` composition (with `categories` living on
/// the resolved target, not the referencing node itself) is recognized the
/// same way the extractor recognizes it at walk time.
pub(crate) fn categories_fragments<'a>(root: &'a Value, node: &'a Value) -> Vec<&'a Value> {
    let mut fragments = Vec::new();
    expand_fragments(root, node, &mut fragments, 0);
    fragments.into_iter().filter_map(|f| f.get("categories")).collect()
}

fn merge_annotation(out: &mut Annotations, path: Path, categories: Categories) {
    if categories.is_empty() {
        return;
    }
    out.entry(path).or_default().extend(categories);
}

fn item_schema_for_index<'a>(items: &'a Value, index: usize) -> Option<&'a Value> {
    if let Some(tuple) = items.as_array() {
        tuple.get(index)
    } else {
        Some(items)
    }
}

fn walk(
    root: &Value,
    node: &Value,
    instance: &Value,
    path: &mut Path,
    out: &mut Annotations,
    depth: usize,
    max_depth: usize,
) {
    if depth > max_depth {
        return;
    }

    let mut fragments = Vec::new();
    expand_fragments(root, node, &mut fragments, 0);

    if let Some(object) = instance.as_object() {
        let mut properties: HashMap<&str, Vec<&Value>> = HashMap::new();
        for fragment in &fragments {
            if let Some(props) = fragment.get("properties").and_then(Value::as_object) {
                for (key, subschema) in props {
                    properties.entry(key.as_str()).or_default().push(subschema);
                }
            }
        }

        for (key, subschemas) in properties {
            let Some(value) = object.get(key) else {
                continue;
            };
            path.push(PathSegment::Key(key.to_string()));

            let mut categories = Categories::new();
            for subschema in &subschemas {
                categories.extend(direct_categories(root, subschema));
            }
            merge_annotation(out, path.clone(), categories);

            for subschema in &subschemas {
                walk(root, subschema, value, path, out, depth + 1, max_depth);
            }
            path.pop();
        }
    }

    if let Some(array) = instance.as_array() {
        let item_schemas: Vec<&Value> = fragments
            .iter()
            .filter_map(|fragment| fragment.get("items"))
            .collect();

        if !item_schemas.is_empty() {
            for (index, value) in array.iter().enumerate() {
                path.push(PathSegment::Index(index));

                let mut categories = Categories::new();
                let mut per_index_schemas = Vec::new();
                for items in &item_schemas {
                    if let Some(item_schema) = item_schema_for_index(items, index) {
                        categories.extend(direct_categories(root, item_schema));
                        per_index_schemas.push(item_schema);
                    }
                }
                merge_annotation(out, path.clone(), categories);

                for item_schema in per_index_schemas {
                    walk(root, item_schema, value, path, out, depth + 1, max_depth);
                }
                path.pop();
            }
        }
    }
}
