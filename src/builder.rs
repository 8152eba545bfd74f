//! A non-magical builder for schema documents (§4.G), replacing the
//! metaclass-based auto-generation some sibling projects use to turn a
//! typed record into a JSON Schema.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::schema::Schema;

/// Builds a schema document one property at a time.
///
/// `.build()` runs the exact same shape checks [`crate::registry::SchemaRegistry::register`]
/// applies to a hand-authored document, so a builder-produced schema and
/// one loaded from YAML are indistinguishable once built.
pub struct SchemaBuilder {
    id: String,
    version: i64,
    properties: Map<String, Value>,
}

impl SchemaBuilder {
    pub fn new(id: impl Into<String>, version: i64) -> Self {
        Self {
            id: id.into(),
            version,
            properties: Map::new(),
        }
    }

    /// Add a direct property.
    ///
    /// `type_fragment` is an arbitrary JSON-Schema type fragment (e.g.
    /// `{"type": "string"}`, a nested object schema with its own
    /// `properties`, or an array schema with `items`); `categories` is
    /// spliced in as that fragment's `categories` list, overwriting one if
    /// `type_fragment` already carries it.
    pub fn property(
        mut self,
        name: impl Into<String>,
        categories: impl IntoIterator<Item = impl Into<String>>,
        type_fragment: Value,
    ) -> Self {
        let mut fragment = type_fragment;
        let categories: Vec<Value> = categories.into_iter().map(|c| Value::String(c.into())).collect();
        match fragment.as_object_mut() {
            Some(object) => {
                object.insert("categories".to_string(), Value::Array(categories));
            }
            None => {
                fragment = serde_json::json!({"categories": categories});
            }
        }
        self.properties.insert(name.into(), fragment);
        self
    }

    /// Assemble and shape-validate the document.
    pub fn build(self) -> Result<Schema> {
        Schema::from_value(Value::Object(
            [
                ("$id".to_string(), Value::String(self.id)),
                ("version".to_string(), Value::Number(self.version.into())),
                ("properties".to_string(), Value::Object(self.properties)),
            ]
            .into_iter()
            .collect(),
        ))
    }
}

/// Derive a property's JSON-Schema type fragment from a Rust type, for use
/// with [`SchemaBuilder::property`].
///
/// Category sensitivity is a policy concern, not something the Rust type
/// system encodes, so categories are always supplied separately — this
/// only saves hand-writing the `type`/`properties`/`items` shape of `T`.
pub fn type_fragment<T: schemars::JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or(Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_a_well_formed_schema() {
        let schema = SchemaBuilder::new("test.event", 1)
            .property("name", ["unrestricted"], json!({"type": "string"}))
            .property("email", ["pii"], json!({"type": "string"}))
            .build()
            .unwrap();

        assert_eq!(schema.id(), "test.event");
        assert_eq!(schema.version(), 1);
        assert_eq!(
            schema.properties()["name"]["categories"],
            json!(["unrestricted"])
        );
    }

    #[test]
    fn rejects_dunder_property_same_as_hand_authored_schema() {
        let result = SchemaBuilder::new("test.event", 1)
            .property("__reserved__", ["unrestricted"], json!({"type": "string"}))
            .build();
        assert!(result.is_err());
    }

    #[derive(schemars::JsonSchema)]
    struct UserRecord {
        #[allow(dead_code)]
        id: String,
        #[allow(dead_code)]
        age: u32,
    }

    #[test]
    fn type_fragment_derives_struct_shape() {
        let fragment = type_fragment::<UserRecord>();
        let properties = fragment["properties"].as_object().unwrap();
        assert!(properties.contains_key("id"));
        assert!(properties.contains_key("age"));
    }
}
