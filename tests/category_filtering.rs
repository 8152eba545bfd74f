//! End-to-end redaction behavior: a single schema, varied allow-list
//! configurations, checked against the exact properties that should
//! survive in the emitted capsule.

use std::sync::Arc;

use serde_json::json;
use telecapsule::emitter::EventEmitter;
use telecapsule::policy::AllowedSchemas;
use telecapsule::schema::DuplicatePolicy;
use telecapsule::sink::CollectorSink;

const SCHEMA_ID: &str = "test.event";

fn schema_doc() -> serde_json::Value {
    json!({
        "$id": SCHEMA_ID,
        "title": "Test Event",
        "version": 1,
        "type": "object",
        "properties": {
            "nothing-exciting": {
                "categories": ["unrestricted"],
                "type": "string"
            },
            "id": {
                "categories": ["user-identifier"],
                "type": "string"
            },
            "email": {
                "categories": ["user-identifiable-information"],
                "type": "string"
            }
        }
    })
}

fn emit_with_policy(allowed_schemas: serde_json::Value) -> serde_json::Value {
    let sink = Arc::new(CollectorSink::new("test"));
    let emitter = EventEmitter::builder()
        .sink(sink.clone())
        .allowed_schemas(AllowedSchemas::from_value(&allowed_schemas).unwrap())
        .build()
        .unwrap();
    emitter.register_schema(schema_doc(), DuplicatePolicy::Raise).unwrap();

    emitter
        .record_event(
            SCHEMA_ID,
            1,
            &json!({
                "nothing-exciting": "hello, world",
                "id": "test id",
                "email": "test@testemail.com"
            }),
        )
        .unwrap();

    let received = sink.received();
    assert_eq!(received.len(), 1);
    received.into_iter().next().unwrap()
}

#[test]
fn empty_allowed_categories_keeps_only_unrestricted() {
    let event = emit_with_policy(json!({SCHEMA_ID: {"allowed_categories": []}}));
    assert_eq!(event["nothing-exciting"], json!("hello, world"));
    assert_eq!(event["id"], json!(null));
    assert_eq!(event["email"], json!(null));
}

#[test]
fn explicit_unrestricted_in_allow_list_changes_nothing() {
    let event = emit_with_policy(json!({SCHEMA_ID: {"allowed_categories": ["unrestricted"]}}));
    assert_eq!(event["nothing-exciting"], json!("hello, world"));
    assert_eq!(event["id"], json!(null));
    assert_eq!(event["email"], json!(null));
}

#[test]
fn allowing_one_category_reveals_only_that_property() {
    let event = emit_with_policy(json!({SCHEMA_ID: {"allowed_categories": ["user-identifier"]}}));
    assert_eq!(event["id"], json!("test id"));
    assert_eq!(event["email"], json!(null));
}

#[test]
fn allowing_both_categories_reveals_both_properties() {
    let event = emit_with_policy(json!({
        SCHEMA_ID: {
            "allowed_categories": ["user-identifier", "user-identifiable-information"]
        }
    }));
    assert_eq!(event["id"], json!("test id"));
    assert_eq!(event["email"], json!("test@testemail.com"));
}

#[test]
fn property_whitelist_reveals_a_specific_property_without_its_category() {
    let event = emit_with_policy(json!({SCHEMA_ID: {"allowed_properties": ["id"]}}));
    assert_eq!(event["id"], json!("test id"));
    assert_eq!(event["email"], json!(null));
}

#[test]
fn property_whitelist_and_category_allow_combine() {
    let event = emit_with_policy(json!({
        SCHEMA_ID: {
            "allowed_properties": ["id"],
            "allowed_categories": ["user-identifiable-information"]
        }
    }));
    assert_eq!(event["id"], json!("test id"));
    assert_eq!(event["email"], json!("test@testemail.com"));
}

#[test]
fn nested_object_and_array_properties_are_filtered_independently() {
    let sink = Arc::new(CollectorSink::new("test"));
    let emitter = EventEmitter::builder()
        .sink(sink.clone())
        .allowed_schemas(AllowedSchemas::from_value(&json!({"nested.event": {"allowed_categories": ["user-id"]}})).unwrap())
        .build()
        .unwrap();
    emitter
        .register_schema(
            json!({
                "$id": "nested.event",
                "version": 1,
                "properties": {
                    "users": {
                        "type": "array",
                        "categories": ["user-id"],
                        "items": {
                            "properties": {
                                "id": {"type": "string"},
                                "email": {"type": "string", "categories": ["pii"]}
                            }
                        }
                    }
                }
            }),
            DuplicatePolicy::Raise,
        )
        .unwrap();

    emitter
        .record_event(
            "nested.event",
            1,
            &json!({"users": [{"id": "0", "email": "e0"}, {"id": "1", "email": "e1"}]}),
        )
        .unwrap();

    let received = sink.received();
    let event = &received[0];
    assert_eq!(event["users"][0]["id"], json!("0"));
    assert_eq!(event["users"][0]["email"], json!(null));
    assert_eq!(event["users"][1]["id"], json!("1"));
    assert_eq!(event["users"][1]["email"], json!(null));
}
