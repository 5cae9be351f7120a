use crudgen_sdk::{ModelDefinition, OperationKind, ParameterSpec};
use serde_json::json;

pub fn definition() -> ModelDefinition {
    ModelDefinition::new(
        "articles",
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "body": {"type": "string"},
                "published": {"type": "boolean"},
                "created_at": {"type": "string", "format": "date-time", "x-meta": {"writable": false}},
                "updated_at": {"type": "string", "format": "date-time", "x-meta": {"writable": false}}
            },
            "required": ["title"],
            "additionalProperties": false
        }),
    )
    .parameter(
        OperationKind::List,
        ParameterSpec::header("Authorization", json!({"type": "string", "minLength": 4})).describe("API token"),
    )
    .parameter(
        OperationKind::List,
        ParameterSpec::query("q", json!({"type": "string", "minLength": 2})).describe("Search text"),
    )
}
