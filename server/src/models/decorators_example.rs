use crudgen_sdk::{ModelDefinition, OperationKind, ResponseHeaders, ResponseTime};
use serde_json::json;
use std::sync::Arc;

/// List-only resource whose responses carry caching and timing headers.
pub fn definition() -> ModelDefinition {
    ModelDefinition::new(
        "decorators_example",
        json!({
            "type": "object",
            "properties": {
                "label": {"type": "string"},
                "updated_at": {"type": "string", "format": "date-time", "x-meta": {"writable": false}}
            },
            "additionalProperties": false
        }),
    )
    .route_names(&[OperationKind::List])
    .decorate(OperationKind::List, Arc::new(ResponseTime))
    .decorate(
        OperationKind::List,
        Arc::new(ResponseHeaders::new([("Cache-Control", "max-age=120")])),
    )
}
