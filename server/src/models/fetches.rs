use crudgen_sdk::ModelDefinition;
use serde_json::json;

const DDL: &str = r#"CREATE TABLE IF NOT EXISTS "fetches" (
    "id" BIGSERIAL PRIMARY KEY,
    "url_id" BIGINT NOT NULL REFERENCES "urls" ("id") ON DELETE CASCADE,
    "status_code" BIGINT,
    "content_type" TEXT,
    "elapsed_ms" DOUBLE PRECISION,
    "created_at" TIMESTAMPTZ,
    "updated_at" TIMESTAMPTZ
)"#;

/// One retrieval of a stored url. `url_id` is a string or an integer depending on the backend.
pub fn definition() -> ModelDefinition {
    ModelDefinition::new(
        "fetches",
        json!({
            "type": "object",
            "properties": {
                "url_id": {"type": ["string", "integer"], "x-meta": {"references": "urls"}},
                "status_code": {"type": "integer", "minimum": 100, "maximum": 599},
                "content_type": {"type": "string"},
                "elapsed_ms": {"type": "number", "minimum": 0},
                "created_at": {"type": "string", "format": "date-time", "x-meta": {"writable": false}},
                "updated_at": {"type": "string", "format": "date-time", "x-meta": {"writable": false}}
            },
            "required": ["url_id"],
            "additionalProperties": false
        }),
    )
    .db_schema(DDL)
}
