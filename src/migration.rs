//! DDL for the relational backend derived from a resource schema.
//! Used when a model does not ship its own `CREATE TABLE` statement.

use crate::schema::{is_timestamp, properties};
use crate::sql::{qualified_table, quoted};
use crate::store::CollectionSpec;
use serde_json::Value;
use std::collections::HashSet;

/// PostgreSQL column type for a property schema.
fn column_type(name: &str, prop: &Value) -> &'static str {
    if is_timestamp(name, prop) {
        return "TIMESTAMPTZ";
    }
    let ty = match prop.get("type") {
        Some(Value::String(t)) => t.as_str(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .unwrap_or("string"),
        _ => "string",
    };
    match (ty, prop.get("format").and_then(Value::as_str)) {
        ("string", Some("date")) => "DATE",
        ("string", _) => "TEXT",
        ("integer", _) => "BIGINT",
        ("number", _) => "DOUBLE PRECISION",
        ("boolean", _) => "BOOLEAN",
        _ => "JSONB",
    }
}

/// `CREATE TABLE IF NOT EXISTS` with a BIGSERIAL id, one column per property,
/// NOT NULL for required fields, UNIQUE per group and `x-meta.references` foreign keys.
pub fn create_table_sql(spec: &CollectionSpec) -> String {
    let required: HashSet<&str> = spec
        .schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut defs = vec![format!("{} BIGSERIAL PRIMARY KEY", quoted("id"))];
    if let Some(props) = properties(&spec.schema) {
        for (name, prop) in props.iter().filter(|(name, _)| name.as_str() != "id") {
            let mut def = format!("{} {}", quoted(name), column_type(name, prop));
            if required.contains(name.as_str()) {
                def.push_str(" NOT NULL");
            }
            if let Some(target) = prop.pointer("/x-meta/references").and_then(Value::as_str) {
                def.push_str(&format!(" REFERENCES {} ({})", qualified_table(target), quoted("id")));
            }
            defs.push(def);
        }
    }
    for group in &spec.unique {
        let cols: Vec<String> = group.iter().map(|c| quoted(c)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        qualified_table(&spec.table),
        defs.join(",\n    ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_columns_from_schema() {
        let spec = CollectionSpec {
            table: "fetches".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "url_id": {"type": "integer", "x-meta": {"references": "urls"}},
                    "ok": {"type": "boolean"},
                    "updated_at": {"type": "string"},
                    "created_at": {"type": "string", "format": "date-time"},
                    "payload": {"type": "object"}
                },
                "required": ["url_id"]
            }),
            ddl: None,
            unique: vec![vec!["url_id".into(), "created_at".into()]],
        };
        let ddl = create_table_sql(&spec);
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"fetches\" (\n    \
             \"id\" BIGSERIAL PRIMARY KEY,\n    \
             \"created_at\" TIMESTAMPTZ,\n    \
             \"ok\" BOOLEAN,\n    \
             \"payload\" JSONB,\n    \
             \"updated_at\" TIMESTAMPTZ,\n    \
             \"url_id\" BIGINT NOT NULL REFERENCES \"urls\" (\"id\"),\n    \
             UNIQUE (\"url_id\", \"created_at\")\n)"
        );
    }
}
