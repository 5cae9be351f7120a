//! Resource schemas: validation, writability and small structural helpers.

mod validator;
mod writable;

pub use validator::{validate, ValidationError};
pub use writable::{is_writable, writable_doc, WritableFields};

use serde_json::{Map, Value};

pub fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

/// Fields the model API stamps with RFC 3339 text when the schema declares them.
pub const TIMESTAMP_FIELDS: [&str; 2] = ["created_at", "updated_at"];

/// A `date-time` string property, or one of the stamped timestamp fields.
pub fn is_timestamp(name: &str, property: &Value) -> bool {
    property.get("format").and_then(Value::as_str) == Some("date-time") || TIMESTAMP_FIELDS.contains(&name)
}

/// True when the schema declares `field` among its properties.
pub fn declares(schema: &Value, field: &str) -> bool {
    properties(schema).map(|p| p.contains_key(field)).unwrap_or(false)
}

/// Copy of the schema with top-level `required` removed. Used for merge-patch bodies.
pub fn without_required(schema: &Value) -> Value {
    let mut relaxed = schema.clone();
    if let Value::Object(obj) = &mut relaxed {
        obj.remove("required");
    }
    relaxed
}

/// Copy of the schema with `properties.id` set to `id_schema` unless already declared.
pub fn with_id_property(schema: &Value, id_schema: &Value) -> Value {
    let mut out = schema.clone();
    if let Some(Value::Object(props)) = out.get_mut("properties") {
        props.entry("id").or_insert_with(|| id_schema.clone());
    }
    out
}
