//! Client-writable field table derived from schema `x-meta` metadata.

use crate::store::Document;
use serde_json::Value;
use std::collections::HashSet;

/// Whether a property schema allows clients to set the field. Defaults to true.
pub fn is_writable(property: &Value) -> bool {
    property
        .pointer("/x-meta/writable")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// Names of the properties a client may set. Computed once per model.
#[derive(Clone, Debug, Default)]
pub struct WritableFields {
    fields: HashSet<String>,
}

impl WritableFields {
    pub fn from_schema(schema: &Value) -> Self {
        let fields = super::properties(schema)
            .map(|props| {
                props
                    .iter()
                    .filter(|(_, p)| is_writable(p))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();
        WritableFields { fields }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Keep only writable schema fields. Non-object input yields an empty document.
    pub fn filter(&self, input: &Value) -> Document {
        match input {
            Value::Object(map) => map
                .iter()
                .filter(|(k, _)| self.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Document::new(),
        }
    }
}

/// One-shot form of [`WritableFields::filter`].
pub fn writable_doc(schema: &Value, input: &Value) -> Document {
    WritableFields::from_schema(schema).filter(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_read_only_and_unknown_fields() {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "x-meta": {"writable": false}},
                "created_at": {"type": "string", "x-meta": {"writable": false}},
                "url": {"type": "string"},
                "note": {"type": "string", "x-meta": {"writable": true}}
            }
        });
        let doc = writable_doc(
            &schema,
            &json!({"id": "abc", "created_at": "2020-01-01", "url": "https://a.example", "note": "n", "foo": 1}),
        );
        assert_eq!(Value::Object(doc), json!({"url": "https://a.example", "note": "n"}));
    }

    #[test]
    fn non_object_input_is_empty() {
        let schema = json!({"properties": {"url": {"type": "string"}}});
        assert!(writable_doc(&schema, &json!([1, 2])).is_empty());
        assert!(writable_doc(&schema, &Value::Null).is_empty());
    }
}
