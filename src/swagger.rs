//! OpenAPI 3.0 document generated from the route list.

use crate::routes::Route;
use crate::schema::{validate, ValidationError};
use serde_json::{json, Map, Value};

const META_SCHEMA: &str = include_str!("../assets/openapi-meta-schema.json");

/// Structural schema of an OpenAPI 3.0 document, used to check generated output.
pub fn meta_schema() -> Result<Value, serde_json::Error> {
    serde_json::from_str(META_SCHEMA)
}

pub fn validate_document(doc: &Value) -> Result<(), ValidationError> {
    let schema = meta_schema().map_err(|e| ValidationError {
        path: String::new(),
        message: format!("unreadable meta-schema: {}", e),
    })?;
    validate(doc, &schema)
}

/// Rewrites a JSON-Schema property into an OpenAPI 3.0 Schema Object: `null` in a type
/// list becomes `nullable`, other type unions become `oneOf`, empty `required` lists go.
pub fn openapi_schema(schema: &Value) -> Value {
    let Value::Object(obj) = schema else { return schema.clone() };
    let mut out = Map::new();
    for (key, value) in obj {
        let converted = match key.as_str() {
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), openapi_schema(prop)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "items" | "not" => openapi_schema(value),
            "additionalProperties" if value.is_object() => openapi_schema(value),
            "allOf" | "anyOf" | "oneOf" => match value {
                Value::Array(subs) => Value::Array(subs.iter().map(openapi_schema).collect()),
                other => other.clone(),
            },
            "required" if value.as_array().map(Vec::is_empty).unwrap_or(false) => continue,
            "type" => {
                if let Value::Array(types) = value {
                    let named: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                    if named.contains(&"null") {
                        out.insert("nullable".into(), Value::Bool(true));
                    }
                    let concrete: Vec<&str> = named.into_iter().filter(|t| *t != "null").collect();
                    match concrete.as_slice() {
                        [] => {}
                        [single] => {
                            out.insert("type".into(), json!(single));
                        }
                        many => {
                            out.insert(
                                "oneOf".into(),
                                Value::Array(many.iter().map(|t| json!({"type": t})).collect()),
                            );
                        }
                    }
                    continue;
                }
                value.clone()
            }
            _ => value.clone(),
        };
        out.insert(key.clone(), converted);
    }
    Value::Object(out)
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}}
    })
}

fn operation(route: &Route) -> Value {
    let mut op = Map::new();
    op.insert("operationId".into(), json!(route.operation_id()));
    op.insert("tags".into(), json!([route.model_name]));
    op.insert(
        "summary".into(),
        json!(format!("{} {}", route.operation.name(), route.model_name)),
    );
    if !route.parameters.is_empty() {
        let params: Vec<Value> = route
            .parameters
            .iter()
            .map(|p| {
                let mut v = json!({
                    "in": p.location.as_str(),
                    "name": p.name,
                    "required": p.required,
                    "schema": openapi_schema(&p.schema)
                });
                if let (Some(text), Value::Object(obj)) = (&p.description, &mut v) {
                    obj.insert("description".into(), json!(text));
                }
                v
            })
            .collect();
        op.insert("parameters".into(), Value::Array(params));
    }
    if let Some(schema) = &route.request_schema {
        op.insert(
            "requestBody".into(),
            json!({
                "required": true,
                "content": {"application/json": {"schema": openapi_schema(schema)}}
            }),
        );
    }
    let mut responses = Map::new();
    responses.insert(
        "200".into(),
        json!({
            "description": "Successful response",
            "content": {"application/json": {"schema": openapi_schema(&route.response_schema)}}
        }),
    );
    responses.insert("400".into(), error_response("Invalid request"));
    if route.operation.is_item() {
        responses.insert("404".into(), error_response("Not found"));
    }
    op.insert("responses".into(), Value::Object(responses));
    Value::Object(op)
}

/// One path entry per distinct path, one operation per method.
pub fn generate_swagger(routes: &[Route], title: &str, version: &str) -> Value {
    let mut paths = Map::new();
    let mut tags: Vec<&str> = Vec::new();
    for route in routes {
        let item = paths
            .entry(route.path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = item {
            methods.insert(route.method.as_str().to_ascii_lowercase(), operation(route));
        }
        if !tags.contains(&route.model_name.as_str()) {
            tags.push(&route.model_name);
        }
    }
    json!({
        "openapi": "3.0.3",
        "info": {"title": title, "version": version},
        "paths": paths,
        "tags": tags.iter().map(|t| json!({"name": t})).collect::<Vec<_>>(),
        "components": {
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": {
                        "error": {
                            "type": "object",
                            "properties": {
                                "code": {"type": "string"},
                                "message": {"type": "string"}
                            },
                            "required": ["code", "message"]
                        }
                    },
                    "required": ["error"]
                }
            }
        }
    })
}
