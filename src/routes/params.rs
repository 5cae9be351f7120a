//! Request parameter validation: one object schema per location, checked after
//! coercing raw string values to their declared primitive types.

use crate::config::{ParamLocation, ParameterSpec};
use crate::error::AppError;
use crate::response::{ApiRequest, ApiResponse};
use crate::schema::validate;
use crate::service::Handler;
use async_trait::async_trait;
use serde_json::{json, Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

const LOCATIONS: [ParamLocation; 3] = [ParamLocation::Path, ParamLocation::Query, ParamLocation::Header];

/// Object schema grouping the parameters of one location, or None when there are none.
/// Header names are lower-cased; header groups allow undeclared headers.
pub fn parameters_schema(parameters: &[ParameterSpec], location: ParamLocation) -> Option<Value> {
    let key = |name: &str| match location {
        ParamLocation::Header => name.to_ascii_lowercase(),
        _ => name.to_string(),
    };
    let group: Vec<&ParameterSpec> = parameters.iter().filter(|p| p.location == location).collect();
    if group.is_empty() {
        return None;
    }
    let properties: Map<String, Value> = group.iter().map(|p| (key(&p.name), p.schema.clone())).collect();
    let required: Vec<String> = group.iter().filter(|p| p.required).map(|p| key(&p.name)).collect();
    Some(json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": location == ParamLocation::Header
    }))
}

fn declared_type(prop: Option<&Value>) -> Option<&str> {
    match prop?.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types.iter().filter_map(Value::as_str).find(|t| *t != "null"),
        _ => None,
    }
}

/// Convert a raw value to the property's primitive type. Values that do not convert
/// stay strings so that validation reports them.
pub fn coerce_value(raw: &str, prop: Option<&Value>) -> Value {
    match declared_type(prop) {
        Some("integer") => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("number") => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Some("boolean") => Value::Bool(!matches!(raw, "0" | "false" | "FALSE" | "f")),
        _ => Value::String(raw.to_string()),
    }
}

pub fn coerce_values(values: &HashMap<String, String>, schema: &Value) -> Map<String, Value> {
    let props = schema.get("properties");
    values
        .iter()
        .map(|(name, raw)| (name.clone(), coerce_value(raw, props.and_then(|p| p.get(name)))))
        .collect()
}

fn values_at(req: &ApiRequest, location: ParamLocation) -> &HashMap<String, String> {
    match location {
        ParamLocation::Path => &req.path_params,
        ParamLocation::Query => &req.query,
        ParamLocation::Header => &req.headers,
    }
}

/// Wraps a handler with parameter validation. Group schemas are computed once.
pub struct ValidatedHandler {
    groups: Vec<(ParamLocation, Value)>,
    inner: Arc<dyn Handler>,
}

impl ValidatedHandler {
    pub fn new(parameters: &[ParameterSpec], inner: Arc<dyn Handler>) -> Self {
        let groups = LOCATIONS
            .into_iter()
            .filter_map(|loc| parameters_schema(parameters, loc).map(|schema| (loc, schema)))
            .collect();
        ValidatedHandler { groups, inner }
    }

    pub fn check(&self, req: &ApiRequest) -> Result<(), AppError> {
        for (location, schema) in &self.groups {
            let values = Value::Object(coerce_values(values_at(req, *location), schema));
            validate(&values, schema).map_err(|e| {
                AppError::Validation(format!("invalid {} parameters: {}", location.as_str(), e))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for ValidatedHandler {
    async fn call(&self, req: ApiRequest) -> ApiResponse {
        if let Err(e) = self.check(&req) {
            return e.into_api_response();
        }
        self.inner.call(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    struct Ok200;

    #[async_trait]
    impl Handler for Ok200 {
        async fn call(&self, _req: ApiRequest) -> ApiResponse {
            ApiResponse::ok(json!({}))
        }
    }

    fn article_params() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::header("Authorization", json!({"type": "string", "minLength": 4})).required(),
            ParameterSpec::query("q", json!({"type": "string", "minLength": 2})),
            ParameterSpec::query("limit", json!({"type": "integer", "minimum": 0})),
        ]
    }

    #[test]
    fn groups_by_location() {
        let params = article_params();
        let headers = parameters_schema(&params, ParamLocation::Header).unwrap();
        assert_eq!(headers["required"], json!(["authorization"]));
        assert_eq!(headers["additionalProperties"], json!(true));
        let query = parameters_schema(&params, ParamLocation::Query).unwrap();
        assert_eq!(query["additionalProperties"], json!(false));
        assert!(parameters_schema(&params, ParamLocation::Path).is_none());
    }

    #[test]
    fn coerces_declared_types() {
        let int = json!({"type": "integer"});
        assert_eq!(coerce_value("42", Some(&int)), json!(42));
        assert_eq!(coerce_value("4x", Some(&int)), json!("4x"));
        let boolean = json!({"type": "boolean"});
        for falsy in ["0", "false", "FALSE", "f"] {
            assert_eq!(coerce_value(falsy, Some(&boolean)), json!(false));
        }
        assert_eq!(coerce_value("yes", Some(&boolean)), json!(true));
        assert_eq!(coerce_value("7", None), json!("7"));
    }

    #[tokio::test]
    async fn rejects_invalid_parameters() {
        let h = ValidatedHandler::new(&article_params(), Arc::new(Ok200));
        let base = || ApiRequest::new().with_header("Authorization", "secret");

        assert_eq!(h.call(base()).await.status, StatusCode::OK);
        assert_eq!(h.call(base().with_query("q", "corona")).await.status, StatusCode::OK);
        assert_eq!(h.call(base().with_query("limit", "10")).await.status, StatusCode::OK);

        let short_auth = ApiRequest::new().with_header("Authorization", "s");
        assert_eq!(h.call(short_auth).await.status, StatusCode::BAD_REQUEST);
        assert_eq!(h.call(ApiRequest::new()).await.status, StatusCode::BAD_REQUEST);
        assert_eq!(h.call(base().with_query("q", "s")).await.status, StatusCode::BAD_REQUEST);
        assert_eq!(h.call(base().with_query("limit", "ten")).await.status, StatusCode::BAD_REQUEST);
        assert_eq!(h.call(base().with_query("unknown", "1")).await.status, StatusCode::BAD_REQUEST);
    }
}
