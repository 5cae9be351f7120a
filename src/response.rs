//! Normalized request/response exchanged between the HTTP adapter and the core.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

/// Transport-agnostic request. Header names are stored lower-cased.
#[derive(Clone, Debug, Default)]
pub struct ApiRequest {
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.insert(name.to_string(), value.into());
        self
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
    pub headers: HashMap<String, String>,
}

impl Default for ApiResponse {
    fn default() -> Self {
        ApiResponse {
            status: StatusCode::OK,
            body: Value::Object(Default::default()),
            headers: HashMap::new(),
        }
    }
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self::with_status(StatusCode::OK, body)
    }

    pub fn with_status(status: StatusCode, body: Value) -> Self {
        ApiResponse {
            status,
            body,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut resp = (self.status, Json(self.body)).into_response();
        for (k, v) in self.headers {
            match (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(&v)) {
                (Ok(name), Ok(value)) => {
                    resp.headers_mut().insert(name, value);
                }
                _ => tracing::warn!(header = %k, "dropping response header with invalid name or value"),
            }
        }
        resp
    }
}

pub fn error_body(code: &str, message: String) -> Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}
