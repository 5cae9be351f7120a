//! Request-checking middleware: schema validation of bodies and custom checks.

use super::pipeline::{Middleware, Next};
use crate::error::AppError;
use crate::response::{ApiRequest, ApiResponse};
use crate::schema::validate;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Custom request check. `Some(reason)` rejects the request with 400.
pub type BodyCheck = Arc<dyn Fn(&ApiRequest) -> Option<String> + Send + Sync>;

/// Rejects requests whose body does not conform to `schema`. A missing body is rejected.
pub struct ValidateBody {
    schema: Value,
}

impl ValidateBody {
    pub fn new(schema: Value) -> Self {
        ValidateBody { schema }
    }
}

#[async_trait]
impl Middleware for ValidateBody {
    async fn handle(&self, req: ApiRequest, next: Next<'_>) -> ApiResponse {
        let Some(body) = req.body.as_ref() else {
            return AppError::Validation("request body is required".into()).into_api_response();
        };
        if let Err(e) = validate(body, &self.schema) {
            tracing::debug!(error = %e, "request body rejected");
            return AppError::Validation(e.to_string()).into_api_response();
        }
        next.run(req).await
    }
}

pub struct ValidateWith {
    check: BodyCheck,
}

impl ValidateWith {
    pub fn new(check: BodyCheck) -> Self {
        ValidateWith { check }
    }
}

#[async_trait]
impl Middleware for ValidateWith {
    async fn handle(&self, req: ApiRequest, next: Next<'_>) -> ApiResponse {
        if let Some(reason) = (self.check)(&req) {
            return AppError::Validation(reason).into_api_response();
        }
        next.run(req).await
    }
}
