//! HTTP adapter: mounts generated routes and common routes on one axum router.

pub mod model;

pub use model::{axum_path, model_router, parse_body};

use crate::error::AppError;
use crate::routes::common_routes;
use crate::state::AppState;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

async fn not_found() -> Response {
    AppError::NotFound.into_response()
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    AppError::Internal("handler panicked".into()).into_response()
}

/// Full application router: model routes, common routes, JSON 404 fallback,
/// request tracing, panic recovery and a request body limit.
pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    let routes = state.registry.routes();
    Router::new()
        .merge(model_router(&routes))
        .merge(common_routes(state))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(RequestBodyLimitLayer::new(body_limit_bytes)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelDefinition;
    use crate::registry::ModelRegistry;
    use crate::store::MemoryStore;
    use crate::swagger::generate_swagger;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let registry = ModelRegistry::builder()
            .model(ModelDefinition::new(
                "notes",
                json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"],
                    "additionalProperties": false
                }),
            ))
            .build(Arc::new(MemoryStore::new()))
            .unwrap();
        let swagger = generate_swagger(&registry.routes(), "test", "0.1.0");
        router(AppState::new(registry, swagger), 1024)
    }

    async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn create_then_get() {
        let app = app();
        let (status, created) = send(app.clone(), "POST", "/v1/notes", r#"{"text": "hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let id = created["id"].as_str().unwrap();
        let (status, got) = send(app, "GET", &format!("/v1/notes/{}", id), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got, created);
    }

    #[tokio::test]
    async fn transport_errors() {
        let (status, body) = send(app(), "GET", "/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");

        let (status, _) = send(app(), "PATCH", "/v1/notes", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = send(app(), "POST", "/v1/notes", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");

        let (status, _) = send(app(), "POST", "/v1/notes", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let big = format!(r#"{{"text": "{}"}}"#, "x".repeat(4096));
        let (status, _) = send(app(), "POST", "/v1/notes", &big).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn serves_swagger_and_health() {
        let (status, doc) = send(app(), "GET", "/v1/swagger.json", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["openapi"], "3.0.3");
        assert!(doc["paths"]["/v1/notes/{id}"]["get"].is_object());
        let (status, body) = send(app(), "GET", "/ready", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
