//! Shared fixtures: a registry shaped like the server's, served on an OS-assigned port.

use crudgen_sdk::{
    generate_swagger, router, AppState, MemoryStore, ModelDefinition, ModelRegistry, OperationKind,
    ParameterSpec, ResponseHeaders, ResponseTime,
};
use serde_json::json;
use std::sync::Arc;

fn urls() -> ModelDefinition {
    ModelDefinition::new(
        "urls",
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "pattern": "^https?://"},
                "created_at": {"type": "string", "x-meta": {"writable": false}},
                "updated_at": {"type": "string", "x-meta": {"writable": false}}
            },
            "required": ["url"],
            "additionalProperties": false
        }),
    )
    .unique(&["url"])
    .check(|req| {
        let url = req.body.as_ref()?.get("url")?.as_str()?;
        url.contains("example.com").then(|| "url host is reserved".to_string())
    })
}

fn articles() -> ModelDefinition {
    ModelDefinition::new(
        "articles",
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "updated_at": {"type": "string", "x-meta": {"writable": false}}
            },
            "required": ["title"],
            "additionalProperties": false
        }),
    )
    .parameter(
        OperationKind::List,
        ParameterSpec::header("Authorization", json!({"type": "string", "minLength": 4})),
    )
    .parameter(
        OperationKind::List,
        ParameterSpec::query("q", json!({"type": "string", "minLength": 2})),
    )
}

fn decorated(name: &str) -> ModelDefinition {
    ModelDefinition::new(
        name,
        json!({"type": "object", "properties": {"label": {"type": "string"}}}),
    )
    .route_names(&[OperationKind::List])
    .decorate(OperationKind::List, Arc::new(ResponseTime))
    .decorate(
        OperationKind::List,
        Arc::new(ResponseHeaders::new([("Cache-Control", "max-age=120")])),
    )
}

pub async fn registry() -> ModelRegistry {
    let registry = ModelRegistry::builder()
        .priority(&["urls"])
        .models([urls(), articles(), decorated("decorators_example"), decorated("composed_decorators_example")])
        .build(Arc::new(MemoryStore::new()))
        .unwrap();
    registry.create_schema().await;
    registry
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
pub async fn spawn_test_server() -> String {
    let registry = registry().await;
    let swagger = generate_swagger(&registry.routes(), "crudgen", "test");
    let app = router(AppState::new(registry, swagger), 64 * 1024);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

pub fn unique_url(host: &str) -> String {
    format!("https://{}?uuid={}", host, uuid::Uuid::new_v4().simple())
}
