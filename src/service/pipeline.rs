//! Handler composition: an ordered list of middleware in front of one endpoint.
//! The first middleware is the outermost; any of them may answer without calling `next`.

use crate::response::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: ApiRequest) -> ApiResponse;
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: ApiRequest, next: Next<'_>) -> ApiResponse;
}

/// Remainder of a pipeline, handed to each middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub async fn run(self, req: ApiRequest) -> ApiResponse {
        match self.layers.split_first() {
            Some((layer, rest)) => {
                layer
                    .handle(
                        req,
                        Next {
                            layers: rest,
                            endpoint: self.endpoint,
                        },
                    )
                    .await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn new(layers: Vec<Arc<dyn Middleware>>, endpoint: Arc<dyn Handler>) -> Self {
        Pipeline { layers, endpoint }
    }
}

#[async_trait]
impl Handler for Pipeline {
    async fn call(&self, req: ApiRequest) -> ApiResponse {
        Next {
            layers: &self.layers,
            endpoint: self.endpoint.as_ref(),
        }
        .run(req)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, req: ApiRequest) -> ApiResponse {
            ApiResponse::ok(req.body.unwrap_or(Value::Null))
        }
    }

    /// Appends its tag to `trail` on the way in and out.
    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, mut req: ApiRequest, next: Next<'_>) -> ApiResponse {
            if let Some(Value::Array(trail)) = req.body.as_mut() {
                trail.push(json!(self.0));
            }
            let mut resp = next.run(req).await;
            if let Value::Array(trail) = &mut resp.body {
                trail.push(json!(format!("/{}", self.0)));
            }
            resp
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn handle(&self, _req: ApiRequest, _next: Next<'_>) -> ApiResponse {
            ApiResponse::with_status(StatusCode::FORBIDDEN, Value::Null)
        }
    }

    #[tokio::test]
    async fn runs_layers_outermost_first() {
        let p = Pipeline::new(vec![Arc::new(Tag("a")), Arc::new(Tag("b"))], Arc::new(Echo));
        let resp = p.call(ApiRequest::new().with_body(json!([]))).await;
        assert_eq!(resp.body, json!(["a", "b", "/b", "/a"]));
    }

    #[tokio::test]
    async fn layer_can_short_circuit() {
        let p = Pipeline::new(vec![Arc::new(Tag("a")), Arc::new(Deny), Arc::new(Tag("c"))], Arc::new(Echo));
        let resp = p.call(ApiRequest::new().with_body(json!([]))).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert_eq!(resp.body, Value::Null);
    }

    #[tokio::test]
    async fn empty_pipeline_calls_endpoint() {
        let p = Pipeline::new(Vec::new(), Arc::new(Echo));
        assert_eq!(p.call(ApiRequest::new().with_body(json!(1))).await.body, json!(1));
    }
}
