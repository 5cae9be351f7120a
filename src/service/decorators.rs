//! Response decorators: fixed headers and handler timing.

use super::pipeline::{Middleware, Next};
use crate::response::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use std::time::Instant;

/// Adds fixed headers to every response, overriding headers of the same name.
pub struct ResponseHeaders {
    headers: Vec<(String, String)>,
}

impl ResponseHeaders {
    pub fn new<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ResponseHeaders {
            headers: headers.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[async_trait]
impl Middleware for ResponseHeaders {
    async fn handle(&self, req: ApiRequest, next: Next<'_>) -> ApiResponse {
        let mut resp = next.run(req).await;
        for (k, v) in &self.headers {
            resp.headers.retain(|name, _| !name.eq_ignore_ascii_case(k));
            resp.headers.insert(k.clone(), v.clone());
        }
        resp
    }
}

pub const RESPONSE_TIME_HEADER: &str = "X-Response-Time";

/// Sets `X-Response-Time` to the time spent in the rest of the pipeline, e.g. `0.412ms`.
pub struct ResponseTime;

#[async_trait]
impl Middleware for ResponseTime {
    async fn handle(&self, req: ApiRequest, next: Next<'_>) -> ApiResponse {
        let started = Instant::now();
        let resp = next.run(req).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        resp.with_header(RESPONSE_TIME_HEADER, format!("{:.3}ms", elapsed_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::pipeline::{Handler, Pipeline};
    use serde_json::json;
    use std::sync::Arc;

    struct Plain;

    #[async_trait]
    impl Handler for Plain {
        async fn call(&self, _req: ApiRequest) -> ApiResponse {
            ApiResponse::ok(json!({"data": []})).with_header("Cache-Control", "no-store")
        }
    }

    #[tokio::test]
    async fn decorates_without_touching_body() {
        let p = Pipeline::new(
            vec![
                Arc::new(ResponseTime),
                Arc::new(ResponseHeaders::new([("Cache-Control", "max-age=120")])),
            ],
            Arc::new(Plain),
        );
        let resp = p.call(ApiRequest::new()).await;
        assert_eq!(resp.body, json!({"data": []}));
        assert_eq!(resp.headers.get("Cache-Control").map(String::as_str), Some("max-age=120"));
        let timing = resp.headers.get(RESPONSE_TIME_HEADER).cloned().unwrap_or_default();
        assert!(timing.ends_with("ms"), "{}", timing);
    }
}
