//! axum handlers for generated routes: normalize the request, run the route handler.

use crate::error::AppError;
use crate::response::ApiRequest;
use crate::routes::Route;
use crate::service::Handler;
use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// `{id}` template segments become axum `:id` captures.
pub fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => format!(":{}", name),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Blank bodies are absent; anything else must be JSON.
pub fn parse_body(bytes: &[u8]) -> Result<Option<Value>, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_ascii_lowercase(), value.to_str().ok()?.to_string())))
        .collect()
}

fn method_filter(route: &Route) -> Option<MethodFilter> {
    MethodFilter::try_from(route.method.clone()).ok()
}

async fn dispatch(
    handler: Arc<dyn Handler>,
    path: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };
    let req = ApiRequest {
        path_params: path,
        query,
        headers: header_map(&headers),
        body,
    };
    handler.call(req).await.into_response()
}

fn method_router(route: &Route, filter: MethodFilter) -> MethodRouter {
    let handler = route.handler.clone();
    on(
        filter,
        move |path: Option<Path<HashMap<String, String>>>,
              Query(query): Query<HashMap<String, String>>,
              headers: HeaderMap,
              body: Bytes| {
            let handler = handler.clone();
            async move {
                let path = path.map(|Path(p)| p).unwrap_or_default();
                dispatch(handler, path, query, headers, body).await
            }
        },
    )
}

/// One axum route per distinct path with every method registered on it.
/// Unregistered methods on a known path get 405 from axum.
pub fn model_router(routes: &[Route]) -> Router {
    let mut by_path: Vec<(String, MethodRouter)> = Vec::new();
    for route in routes {
        let Some(filter) = method_filter(route) else {
            tracing::warn!(path = %route.path, method = %route.method, "unsupported method, route skipped");
            continue;
        };
        let path = axum_path(&route.path);
        let added = method_router(route, filter);
        match by_path.iter().position(|(p, _)| *p == path) {
            Some(i) => {
                let (path, existing) = by_path.swap_remove(i);
                by_path.push((path, existing.merge(added)));
            }
            None => by_path.push((path, added)),
        }
    }
    by_path
        .into_iter()
        .fold(Router::new(), |router, (path, methods)| router.route(&path, methods))
}
