//! Route assembly: turns a model API into concrete route descriptions.

use super::params::ValidatedHandler;
use crate::config::{ParamLocation, ParameterSpec};
use crate::service::{Handler, ModelApi, OperationKind};
use axum::http::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One generated endpoint. The handler already validates parameters and runs decorators.
#[derive(Clone)]
pub struct Route {
    pub model_name: String,
    pub operation: OperationKind,
    pub path: String,
    pub method: Method,
    pub parameters: Vec<ParameterSpec>,
    pub request_schema: Option<Value>,
    pub response_schema: Value,
    pub handler: Arc<dyn Handler>,
}

impl Route {
    pub fn name(&self) -> &'static str {
        self.operation.name()
    }

    pub fn operation_id(&self) -> String {
        format!("{}_{}", self.model_name, self.operation.name())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("operation_id", &self.operation_id())
            .field("method", &self.method)
            .field("path", &self.path)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

pub fn collection_path(model_name: &str) -> String {
    format!("/v1/{}", model_name)
}

pub fn item_path(model_name: &str) -> String {
    format!("/v1/{}/{{id}}", model_name)
}

/// Built-in parameters of an operation: paging and sort for list, the path id for item routes.
pub fn default_parameters(api: &ModelApi, op: OperationKind) -> Vec<ParameterSpec> {
    match op {
        OperationKind::List => vec![
            ParameterSpec::query("limit", json!({"type": "integer", "minimum": 0, "maximum": api.max_limit()}))
                .describe("Page size"),
            ParameterSpec::query("offset", json!({"type": "integer", "minimum": 0})).describe("Items to skip"),
            ParameterSpec::query("sort", json!({"type": "string"}))
                .describe("Comma-separated fields, '-' prefix for descending"),
        ],
        op if op.is_item() => {
            let id_schema = api
                .schema()
                .pointer("/properties/id")
                .cloned()
                .unwrap_or_else(|| api.store().id_schema());
            vec![ParameterSpec::path("id", id_schema)]
        }
        _ => Vec::new(),
    }
}

/// Merge declared parameters over the defaults; a declared parameter replaces a default
/// with the same location and (case-insensitive for headers) name.
fn merge_parameters(defaults: Vec<ParameterSpec>, declared: &[ParameterSpec]) -> Vec<ParameterSpec> {
    let same = |a: &ParameterSpec, b: &ParameterSpec| {
        a.location == b.location
            && match a.location {
                ParamLocation::Header => a.name.eq_ignore_ascii_case(&b.name),
                _ => a.name == b.name,
            }
    };
    let mut out: Vec<ParameterSpec> = defaults
        .into_iter()
        .filter(|d| !declared.iter().any(|p| same(d, p)))
        .collect();
    out.extend(declared.iter().cloned());
    out
}

/// Routes for the requested operations of one model, in `route_names` order.
pub fn get_model_routes(
    model_name: &str,
    api: &Arc<ModelApi>,
    route_names: &[OperationKind],
    declared: &HashMap<OperationKind, Vec<ParameterSpec>>,
) -> Vec<Route> {
    route_names
        .iter()
        .map(|&op| {
            let parameters = merge_parameters(
                default_parameters(api, op),
                declared.get(&op).map(Vec::as_slice).unwrap_or(&[]),
            );
            let handler: Arc<dyn Handler> = Arc::new(ValidatedHandler::new(&parameters, api.handler(op)));
            Route {
                model_name: model_name.to_string(),
                operation: op,
                path: if op.is_item() {
                    item_path(model_name)
                } else {
                    collection_path(model_name)
                },
                method: op.method(),
                parameters,
                request_schema: api.request_schema(op),
                response_schema: api.response_schema(op),
                handler,
            }
        })
        .collect()
}
