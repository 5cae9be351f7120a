//! Shared application state for the HTTP adapter.

use crate::registry::ModelRegistry;
use crate::store::Storage;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    /// OpenAPI document, generated once from the registry's routes.
    pub swagger: Arc<Value>,
}

impl AppState {
    pub fn new(registry: ModelRegistry, swagger: Value) -> Self {
        AppState {
            registry: Arc::new(registry),
            swagger: Arc::new(swagger),
        }
    }

    pub fn store(&self) -> &Arc<dyn Storage> {
        self.registry.store()
    }
}
