//! Model registry: orders definitions, applies defaults and provisions storage.

use crate::config::{validate_definitions, ModelDefinition};
use crate::error::ConfigError;
use crate::routes::{get_model_routes, Route};
use crate::schema::with_id_property;
use crate::service::{ModelApi, DEFAULT_MAX_LIMIT};
use crate::store::{CollectionSpec, Storage};
use serde_json::Value;
use std::sync::Arc;

/// A definition with defaults applied: id injected into the schema, API compiled, routes built.
pub struct ResolvedModel {
    pub name: String,
    pub table: String,
    pub schema: Value,
    pub db_schema: Option<String>,
    pub unique: Vec<Vec<String>>,
    pub api: Arc<ModelApi>,
    pub routes: Vec<Route>,
}

impl ResolvedModel {
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            table: self.table.clone(),
            schema: self.schema.clone(),
            ddl: self.db_schema.clone(),
            unique: self.unique.clone(),
        }
    }
}

pub struct ModelRegistry {
    models: Vec<ResolvedModel>,
    store: Arc<dyn Storage>,
}

/// Collects definitions and registry options before building.
pub struct RegistryBuilder {
    priority: Vec<String>,
    definitions: Vec<ModelDefinition>,
    max_list_limit: u32,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        RegistryBuilder {
            priority: Vec::new(),
            definitions: Vec::new(),
            max_list_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl RegistryBuilder {
    /// Models listed here come first, in this order. Dependencies (foreign-key
    /// targets) belong here so their tables are created before dependents.
    pub fn priority(mut self, names: &[&str]) -> Self {
        self.priority = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn model(mut self, definition: ModelDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn models(mut self, definitions: impl IntoIterator<Item = ModelDefinition>) -> Self {
        self.definitions.extend(definitions);
        self
    }

    pub fn max_list_limit(mut self, limit: u32) -> Self {
        self.max_list_limit = limit;
        self
    }

    pub fn build(self, store: Arc<dyn Storage>) -> Result<ModelRegistry, ConfigError> {
        validate_definitions(&self.definitions)?;
        let ordered = ordered_definitions(self.definitions, &self.priority);
        let models = ordered
            .into_iter()
            .map(|def| set_model_defaults(def, &store, self.max_list_limit))
            .collect();
        Ok(ModelRegistry { models, store })
    }
}

/// Priority names first in the given order, then the rest alphabetically.
fn ordered_definitions(mut definitions: Vec<ModelDefinition>, priority: &[String]) -> Vec<ModelDefinition> {
    definitions.sort_by(|a, b| {
        let rank = |d: &ModelDefinition| priority.iter().position(|p| *p == d.name).unwrap_or(usize::MAX);
        rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
    });
    definitions
}

fn set_model_defaults(def: ModelDefinition, store: &Arc<dyn Storage>, max_list_limit: u32) -> ResolvedModel {
    let schema = with_id_property(&def.json_schema, &store.id_schema());
    let mut api = ModelApi::new(def.table_name(), schema.clone(), store.clone())
        .with_max_limit(max_list_limit)
        .with_decorators(&def.decorators)
        .with_validation();
    if let Some(check) = def.check.clone() {
        api = api.with_check(check);
    }
    let api = Arc::new(api);
    let routes = get_model_routes(&def.name, &api, &def.route_names, &def.parameters);
    tracing::debug!(model = %def.name, routes = routes.len(), "model registered");
    ResolvedModel {
        table: def.table_name().to_string(),
        name: def.name,
        schema,
        db_schema: def.db_schema,
        unique: def.unique,
        api,
        routes,
    }
}

impl ModelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn models(&self) -> &[ResolvedModel] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&ResolvedModel> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    /// All routes, model by model in registry order.
    pub fn routes(&self) -> Vec<Route> {
        self.models.iter().flat_map(|m| m.routes.iter().cloned()).collect()
    }

    /// Provision every model's table or collection in registry order. A failure for one
    /// model is logged and does not stop the others. Returns the number provisioned.
    pub async fn create_schema(&self) -> usize {
        let mut created = 0;
        for model in &self.models {
            match self.store.ensure_collection(&model.collection_spec()).await {
                Ok(()) => {
                    created += 1;
                    tracing::info!(model = %model.name, table = %model.table, "storage ready");
                }
                Err(e) => tracing::warn!(model = %model.name, error = %e, "could not create storage"),
            }
        }
        created
    }
}
