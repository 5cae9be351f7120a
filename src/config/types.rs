//! Model definitions: the declarative input from which routes and tables are generated.

use crate::service::{BodyCheck, Decorators, Middleware, OperationKind};
use crate::response::ApiRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

impl ParamLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
        }
    }
}

/// One declared request parameter, in OpenAPI parameter shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "in")]
    pub location: ParamLocation,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "any_schema")]
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn any_schema() -> Value {
    serde_json::json!({"type": "string"})
}

impl ParameterSpec {
    pub fn new(location: ParamLocation, name: &str, schema: Value) -> Self {
        ParameterSpec {
            location,
            name: name.to_string(),
            required: false,
            schema,
            description: None,
        }
    }

    pub fn query(name: &str, schema: Value) -> Self {
        Self::new(ParamLocation::Query, name, schema)
    }

    pub fn header(name: &str, schema: Value) -> Self {
        Self::new(ParamLocation::Header, name, schema)
    }

    pub fn path(name: &str, schema: Value) -> Self {
        Self::new(ParamLocation::Path, name, schema).required()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

fn all_operations() -> Vec<OperationKind> {
    OperationKind::ALL.to_vec()
}

/// A resource: name (URL segment), table, JSON Schema and optional extras.
/// Decorators and custom checks are code-only and never (de)serialized.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    /// Storage table or collection. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub json_schema: Value,
    /// Explicit DDL for the relational backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_schema: Option<String>,
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
    #[serde(default = "all_operations")]
    pub route_names: Vec<OperationKind>,
    #[serde(default)]
    pub parameters: HashMap<OperationKind, Vec<ParameterSpec>>,
    #[serde(skip)]
    pub decorators: Decorators,
    #[serde(skip)]
    pub check: Option<BodyCheck>,
}

impl ModelDefinition {
    pub fn new(name: &str, json_schema: Value) -> Self {
        ModelDefinition {
            name: name.to_string(),
            table: None,
            json_schema,
            db_schema: None,
            unique: Vec::new(),
            route_names: all_operations(),
            parameters: HashMap::new(),
            decorators: Decorators::default(),
            check: None,
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn db_schema(mut self, ddl: &str) -> Self {
        self.db_schema = Some(ddl.to_string());
        self
    }

    pub fn unique(mut self, fields: &[&str]) -> Self {
        self.unique.push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn route_names(mut self, ops: &[OperationKind]) -> Self {
        self.route_names = ops.to_vec();
        self
    }

    pub fn parameter(mut self, op: OperationKind, spec: ParameterSpec) -> Self {
        self.parameters.entry(op).or_default().push(spec);
        self
    }

    pub fn decorate(mut self, op: OperationKind, layer: Arc<dyn Middleware>) -> Self {
        self.decorators.add(op, layer);
        self
    }

    /// Extra check on create and update; `Some(reason)` rejects with 400.
    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(&ApiRequest) -> Option<String> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("table", &self.table_name())
            .field("route_names", &self.route_names)
            .field("unique", &self.unique)
            .field("decorators", &self.decorators)
            .field("check", &self.check.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_with_defaults() {
        let def: ModelDefinition = serde_json::from_value(json!({
            "name": "articles",
            "json_schema": {"type": "object", "properties": {"title": {"type": "string"}}},
            "parameters": {
                "list": [{"in": "query", "name": "q", "schema": {"type": "string", "minLength": 2}}]
            }
        }))
        .unwrap();
        assert_eq!(def.table_name(), "articles");
        assert_eq!(def.route_names, OperationKind::ALL.to_vec());
        let list = &def.parameters[&OperationKind::List];
        assert_eq!(list[0].location, ParamLocation::Query);
        assert!(!list[0].required);
    }

    #[test]
    fn builder_sets_extras() {
        let def = ModelDefinition::new("urls", json!({}))
            .table("app.urls")
            .unique(&["url"])
            .route_names(&[OperationKind::List])
            .check(|_| None);
        assert_eq!(def.table_name(), "app.urls");
        assert_eq!(def.unique, vec![vec!["url".to_string()]]);
        assert!(def.check.is_some());
    }
}
