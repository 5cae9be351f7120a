//! Definition validation: names, schema shape, unique groups and parameters.

use crate::config::{ModelDefinition, ParamLocation};
use crate::error::ConfigError;
use crate::schema::{declares, properties};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// Model names become URL segments and operation ids.
fn valid_name(name: &str) -> bool {
    Regex::new(r"^[a-z0-9][a-z0-9_\-]*$")
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

pub fn validate_definitions(definitions: &[ModelDefinition]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for def in definitions {
        if !names.insert(def.name.as_str()) {
            return Err(ConfigError::DuplicateModel(def.name.clone()));
        }
        validate_definition(def)?;
    }
    Ok(())
}

pub fn validate_definition(def: &ModelDefinition) -> Result<(), ConfigError> {
    if !valid_name(&def.name) {
        return Err(ConfigError::InvalidName(def.name.clone()));
    }
    let invalid_schema = |reason: String| ConfigError::InvalidSchema {
        model: def.name.clone(),
        reason,
    };
    if !def.json_schema.is_object() {
        return Err(invalid_schema("schema must be a JSON object".into()));
    }
    if properties(&def.json_schema).is_none() {
        return Err(invalid_schema("schema must declare 'properties'".into()));
    }
    if let Some(required) = def.json_schema.get("required") {
        let names = required
            .as_array()
            .ok_or_else(|| invalid_schema("'required' must be an array".into()))?;
        if let Some(missing) = names.iter().filter_map(Value::as_str).find(|n| !declares(&def.json_schema, n)) {
            return Err(invalid_schema(format!("required field '{}' is not a property", missing)));
        }
    }
    for group in &def.unique {
        if group.is_empty() {
            return Err(invalid_schema("unique group must name at least one field".into()));
        }
        if let Some(field) = group.iter().find(|f| !declares(&def.json_schema, f)) {
            return Err(invalid_schema(format!("unique field '{}' is not a property", field)));
        }
    }

    for (op, specs) in &def.parameters {
        for spec in specs {
            let invalid = |reason: &str| ConfigError::InvalidParameter {
                model: def.name.clone(),
                name: spec.name.clone(),
                reason: reason.to_string(),
            };
            if spec.name.trim().is_empty() {
                return Err(invalid("name must not be empty"));
            }
            if spec.location == ParamLocation::Path && !(op.is_item() && spec.name == "id") {
                return Err(invalid("the only path parameter is 'id' on item routes"));
            }
            if !spec.schema.is_object() {
                return Err(invalid("schema must be a JSON object"));
            }
        }
    }
    Ok(())
}
