//! Load model definitions from a JSON manifest: an array of definitions.

use crate::config::{validate_definitions, ModelDefinition};
use crate::error::ConfigError;
use std::path::Path;

pub fn definitions_from_str(json: &str) -> Result<Vec<ModelDefinition>, ConfigError> {
    let definitions: Vec<ModelDefinition> =
        serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("invalid model manifest: {}", e)))?;
    validate_definitions(&definitions)?;
    Ok(definitions)
}

pub async fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<ModelDefinition>, ConfigError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let definitions = definitions_from_str(&json)?;
    tracing::info!(path = %path.display(), models = definitions.len(), "loaded model definitions");
    Ok(definitions)
}
