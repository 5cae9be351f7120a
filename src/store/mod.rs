//! Storage interface shared by the document and relational backends.

mod memory;
mod mongo;
mod postgres;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Field name to value mapping as stored and returned by backends.
pub type Document = Map<String, Value>;

/// Document-store identifiers: 12 bytes rendered as lowercase hex.
pub const OBJECT_ID_PATTERN: &str = "^[a-f0-9]{24}$";

fn object_id_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "pattern": OBJECT_ID_PATTERN,
        "x-meta": {"writable": false}
    })
}

/// One key of a `sort` expression such as `-updated_at,url`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: &str) -> Self {
        SortKey {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        SortKey {
            field: field.to_string(),
            descending: true,
        }
    }

    /// Parse a comma-separated list; a leading `-` means descending. Empty items are skipped.
    pub fn parse_list(sort: &str) -> Vec<SortKey> {
        sort.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match item.strip_prefix('-') {
                Some(field) => SortKey::desc(field),
                None => SortKey::asc(item),
            })
            .collect()
    }
}

/// What a backend needs to provision a model's table or collection.
#[derive(Clone, Debug)]
pub struct CollectionSpec {
    pub table: String,
    pub schema: Value,
    /// Explicit DDL for the relational backend. Derived from `schema` when absent.
    pub ddl: Option<String>,
    /// Field groups that must be unique across documents.
    pub unique: Vec<Vec<String>>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Schema of the identifiers this backend generates, marked non-writable.
    fn id_schema(&self) -> Value;

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError>;

    async fn count(&self, table: &str) -> Result<u64, StoreError>;

    async fn find(
        &self,
        table: &str,
        limit: u32,
        offset: u32,
        sort: &[SortKey],
    ) -> Result<Vec<Document>, StoreError>;

    /// `Err(StoreError::InvalidId)` when `id` has the wrong format for this backend.
    async fn find_one(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert and return the generated id.
    async fn create(&self, table: &str, doc: Document) -> Result<String, StoreError>;

    /// Merge `doc` into the stored document. Missing ids are not an error.
    async fn update(&self, table: &str, id: &str, doc: Document) -> Result<(), StoreError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sort_list() {
        assert_eq!(
            SortKey::parse_list("-updated_at, url,,"),
            vec![SortKey::desc("updated_at"), SortKey::asc("url")]
        );
        assert!(SortKey::parse_list("").is_empty());
    }
}
