//! In-process document store.
//!
//! Identifiers are 24-char lowercase hex strings built from a 4-byte timestamp, a 5-byte
//! per-process tag and a 3-byte counter, so they order by creation within a process.

use super::{object_id_schema, CollectionSpec, Document, SortKey, Storage};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Collection {
    docs: BTreeMap<String, Document>,
    unique: Vec<Vec<String>>,
}

pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    process_tag: [u8; 5],
    counter: AtomicU32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let seed = uuid::Uuid::new_v4().into_bytes();
        let mut process_tag = [0u8; 5];
        process_tag.copy_from_slice(&seed[..5]);
        let counter = u32::from_be_bytes([0, seed[5], seed[6], seed[7]]);
        MemoryStore {
            collections: RwLock::new(HashMap::new()),
            process_tag,
            counter: AtomicU32::new(counter),
        }
    }

    fn next_id(&self) -> String {
        let secs = chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        let count = self.counter.fetch_add(1, AtomicOrdering::Relaxed) & 0x00FF_FFFF;
        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(&secs.to_be_bytes());
        bytes.extend_from_slice(&self.process_tag);
        bytes.extend_from_slice(&count.to_be_bytes()[1..]);
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .read()
            .map_err(|_| StoreError::Backend("collection lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::Backend("collection lock poisoned".into()))
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    let ok = id.len() == 24 && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

/// Reason for the first unique group that `doc` would duplicate, ignoring the document `own_id`.
fn unique_violation(table: &str, coll: &Collection, doc: &Document, own_id: Option<&str>) -> Option<String> {
    for group in &coll.unique {
        let key: Option<Vec<&Value>> = group.iter().map(|f| doc.get(f)).collect();
        let Some(key) = key else { continue };
        let taken = coll.docs.iter().any(|(id, other)| {
            Some(id.as_str()) != own_id && group.iter().zip(&key).all(|(f, v)| other.get(f) == Some(*v))
        });
        if taken {
            return Some(format!(
                "duplicate key value violates unique index \"{}_{}_key\"",
                table,
                group.join("_")
            ));
        }
    }
    None
}

fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_docs(a: &Document, b: &Document, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ord = compare_values(a.get(&key.field), b.get(&key.field));
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl Storage for MemoryStore {
    fn id_schema(&self) -> Value {
        object_id_schema()
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        let mut collections = self.write()?;
        collections.entry(spec.table.clone()).or_default().unique = spec.unique.clone();
        tracing::debug!(collection = %spec.table, unique = ?spec.unique, "collection ready");
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        Ok(self.read()?.get(table).map(|c| c.docs.len() as u64).unwrap_or(0))
    }

    async fn find(
        &self,
        table: &str,
        limit: u32,
        offset: u32,
        sort: &[SortKey],
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.read()?;
        let Some(coll) = collections.get(table) else { return Ok(Vec::new()) };
        let mut docs: Vec<&Document> = coll.docs.values().collect();
        docs.sort_by(|a, b| compare_docs(a, b, sort));
        Ok(docs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_one(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError> {
        check_id(id)?;
        Ok(self.read()?.get(table).and_then(|c| c.docs.get(id)).cloned())
    }

    async fn create(&self, table: &str, mut doc: Document) -> Result<String, StoreError> {
        let id = self.next_id();
        let mut collections = self.write()?;
        let coll = collections.entry(table.to_string()).or_default();
        if let Some(reason) = unique_violation(table, coll, &doc, None) {
            return Err(StoreError::Conflict(reason));
        }
        doc.insert("id".into(), Value::String(id.clone()));
        coll.docs.insert(id.clone(), doc);
        Ok(id)
    }

    async fn update(&self, table: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        check_id(id)?;
        let mut collections = self.write()?;
        let Some(coll) = collections.get_mut(table) else { return Ok(()) };
        let Some(existing) = coll.docs.get(id) else { return Ok(()) };
        let mut merged = existing.clone();
        for (k, v) in doc {
            if k != "id" {
                merged.insert(k, v);
            }
        }
        if let Some(reason) = unique_violation(table, coll, &merged, Some(id)) {
            return Err(StoreError::Conflict(reason));
        }
        coll.docs.insert(id.to_string(), merged);
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        check_id(id)?;
        if let Some(coll) = self.write()?.get_mut(table) {
            coll.docs.remove(id);
        }
        Ok(())
    }
}
