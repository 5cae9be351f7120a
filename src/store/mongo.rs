//! MongoDB document backend. Identifiers are ObjectIds exposed as `id` in hex.

use super::{object_id_schema, CollectionSpec, Document, SortKey, Storage};
use crate::error::StoreError;
use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document as BsonDocument};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;

/// Database used when the connection string names none.
pub const DEFAULT_DATABASE: &str = "crudgen";

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        MongoStore { db }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(database_url).await?;
        options.max_pool_size = Some(max_connections);
        let name = options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let client = Client::with_options(options)?;
        tracing::info!(database = %name, "document store connected");
        Ok(Self::new(client.database(&name)))
    }

    fn collection(&self, table: &str) -> Collection<BsonDocument> {
        self.db.collection(table)
    }
}

fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// Duplicate-key write errors become `Conflict`; the message names the index.
fn map_mongo_error(e: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(we)) = e.kind.as_ref() {
        if we.code == DUPLICATE_KEY {
            return StoreError::Conflict(we.message.clone());
        }
    }
    StoreError::Mongo(e)
}

/// JSON fields as BSON, without `id` (the store owns `_id`).
fn to_bson_document(doc: Document) -> Result<BsonDocument, StoreError> {
    doc.into_iter()
        .filter(|(k, _)| k != "id" && k != "_id")
        .map(|(k, v)| {
            Bson::try_from(v)
                .map(|b| (k.clone(), b))
                .map_err(|e| StoreError::Backend(format!("field '{}' cannot be stored: {}", k, e)))
        })
        .collect()
}

/// Stored document as JSON with `_id` renamed to `id`.
fn to_json_document(mut doc: BsonDocument) -> Document {
    let oid = doc.remove("_id");
    let mut out: Document = doc
        .into_iter()
        .map(|(k, v)| (k, v.into_relaxed_extjson()))
        .collect();
    match oid {
        Some(Bson::ObjectId(oid)) => {
            out.insert("id".into(), Value::String(oid.to_hex()));
        }
        Some(other) => {
            out.insert("id".into(), other.into_relaxed_extjson());
        }
        None => {}
    }
    out
}

/// `$sort` document for the keys, with `_id` last so pages are stable.
fn sort_document(sort: &[SortKey]) -> BsonDocument {
    let mut order = BsonDocument::new();
    for key in sort {
        let field = if key.field == "id" { "_id" } else { key.field.as_str() };
        order.insert(field, if key.descending { -1 } else { 1 });
    }
    if !order.contains_key("_id") {
        order.insert("_id", 1);
    }
    order
}

fn unique_index(group: &[String]) -> IndexModel {
    let keys: BsonDocument = group.iter().map(|f| (f.clone(), Bson::Int32(1))).collect();
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).sparse(true).build())
        .build()
}

#[async_trait]
impl Storage for MongoStore {
    fn id_schema(&self) -> Value {
        object_id_schema()
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        let coll = self.collection(&spec.table);
        for group in &spec.unique {
            coll.create_index(unique_index(group)).await.map_err(map_mongo_error)?;
        }
        tracing::debug!(collection = %spec.table, unique = ?spec.unique, "collection ready");
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        Ok(self.collection(table).count_documents(doc! {}).await?)
    }

    async fn find(
        &self,
        table: &str,
        limit: u32,
        offset: u32,
        sort: &[SortKey],
    ) -> Result<Vec<Document>, StoreError> {
        // A zero limit means "no limit" to the server.
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut cursor = self
            .collection(table)
            .find(doc! {})
            .sort(sort_document(sort))
            .skip(offset as u64)
            .limit(limit as i64)
            .await?;
        let mut docs = Vec::new();
        while cursor.advance().await? {
            docs.push(to_json_document(cursor.deserialize_current()?));
        }
        Ok(docs)
    }

    async fn find_one(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let oid = parse_id(id)?;
        let found = self.collection(table).find_one(doc! {"_id": oid}).await?;
        Ok(found.map(to_json_document))
    }

    async fn create(&self, table: &str, doc: Document) -> Result<String, StoreError> {
        let result = self
            .collection(table)
            .insert_one(to_bson_document(doc)?)
            .await
            .map_err(map_mongo_error)?;
        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(oid.to_hex()),
            other => Err(StoreError::Backend(format!("unexpected inserted id {}", other))),
        }
    }

    async fn update(&self, table: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let oid = parse_id(id)?;
        let set = to_bson_document(doc)?;
        if set.is_empty() {
            return Ok(());
        }
        self.collection(table)
            .update_one(doc! {"_id": oid}, doc! {"$set": set})
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let oid = parse_id(id)?;
        self.collection(table).delete_one(doc! {"_id": oid}).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! {"ping": 1}).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => m,
            _ => Document::new(),
        }
    }

    #[test]
    fn malformed_ids_are_invalid() {
        assert!(matches!(parse_id("fooobar"), Err(StoreError::InvalidId(_))));
        assert!(matches!(parse_id("zzzzzzzzzzzzzzzzzzzzzzzz"), Err(StoreError::InvalidId(_))));
        assert_eq!(
            parse_id("5f299b3e9cd7d821d2b898c1").unwrap().to_hex(),
            "5f299b3e9cd7d821d2b898c1"
        );
    }

    #[test]
    fn stored_fields_drop_client_ids() {
        let stored = to_bson_document(doc(json!({"id": "x", "url": "https://a.example", "hits": 3}))).unwrap();
        assert_eq!(stored, doc! {"hits": 3, "url": "https://a.example"});
    }

    #[test]
    fn object_id_becomes_hex_id() {
        let oid = ObjectId::parse_str("5f299b3e9cd7d821d2b898c1").unwrap();
        let read = to_json_document(doc! {"_id": oid, "url": "https://a.example", "tags": ["a"], "n": 2_i64});
        assert_eq!(
            Value::Object(read),
            json!({"id": "5f299b3e9cd7d821d2b898c1", "url": "https://a.example", "tags": ["a"], "n": 2})
        );
    }

    #[test]
    fn sort_maps_id_and_adds_tiebreak() {
        let order = sort_document(&SortKey::parse_list("-updated_at,url"));
        assert_eq!(order, doc! {"updated_at": -1, "url": 1, "_id": 1});
        let by_id = sort_document(&SortKey::parse_list("-id"));
        assert_eq!(by_id, doc! {"_id": -1});
    }
}
