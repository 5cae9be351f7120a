//! Model API: the five CRUD operations bound to one table and resource schema.

use super::operation::OperationKind;
use super::pipeline::{Handler, Middleware, Pipeline};
use super::validation::{BodyCheck, ValidateBody, ValidateWith};
use crate::error::AppError;
use crate::response::{ApiRequest, ApiResponse};
use crate::schema::{declares, without_required, WritableFields};
use crate::store::{Document, SortKey, Storage};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_LIMIT: u32 = 100;
pub const DEFAULT_MAX_LIMIT: u32 = 1000;

/// Current UTC time as RFC 3339 with microseconds, e.g. `2024-05-01T12:00:00.123456Z`.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop fields whose value is null.
pub fn remove_none(doc: Document) -> Document {
    doc.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

/// Response body schema of an operation. `list` wraps the resource schema in a page envelope.
pub fn response_schema(schema: &Value, op: OperationKind) -> Value {
    match op {
        OperationKind::List => json!({
            "type": "object",
            "properties": {
                "data": {"type": "array", "items": schema},
                "count": {"type": "integer"},
                "limit": {"type": "integer"},
                "offset": {"type": "integer"},
                "sort": {"type": "string"}
            },
            "required": ["data", "count", "limit", "offset"],
            "additionalProperties": false
        }),
        _ => schema.clone(),
    }
}

/// Per-operation middleware, applied outermost first.
#[derive(Clone, Default)]
pub struct Decorators {
    by_op: HashMap<OperationKind, Vec<Arc<dyn Middleware>>>,
}

impl Decorators {
    pub fn add(&mut self, op: OperationKind, layer: Arc<dyn Middleware>) {
        self.by_op.entry(op).or_default().push(layer);
    }

    pub fn for_op(&self, op: OperationKind) -> &[Arc<dyn Middleware>] {
        self.by_op.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl std::fmt::Debug for Decorators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self.by_op.iter().map(|(op, v)| (op.name(), v.len())).collect();
        f.debug_struct("Decorators").field("layers", &counts).finish()
    }
}

pub struct ModelApi {
    table: String,
    schema: Value,
    writable: WritableFields,
    store: Arc<dyn Storage>,
    default_sort: String,
    max_limit: u32,
    decorators: Decorators,
}

impl ModelApi {
    pub fn new(table: &str, schema: Value, store: Arc<dyn Storage>) -> Self {
        let default_sort = if declares(&schema, "updated_at") {
            "-updated_at".to_string()
        } else {
            "id".to_string()
        };
        ModelApi {
            table: table.to_string(),
            writable: WritableFields::from_schema(&schema),
            schema,
            store,
            default_sort,
            max_limit: DEFAULT_MAX_LIMIT,
            decorators: Decorators::default(),
        }
    }

    pub fn with_max_limit(mut self, max_limit: u32) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn decorate(mut self, op: OperationKind, layer: Arc<dyn Middleware>) -> Self {
        self.decorators.add(op, layer);
        self
    }

    pub fn with_decorators(mut self, decorators: &Decorators) -> Self {
        for op in OperationKind::ALL {
            for layer in decorators.for_op(op) {
                self.decorators.add(op, layer.clone());
            }
        }
        self
    }

    /// Validate create and update bodies against [`ModelApi::request_schema`].
    pub fn with_validation(self) -> Self {
        let create = self.request_schema(OperationKind::Create);
        let update = self.request_schema(OperationKind::Update);
        let mut api = self;
        if let Some(schema) = create {
            api = api.decorate(OperationKind::Create, Arc::new(ValidateBody::new(schema)));
        }
        if let Some(schema) = update {
            api = api.decorate(OperationKind::Update, Arc::new(ValidateBody::new(schema)));
        }
        api
    }

    /// Run an extra check on create and update requests.
    pub fn with_check(self, check: BodyCheck) -> Self {
        self.decorate(OperationKind::Create, Arc::new(ValidateWith::new(check.clone())))
            .decorate(OperationKind::Update, Arc::new(ValidateWith::new(check)))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    pub fn max_limit(&self) -> u32 {
        self.max_limit
    }

    pub fn default_sort(&self) -> &str {
        &self.default_sort
    }

    pub fn response_schema(&self, op: OperationKind) -> Value {
        response_schema(&self.schema, op)
    }

    /// Body schema for create (full) and update (merge-patch, no `required`).
    pub fn request_schema(&self, op: OperationKind) -> Option<Value> {
        match op {
            OperationKind::Create => Some(self.schema.clone()),
            OperationKind::Update => Some(without_required(&self.schema)),
            _ => None,
        }
    }

    /// Handler for `op` with this model's decorators in front.
    pub fn handler(self: &Arc<Self>, op: OperationKind) -> Arc<dyn Handler> {
        let endpoint = Arc::new(ModelOperation {
            api: self.clone(),
            op,
        });
        Arc::new(Pipeline::new(self.decorators.for_op(op).to_vec(), endpoint))
    }

    pub async fn execute(&self, op: OperationKind, req: &ApiRequest) -> Result<ApiResponse, AppError> {
        match op {
            OperationKind::List => self.list(req).await,
            OperationKind::Get => self.get(req).await,
            OperationKind::Create => self.create(req).await,
            OperationKind::Update => self.update(req).await,
            OperationKind::Delete => self.delete(req).await,
        }
    }

    pub async fn list(&self, req: &ApiRequest) -> Result<ApiResponse, AppError> {
        let limit = count_param(req, "limit", DEFAULT_LIMIT)?;
        if limit > self.max_limit {
            return Err(AppError::Validation(format!(
                "limit must be at most {}",
                self.max_limit
            )));
        }
        let offset = count_param(req, "offset", 0)?;
        let sort = req
            .query_param("sort")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_sort)
            .to_string();
        let keys = SortKey::parse_list(&sort);
        if let Some(bad) = keys.iter().find(|k| k.field != "id" && !declares(&self.schema, &k.field)) {
            return Err(AppError::Validation(format!("invalid sort field '{}'", bad.field)));
        }

        let count = self.store.count(&self.table).await?;
        let data: Vec<Value> = self
            .store
            .find(&self.table, limit, offset, &keys)
            .await?
            .into_iter()
            .map(|d| Value::Object(remove_none(d)))
            .collect();
        Ok(ApiResponse::ok(json!({
            "data": data,
            "count": count,
            "limit": limit,
            "offset": offset,
            "sort": sort
        })))
    }

    pub async fn get(&self, req: &ApiRequest) -> Result<ApiResponse, AppError> {
        let id = path_id(req)?;
        let doc = self.store.find_one(&self.table, id).await?.ok_or(AppError::NotFound)?;
        Ok(ApiResponse::ok(Value::Object(remove_none(doc))))
    }

    pub async fn create(&self, req: &ApiRequest) -> Result<ApiResponse, AppError> {
        let mut data = self.writable.filter(req.body.as_ref().unwrap_or(&Value::Null));
        let now = now_timestamp();
        for field in ["created_at", "updated_at"] {
            if declares(&self.schema, field) {
                data.insert(field.to_string(), Value::String(now.clone()));
            }
        }
        let id = self.store.create(&self.table, data).await?;
        tracing::debug!(table = %self.table, id = %id, "created");
        let doc = self.store.find_one(&self.table, &id).await?.ok_or(AppError::NotFound)?;
        Ok(ApiResponse::ok(Value::Object(remove_none(doc))))
    }

    pub async fn update(&self, req: &ApiRequest) -> Result<ApiResponse, AppError> {
        let id = path_id(req)?;
        let mut data = self.writable.filter(req.body.as_ref().unwrap_or(&Value::Null));
        if declares(&self.schema, "updated_at") {
            data.insert("updated_at".to_string(), Value::String(now_timestamp()));
        }
        self.store.update(&self.table, id, data).await?;
        let doc = self.store.find_one(&self.table, id).await?.ok_or(AppError::NotFound)?;
        Ok(ApiResponse::ok(Value::Object(remove_none(doc))))
    }

    pub async fn delete(&self, req: &ApiRequest) -> Result<ApiResponse, AppError> {
        let id = path_id(req)?;
        let doc = self.store.find_one(&self.table, id).await?.ok_or(AppError::NotFound)?;
        self.store.delete(&self.table, id).await?;
        tracing::debug!(table = %self.table, id = %id, "deleted");
        Ok(ApiResponse::ok(Value::Object(remove_none(doc))))
    }
}

fn path_id(req: &ApiRequest) -> Result<&str, AppError> {
    req.path_param("id")
        .ok_or_else(|| AppError::BadRequest("missing path parameter 'id'".into()))
}

/// Non-negative integer query parameter, `default` when absent.
fn count_param(req: &ApiRequest, name: &str, default: u32) -> Result<u32, AppError> {
    match req.query_param(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| AppError::Validation(format!("{} must be a non-negative integer", name))),
    }
}

/// Endpoint of a model pipeline: runs one operation and renders errors.
struct ModelOperation {
    api: Arc<ModelApi>,
    op: OperationKind,
}

#[async_trait]
impl Handler for ModelOperation {
    async fn call(&self, req: ApiRequest) -> ApiResponse {
        match self.api.execute(self.op, &req).await {
            Ok(resp) => resp,
            Err(e) => e.into_api_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate;
    use crate::store::{CollectionSpec, MemoryStore};
    use axum::http::StatusCode;

    fn urls_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "pattern": "^[a-f0-9]{24}$", "x-meta": {"writable": false}},
                "url": {"type": "string"},
                "note": {"type": ["string", "null"]},
                "created_at": {"type": "string", "x-meta": {"writable": false}},
                "updated_at": {"type": "string", "x-meta": {"writable": false}}
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    async fn urls_api() -> Arc<ModelApi> {
        let store = Arc::new(MemoryStore::new());
        store
            .ensure_collection(&CollectionSpec {
                table: "urls".into(),
                schema: urls_schema(),
                ddl: None,
                unique: vec![vec!["url".into()]],
            })
            .await
            .unwrap();
        Arc::new(ModelApi::new("urls", urls_schema(), store).with_validation())
    }

    async fn call(api: &Arc<ModelApi>, op: OperationKind, req: ApiRequest) -> ApiResponse {
        api.handler(op).call(req).await
    }

    #[tokio::test]
    async fn create_stamps_timestamps_and_ignores_read_only_fields() {
        let api = urls_api().await;
        let resp = call(
            &api,
            OperationKind::Create,
            ApiRequest::new().with_body(json!({"url": "https://x.example", "created_at": "1999"})),
        )
        .await;
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.body;
        assert_eq!(body["url"], "https://x.example");
        assert_eq!(body["created_at"], body["updated_at"]);
        assert_ne!(body["created_at"], "1999");
        assert_eq!(body["id"].as_str().map(str::len), Some(24));
        assert!(validate(&body, api.schema()).is_ok());
    }

    #[tokio::test]
    async fn null_fields_are_omitted() {
        let api = urls_api().await;
        let created = call(
            &api,
            OperationKind::Create,
            ApiRequest::new().with_body(json!({"url": "https://x.example", "note": null})),
        )
        .await
        .body;
        assert!(created.get("note").is_none());
    }

    #[tokio::test]
    async fn list_defaults_and_sort() {
        let api = urls_api().await;
        for u in ["https://a.example", "https://b.example", "https://c.example"] {
            call(&api, OperationKind::Create, ApiRequest::new().with_body(json!({ "url": u }))).await;
        }
        let resp = call(&api, OperationKind::List, ApiRequest::new()).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["count"], 3);
        assert_eq!(resp.body["limit"], 100);
        assert_eq!(resp.body["offset"], 0);
        assert_eq!(resp.body["sort"], "-updated_at");
        assert!(validate(&resp.body, &api.response_schema(OperationKind::List)).is_ok());

        let resp = call(
            &api,
            OperationKind::List,
            ApiRequest::new().with_query("sort", "url").with_query("limit", "2").with_query("offset", "1"),
        )
        .await;
        let urls: Vec<&str> = resp.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|d| d["url"].as_str())
            .collect();
        assert_eq!(urls, vec!["https://b.example", "https://c.example"]);
        assert_eq!(resp.body["count"], 3);
    }

    #[tokio::test]
    async fn list_rejects_bad_paging_and_sort() {
        let api = urls_api().await;
        for (name, value) in [("limit", "-1"), ("limit", "abc"), ("limit", "1001"), ("offset", "-5"), ("sort", "nope")] {
            let resp = call(&api, OperationKind::List, ApiRequest::new().with_query(name, value)).await;
            assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}={}", name, value);
        }
    }

    #[tokio::test]
    async fn item_operations_distinguish_malformed_and_missing_ids() {
        let api = urls_api().await;
        let request = |id: &str| {
            ApiRequest::new()
                .with_path_param("id", id)
                .with_body(json!({"url": "https://x.example"}))
        };
        for op in [OperationKind::Get, OperationKind::Update, OperationKind::Delete] {
            for bad in ["fooobar", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
                let resp = call(&api, op, request(bad)).await;
                assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{} {}", op, bad);
                assert_eq!(resp.body["error"]["code"], "invalid_id", "{} {}", op, bad);
            }
            let missing = call(&api, op, request("5f299b3e9cd7d821d2b898c1")).await;
            assert_eq!(missing.status, StatusCode::NOT_FOUND, "{}", op);
        }
    }

    #[tokio::test]
    async fn update_merges_and_refreshes_updated_at() {
        let api = urls_api().await;
        let created = call(
            &api,
            OperationKind::Create,
            ApiRequest::new().with_body(json!({"url": "https://x.example", "note": "keep"})),
        )
        .await
        .body;
        let id = created["id"].as_str().unwrap().to_string();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let updated = call(
            &api,
            OperationKind::Update,
            ApiRequest::new()
                .with_path_param("id", id.clone())
                .with_body(json!({"url": "https://y.example"})),
        )
        .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["url"], "https://y.example");
        assert_eq!(updated.body["note"], "keep");
        assert_eq!(updated.body["created_at"], created["created_at"]);
        assert!(updated.body["updated_at"].as_str() > created["updated_at"].as_str());

        let missing = call(
            &api,
            OperationKind::Update,
            ApiRequest::new()
                .with_path_param("id", "5f299b3e9cd7d821d2b898c1")
                .with_body(json!({"url": "https://z.example"})),
        )
        .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_rejects_before_store() {
        let api = urls_api().await;
        let cases = [json!({}), json!({"url": 123}), json!({"url": "https://x.example", "foo": 1})];
        for body in cases {
            let resp = call(&api, OperationKind::Create, ApiRequest::new().with_body(body.clone())).await;
            assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", body);
        }
        let resp = call(&api, OperationKind::Create, ApiRequest::new()).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.store().count("urls").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_is_bad_request_with_reason() {
        let api = urls_api().await;
        let body = json!({"url": "https://x.example"});
        call(&api, OperationKind::Create, ApiRequest::new().with_body(body.clone())).await;
        let dup = call(&api, OperationKind::Create, ApiRequest::new().with_body(body)).await;
        assert_eq!(dup.status, StatusCode::BAD_REQUEST);
        assert!(dup.body["error"]["message"].as_str().unwrap().contains("duplicate"));
    }

    #[tokio::test]
    async fn delete_returns_prior_state() {
        let api = urls_api().await;
        let created = call(
            &api,
            OperationKind::Create,
            ApiRequest::new().with_body(json!({"url": "https://x.example"})),
        )
        .await
        .body;
        let id = created["id"].as_str().unwrap().to_string();
        let deleted = call(&api, OperationKind::Delete, ApiRequest::new().with_path_param("id", id.clone())).await;
        assert_eq!(deleted.body, created);
        let again = call(&api, OperationKind::Delete, ApiRequest::new().with_path_param("id", id)).await;
        assert_eq!(again.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn default_sort_falls_back_to_id() {
        let api = ModelApi::new(
            "t",
            json!({"properties": {"name": {"type": "string"}}}),
            Arc::new(MemoryStore::new()),
        );
        assert_eq!(api.default_sort(), "id");
        assert_eq!(api.response_schema(OperationKind::Get), *api.schema());
    }
}
