//! Relational backend on PostgreSQL. Identifiers are BIGSERIAL integers.

use super::{CollectionSpec, Document, SortKey, Storage};
use crate::error::StoreError;
use crate::migration::create_table_sql;
use crate::sql::{self, PgBindValue, QueryBuf, TableInfo};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

pub struct PgStore {
    pool: PgPool,
    /// Binding casts per table, registered by `ensure_collection`.
    tables: RwLock<HashMap<String, TableInfo>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore {
            pool,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    fn table(&self, name: &str) -> TableInfo {
        self.tables
            .read()
            .ok()
            .and_then(|t| t.get(name).cloned())
            .unwrap_or_else(|| TableInfo::bare(name))
    }
}

fn parse_id(id: &str) -> Result<i64, StoreError> {
    id.parse().map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// Unique (23505) and foreign-key (23503) violations become `Conflict` with the database message.
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if matches!(db.code().as_deref(), Some("23505") | Some("23503")) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Db(e)
}

/// Text form of a generated key; any integer width or a text/uuid key is accepted.
fn returned_id(value: Value) -> Result<String, StoreError> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s),
        other => Err(StoreError::Backend(format!("unusable generated id {}", other))),
    }
}

fn bind_all<'q>(
    sql: &'q str,
    params: &[Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params.iter().filter_map(PgBindValue::from_json) {
        query = query.bind(p);
    }
    query
}

#[async_trait]
impl Storage for PgStore {
    fn id_schema(&self) -> Value {
        serde_json::json!({
            "type": "integer",
            "x-meta": {"writable": false}
        })
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(spec.table.clone(), TableInfo::from_schema(&spec.table, &spec.schema));
        }
        let ddl = spec.ddl.clone().unwrap_or_else(|| create_table_sql(spec));
        tracing::debug!(sql = %ddl, "ddl");
        sqlx::raw_sql(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        let q = sql::count(&self.table(table));
        tracing::debug!(sql = %q.sql, "query");
        let n = sqlx::query_scalar::<_, i64>(&q.sql).fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn find(
        &self,
        table: &str,
        limit: u32,
        offset: u32,
        sort: &[SortKey],
    ) -> Result<Vec<Document>, StoreError> {
        let q = sql::select_page(&self.table(table), sort, limit, offset);
        tracing::debug!(sql = %q.sql, "query");
        let rows = sqlx::query(&q.sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn find_one(&self, table: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let q = sql::select_by_id(&self.table(table), parse_id(id)?);
        let row = fetch_optional(&self.pool, &q).await?;
        Ok(row.as_ref().map(row_to_document))
    }

    async fn create(&self, table: &str, doc: Document) -> Result<String, StoreError> {
        let q = sql::insert(&self.table(table), &doc);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        returned_id(cell_to_value(&row, "id"))
    }

    async fn update(&self, table: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let Some(q) = sql::update(&self.table(table), parse_id(id)?, &doc) else { return Ok(()) };
        execute(&self.pool, &q).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let q = sql::delete(&self.table(table), parse_id(id)?);
        execute(&self.pool, &q).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

async fn fetch_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<PgRow>, StoreError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    Ok(bind_all(&q.sql, &q.params).fetch_optional(pool).await?)
}

async fn execute(pool: &PgPool, q: &QueryBuf) -> Result<(), StoreError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    bind_all(&q.sql, &q.params)
        .execute(pool)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

fn row_to_document(row: &PgRow) -> Document {
    use sqlx::Column;
    use sqlx::Row;
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.name())))
        .collect()
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339_opts(chrono::SecondsFormat::Micros, true));
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the store.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StoreError::Backend(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Backend("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}
