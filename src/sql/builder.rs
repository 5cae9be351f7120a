//! Builds parameterized COUNT, SELECT, INSERT, UPDATE, DELETE for a model table.

use crate::store::{Document, SortKey};
use serde_json::Value;
use std::collections::HashMap;

/// Quote identifier for PostgreSQL (safe: only from model definitions).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name (`schema.table`).
pub fn qualified_table(name: &str) -> String {
    name.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

/// Table name plus the SQL casts needed when binding text values (e.g. timestamps).
#[derive(Clone, Debug, Default)]
pub struct TableInfo {
    pub name: String,
    pub casts: HashMap<String, String>,
}

impl TableInfo {
    pub fn bare(name: &str) -> Self {
        TableInfo {
            name: name.to_string(),
            casts: HashMap::new(),
        }
    }

    /// Casts derived from property schemas: timestamps (see `schema::is_timestamp`) →
    /// timestamptz, `date` → date, and integer columns that also accept strings → bigint.
    pub fn from_schema(name: &str, schema: &Value) -> Self {
        let casts = crate::schema::properties(schema)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(col, p)| {
                        let cast = match p.get("format").and_then(Value::as_str) {
                            _ if crate::schema::is_timestamp(col, p) => "timestamptz",
                            Some("date") => "date",
                            _ if integer_from_text(p) => "bigint",
                            _ => return None,
                        };
                        Some((col.clone(), cast.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        TableInfo {
            name: name.to_string(),
            casts,
        }
    }

    fn placeholder(&self, column: &str, n: usize) -> String {
        match self.casts.get(column) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

fn integer_from_text(prop: &Value) -> bool {
    match prop.get("type") {
        Some(Value::Array(types)) => {
            types.iter().any(|t| t == "integer") && types.iter().any(|t| t == "string")
        }
        _ => false,
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Placeholder for `v` in `column`, or a `NULL` literal for JSON null.
    fn value_expr(&mut self, table: &TableInfo, column: &str, v: &Value) -> String {
        if v.is_null() {
            return "NULL".into();
        }
        let n = self.push_param(v.clone());
        table.placeholder(column, n)
    }
}

pub fn count(table: &TableInfo) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", qualified_table(&table.name));
    q
}

/// SELECT page ordered by `sort` keys, then id for a stable order.
pub fn select_page(table: &TableInfo, sort: &[SortKey], limit: u32, offset: u32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut order: Vec<String> = sort
        .iter()
        .map(|k| format!("{} {}", quoted(&k.field), if k.descending { "DESC" } else { "ASC" }))
        .collect();
    if !sort.iter().any(|k| k.field == "id") {
        order.push(format!("{} ASC", quoted("id")));
    }
    q.sql = format!(
        "SELECT * FROM {} ORDER BY {} LIMIT {} OFFSET {}",
        qualified_table(&table.name),
        order.join(", "),
        limit,
        offset
    );
    q
}

pub fn select_by_id(table: &TableInfo, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.push_param(Value::from(id));
    q.sql = format!("SELECT * FROM {} WHERE {} = $1", qualified_table(&table.name), quoted("id"));
    q
}

/// INSERT the document's fields, returning the generated id.
pub fn insert(table: &TableInfo, doc: &Document) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = qualified_table(&table.name);
    if doc.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, quoted("id"));
        return q;
    }
    let mut cols = Vec::with_capacity(doc.len());
    let mut values = Vec::with_capacity(doc.len());
    for (k, v) in doc {
        cols.push(quoted(k));
        values.push(q.value_expr(table, k, v));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        target,
        cols.join(", "),
        values.join(", "),
        quoted("id")
    );
    q
}

/// UPDATE by id: SET only the given fields. None when there is nothing to set.
pub fn update(table: &TableInfo, id: i64, doc: &Document) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let sets: Vec<String> = doc
        .iter()
        .filter(|(k, _)| k.as_str() != "id")
        .map(|(k, v)| format!("{} = {}", quoted(k), q.value_expr(table, k, v)))
        .collect();
    if sets.is_empty() {
        return None;
    }
    let id_param = q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        qualified_table(&table.name),
        sets.join(", "),
        quoted("id"),
        id_param
    );
    Some(q)
}

pub fn delete(table: &TableInfo, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.push_param(Value::from(id));
    q.sql = format!("DELETE FROM {} WHERE {} = $1", qualified_table(&table.name), quoted("id"));
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn urls() -> TableInfo {
        TableInfo::from_schema(
            "urls",
            &json!({"properties": {
                "url": {"type": "string"},
                "created_at": {"type": "string", "format": "date-time"},
                "updated_at": {"type": "string", "format": "date-time"}
            }}),
        )
    }

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => m,
            _ => Document::new(),
        }
    }

    #[test]
    fn page_orders_by_sort_keys_then_id() {
        let q = select_page(&urls(), &SortKey::parse_list("-updated_at,url"), 100, 20);
        assert_eq!(
            q.sql,
            "SELECT * FROM \"urls\" ORDER BY \"updated_at\" DESC, \"url\" ASC, \"id\" ASC LIMIT 100 OFFSET 20"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn insert_casts_timestamps_and_inlines_null() {
        let q = insert(
            &urls(),
            &doc(json!({"created_at": "2024-01-01T00:00:00Z", "note": null, "url": "https://a.example"})),
        );
        assert_eq!(
            q.sql,
            "INSERT INTO \"urls\" (\"created_at\", \"note\", \"url\") VALUES ($1::timestamptz, NULL, $2) RETURNING \"id\""
        );
        assert_eq!(q.params, vec![json!("2024-01-01T00:00:00Z"), json!("https://a.example")]);
    }

    #[test]
    fn empty_insert_uses_defaults() {
        let q = insert(&urls(), &Document::new());
        assert_eq!(q.sql, "INSERT INTO \"urls\" DEFAULT VALUES RETURNING \"id\"");
    }

    #[test]
    fn update_sets_only_given_fields() {
        let q = update(&urls(), 7, &doc(json!({"id": 9, "url": "https://b.example"}))).unwrap();
        assert_eq!(q.sql, "UPDATE \"urls\" SET \"url\" = $1 WHERE \"id\" = $2");
        assert_eq!(q.params, vec![json!("https://b.example"), json!(7)]);
        assert!(update(&urls(), 7, &Document::new()).is_none());
    }

    #[test]
    fn stamped_fields_cast_without_format() {
        let t = TableInfo::from_schema(
            "notes",
            &json!({"properties": {"text": {"type": "string"}, "created_at": {"type": "string"}}}),
        );
        let q = insert(&t, &doc(json!({"created_at": "2024-01-01T00:00:00Z", "text": "hi"})));
        assert_eq!(
            q.sql,
            "INSERT INTO \"notes\" (\"created_at\", \"text\") VALUES ($1::timestamptz, $2) RETURNING \"id\""
        );
    }

    #[test]
    fn casts_mixed_integer_columns() {
        let t = TableInfo::from_schema(
            "fetches",
            &json!({"properties": {"url_id": {"type": ["string", "integer"]}, "n": {"type": "integer"}}}),
        );
        let q = insert(&t, &doc(json!({"n": 2, "url_id": "5"})));
        assert_eq!(
            q.sql,
            "INSERT INTO \"fetches\" (\"n\", \"url_id\") VALUES ($1, $2::bigint) RETURNING \"id\""
        );
    }

    #[test]
    fn qualifies_schema_tables() {
        assert_eq!(qualified_table("app.urls"), "\"app\".\"urls\"");
        assert_eq!(delete(&TableInfo::bare("t"), 1).sql, "DELETE FROM \"t\" WHERE \"id\" = $1");
    }
}
