//! Process settings from environment variables. The server loads `.env` before reading them.

use crate::error::ConfigError;
use crate::service::DEFAULT_MAX_LIMIT;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseKind {
    /// In-process document store. Data lives as long as the process.
    Memory,
    Mongo,
    Postgres,
}

impl DatabaseKind {
    /// Backend implied by a connection string's scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split("://").next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "mongodb" | "mongodb+srv" => Some(DatabaseKind::Mongo),
            "postgres" | "postgresql" => Some(DatabaseKind::Postgres),
            _ => None,
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            DatabaseKind::Memory => "",
            DatabaseKind::Mongo => "mongodb://localhost:27017/crudgen",
            DatabaseKind::Postgres => "postgres://localhost/crudgen",
        }
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Ok(DatabaseKind::Memory),
            "mongo" | "mongodb" => Ok(DatabaseKind::Mongo),
            "pg" | "postgres" | "postgresql" => Ok(DatabaseKind::Postgres),
            other => Err(format!("unknown database '{}' (expected memory, mongo or pg)", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database: DatabaseKind,
    /// Connection string; the backend's default when empty.
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    pub max_list_limit: u32,
    pub body_limit_bytes: usize,
    /// Optional JSON file with extra model definitions.
    pub models_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database: DatabaseKind::Memory,
            database_url: String::new(),
            max_connections: 5,
            bind_addr: "0.0.0.0:5001".into(),
            max_list_limit: DEFAULT_MAX_LIMIT,
            body_limit_bytes: 1024 * 1024,
            models_file: None,
        }
    }
}

fn parse<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidSetting {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from a key lookup. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut s = Settings::default();
        if let Some(v) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            s.database_url = v.trim().to_string();
        }
        s.database = match lookup("DATABASE") {
            Some(v) => parse("DATABASE", &v)?,
            None => DatabaseKind::from_url(&s.database_url).unwrap_or(DatabaseKind::Memory),
        };
        if s.database_url.is_empty() {
            s.database_url = s.database.default_url().to_string();
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            s.max_connections = parse("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            s.bind_addr = v;
        }
        if let Some(v) = lookup("MAX_LIST_LIMIT") {
            s.max_list_limit = parse("MAX_LIST_LIMIT", &v)?;
        }
        if let Some(v) = lookup("BODY_LIMIT_BYTES") {
            s.body_limit_bytes = parse("BODY_LIMIT_BYTES", &v)?;
        }
        s.models_file = lookup("MODELS_FILE").filter(|v| !v.trim().is_empty());
        Ok(s)
    }
}
