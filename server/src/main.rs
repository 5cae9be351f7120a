//! crudgen server: declares the application's models and serves their generated API.
//!
//! Run from repo root: `cargo run -p crudgen-server`

mod models;

use crudgen_sdk::{
    ensure_database_exists, generate_swagger, load_definitions, router, AppState, DatabaseKind, MemoryStore,
    ModelRegistry, MongoStore, PgStore, Settings, Storage,
};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn open_store(settings: &Settings) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    let store: Arc<dyn Storage> = match settings.database {
        DatabaseKind::Memory => Arc::new(MemoryStore::new()),
        DatabaseKind::Mongo => {
            Arc::new(MongoStore::connect(&settings.database_url, settings.max_connections).await?)
        }
        DatabaseKind::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            Arc::new(PgStore::connect(&settings.database_url, settings.max_connections).await?)
        }
    };
    tracing::info!(database = ?settings.database, "storage opened");
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudgen_sdk=info,crudgen_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let store = open_store(&settings).await?;

    let mut definitions = models::all();
    if let Some(path) = &settings.models_file {
        definitions.extend(load_definitions(path).await?);
    }
    let registry = ModelRegistry::builder()
        .priority(models::PRIORITY)
        .models(definitions)
        .max_list_limit(settings.max_list_limit)
        .build(store)?;
    let ready = registry.create_schema().await;
    tracing::info!(models = registry.models().len(), ready, "models registered");

    let swagger = generate_swagger(&registry.routes(), env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let app = router(AppState::new(registry, swagger), settings.body_limit_bytes);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
