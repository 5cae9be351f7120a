//! crudgen SDK: REST CRUD APIs generated from JSON-Schema model definitions.

pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod registry;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod swagger;

pub use config::{
    definitions_from_str, load_definitions, DatabaseKind, ModelDefinition, ParamLocation, ParameterSpec, Settings,
};
pub use error::{AppError, ConfigError, StoreError};
pub use handlers::router;
pub use registry::{ModelRegistry, RegistryBuilder, ResolvedModel};
pub use response::{error_body, ApiRequest, ApiResponse};
pub use routes::Route;
pub use service::{
    Handler, Middleware, ModelApi, Next, OperationKind, Pipeline, ResponseHeaders, ResponseTime,
};
pub use state::AppState;
pub use store::{
    ensure_database_exists, CollectionSpec, Document, MemoryStore, MongoStore, PgStore, SortKey, Storage,
};
pub use swagger::generate_swagger;
