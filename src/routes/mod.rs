//! Route generation and the common service routes.

pub mod common;
pub mod model;
pub mod params;

pub use common::common_routes;
pub use model::{collection_path, default_parameters, get_model_routes, item_path, Route};
pub use params::{coerce_value, coerce_values, parameters_schema, ValidatedHandler};
