//! Operation pipeline and the generic model API built on it.

mod api;
mod decorators;
mod operation;
mod pipeline;
mod validation;

pub use api::{
    now_timestamp, remove_none, response_schema, Decorators, ModelApi, DEFAULT_LIMIT, DEFAULT_MAX_LIMIT,
};
pub use decorators::{ResponseHeaders, ResponseTime, RESPONSE_TIME_HEADER};
pub use operation::OperationKind;
pub use pipeline::{Handler, Middleware, Next, Pipeline};
pub use validation::{BodyCheck, ValidateBody, ValidateWith};
