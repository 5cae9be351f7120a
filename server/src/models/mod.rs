//! The application's models. `PRIORITY` lists foreign-key targets before their dependents.

mod articles;
mod decorators_example;
mod fetches;
mod urls;

use crudgen_sdk::ModelDefinition;

pub const PRIORITY: &[&str] = &["urls", "fetches"];

pub fn all() -> Vec<ModelDefinition> {
    vec![
        urls::definition(),
        fetches::definition(),
        articles::definition(),
        decorators_example::definition(),
    ]
}
