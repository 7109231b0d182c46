//! Public page identifying the instance.

use std::env::var;
use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::dto::{Dto, Field, Rule};
use crate::router::ValidJson;

#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    version: String,
    name: String,
    favicon: Option<String>,
}

impl Dto for Status {
    const FIELDS: &'static [Field] = &[
        Field::required("version", &[Rule::IsString, Rule::Length { min: 1, max: 32 }]),
        Field::required("name", &[Rule::IsString, Rule::Length { min: 1, max: 100 }]),
        Field::optional("favicon", &[Rule::IsString]),
    ];
}

/// Public server status.
///
/// `SERVER_NAME` and `SERVER_ICON` override the configured name and favicon.
pub async fn status(State(config): State<Arc<Configuration>>) -> ValidJson<Status> {
    let name = var("SERVER_NAME")
        .ok()
        .or_else(|| (!config.name.is_empty()).then(|| config.name.clone()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").into());

    ValidJson::ok(Status {
        version: env!("CARGO_PKG_VERSION").into(),
        name,
        favicon: var("SERVER_ICON").ok().or_else(|| config.favicon.clone()),
    })
}
