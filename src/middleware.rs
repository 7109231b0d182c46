//! Middlewares for routes.

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{Result, ServerError};
use crate::router::{Access, Routes};
use crate::token::{Claims, TokenManager};

const BEARER: &str = "Bearer ";

/// State of the authentication gate.
#[derive(Clone)]
pub struct Gate {
    pub token: TokenManager,
    pub routes: Arc<Routes>,
}

/// Let public routes through, require a valid bearer token on everything else.
///
/// Decoded [`Claims`] are put into request extensions.
pub async fn gate(State(gate): State<Gate>, mut req: Request, next: Next) -> Result<Response> {
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };

    if gate.routes.access(req.method(), &path) == Access::Public {
        return Ok(next.run(req).await);
    }

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .ok_or(ServerError::Unauthorized)?;

    let claims: Claims = gate.token.decode(token).map_err(|err| {
        tracing::debug!(error = %err, %path, "bearer token rejected");
        ServerError::Unauthorized
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
