//! Sign in with Apple.

use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::dto::{Dto, Field, Rule};
use crate::error::{Result, ServerError};
use crate::router::{Valid, ValidJson};
use crate::token::{self, Claims};
use crate::user::UserService;

const REFRESH_TOKEN_LENGTH: usize = 64;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleClientAuthBody {
    pub identity_token: String,
}

impl Dto for AppleClientAuthBody {
    const FIELDS: &'static [Field] = &[Field::required(
        "identityToken",
        &[Rule::IsString, Rule::Length { min: 1, max: 4096 }],
    )];
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleClientAuthResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl Dto for AppleClientAuthResponse {
    const FIELDS: &'static [Field] = &[
        Field::required("accessToken", &[Rule::IsString, Rule::Length { min: 1, max: 4096 }]),
        Field::required(
            "refreshToken",
            &[
                Rule::IsString,
                Rule::Length {
                    min: REFRESH_TOKEN_LENGTH,
                    max: REFRESH_TOKEN_LENGTH,
                },
            ],
        ),
    ];
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleClientRevokeBody {
    pub refresh_token: String,
}

impl Dto for AppleClientRevokeBody {
    const FIELDS: &'static [Field] = &[Field::required(
        "refreshToken",
        &[Rule::IsString, Rule::Length { min: REFRESH_TOKEN_LENGTH, max: REFRESH_TOKEN_LENGTH }],
    )];
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppleClientRevokeResponse {
    pub revoked: bool,
}

impl Dto for AppleClientRevokeResponse {
    const FIELDS: &'static [Field] = &[Field::required("revoked", &[Rule::IsBool])];
}

/// Sign in or sign up with an Apple identity token.
pub async fn auth(
    State(state): State<AppState>,
    Valid(body): Valid<AppleClientAuthBody>,
) -> Result<ValidJson<AppleClientAuthResponse>> {
    let identity = state
        .apple
        .verify(&body.identity_token)
        .await
        .inspect_err(|err| tracing::warn!(error = %err, "apple identity token rejected"))?;

    let users = UserService::new(state.db.clone());
    let user = users.sign_in_with_apple(&identity).await;

    let access_token = state.token.create(&user.email)?;
    let refresh_token = token::refresh_token();
    users.store_refresh_token(&refresh_token, &user.email).await;

    Ok(ValidJson::created(AppleClientAuthResponse {
        access_token,
        refresh_token,
    }))
}

/// Revoke an Apple account.
///
/// Answers `501 Not Implemented` once the body is valid.
pub async fn revoke(
    Extension(claims): Extension<Claims>,
    Valid(_body): Valid<AppleClientRevokeBody>,
) -> Result<ValidJson<AppleClientRevokeResponse>> {
    tracing::warn!(user = %claims.sub, "apple revocation requested");
    Err(ServerError::NotImplemented)
}
