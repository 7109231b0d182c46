//! Sign in with Apple identity token verification.

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;

use crate::config::Apple;

const APPLE_ISSUER: &str = "https://appleid.apple.com";

#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("no Apple key matches `kid` {0:?}")]
    UnknownKey(Option<String>),
    #[error("identity token carries no email")]
    MissingEmail,
}

/// Identity asserted by a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleIdentity {
    /// Stable Apple user identifier.
    pub subject: String,
    pub email: String,
}

/// Port verifying provider identity tokens.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, identity_token: &str) -> Result<AppleIdentity, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
    email: Option<String>,
}

/// Verify RS256 identity tokens against configured Apple public keys.
pub struct AppleKeyVerifier {
    client_id: String,
    keys: HashMap<String, DecodingKey>,
}

impl AppleKeyVerifier {
    pub fn new(config: &Apple) -> Result<Self, VerifyError> {
        let keys = config
            .keys
            .iter()
            .map(|key| -> Result<_, VerifyError> {
                Ok((key.kid.clone(), DecodingKey::from_rsa_components(&key.n, &key.e)?))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        tracing::info!(keys = keys.len(), client_id = %config.client_id, "apple verifier ready");

        Ok(Self {
            client_id: config.client_id.clone(),
            keys,
        })
    }
}

#[async_trait]
impl IdentityVerifier for AppleKeyVerifier {
    async fn verify(&self, identity_token: &str) -> Result<AppleIdentity, VerifyError> {
        let header = decode_header(identity_token)?;
        let key = header
            .kid
            .as_ref()
            .and_then(|kid| self.keys.get(kid))
            .ok_or(VerifyError::UnknownKey(header.kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[APPLE_ISSUER]);

        let claims = decode::<IdentityClaims>(identity_token, key, &validation)?.claims;
        let email = claims.email.ok_or(VerifyError::MissingEmail)?;

        Ok(AppleIdentity {
            subject: claims.sub,
            email: email.to_lowercase(),
        })
    }
}
