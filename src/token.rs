//! Manage json web tokens.

use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

const DEFAULT_AUDIENCE: &str = "macro";
/// Access token lifetime, in seconds.
pub const EXPIRATION_TIME: u64 = 60 * 60; // 1 hour.
const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("system clock is before unix epoch")]
    Clock(#[from] SystemTimeError),
    #[error("no public key configured to decode tokens")]
    MissingPublicKey,
}

type Result<T> = std::result::Result<T, TokenError>;

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User email.
    pub sub: String,
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    key_id: Option<String>,
    public_key: Option<DecodingKey>,
    private_key: EncodingKey,
    name: String,
    audience: String,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance from P-256 PEM keys.
    pub fn new(
        name: &str,
        key_id: Option<String>,
        public_key_pem: &str,
        private_key_pem: &str,
    ) -> Result<Self> {
        let public_key = if public_key_pem.is_empty() {
            None
        } else {
            Some(DecodingKey::from_ec_pem(public_key_pem.as_bytes())?)
        };
        let private_key = EncodingKey::from_ec_pem(private_key_pem.as_bytes())?;

        Ok(Self {
            algorithm: Algorithm::ES256,
            key_id,
            public_key,
            private_key,
            name: name.to_owned(),
            audience: DEFAULT_AUDIENCE.to_string(),
        })
    }

    /// Set `audience` field on JWT.
    pub fn audience(&mut self, audience: &str) {
        self.audience = audience.to_owned();
    }

    /// Create a new access token for `subject`.
    pub fn create(&self, subject: &str) -> Result<String> {
        let time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let mut header = Header::new(self.algorithm);
        header.kid = self.key_id.clone();
        let claims = Claims {
            aud: self.audience.clone(),
            exp: time + EXPIRATION_TIME,
            iat: time,
            iss: self.name.clone(),
            sub: subject.to_owned(),
        };

        Ok(encode(&header, &claims, &self.private_key)?)
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let Some(public_key) = &self.public_key else {
            return Err(TokenError::MissingPublicKey);
        };

        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.name]);
        Ok(decode::<Claims>(token, public_key, &validation)?.claims)
    }
}

/// Generate an opaque refresh token.
pub fn refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
