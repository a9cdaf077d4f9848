use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Upper bound on token lifetime (ten years)
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Process-wide HMAC signing secret. `Debug` never prints the value.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);

impl TokenSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimUser {
    pub id: String,
}

/// Token payload: `{ user: { id }, iat, exp }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: ClaimUser,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, ttl_secs: u64) -> Self {
        let now = Utc::now();
        let ttl = Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        Self {
            user: ClaimUser { id: user_id.into() },
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

/// Identity resolved from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Bad signature, malformed input and expiry all collapse into this
    #[error("invalid token")]
    Invalid,
}

pub fn issue(user_id: &str, secret: &TokenSecret, ttl_secs: u64) -> Result<String, TokenError> {
    sign(&Claims::new(user_id, ttl_secs), secret)
}

pub fn sign(claims: &Claims, secret: &TokenSecret) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Signing("signing secret is empty".to_string()));
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key)
        .map_err(|e| TokenError::Signing(e.to_string()))
}

pub fn verify(token: &str, secret: &TokenSecret) -> Result<Identity, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Invalid);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        debug!("Token rejected: {}", e);
        TokenError::Invalid
    })?;

    Ok(Identity {
        user_id: token_data.claims.user.id,
    })
}
