use bcrypt::{hash, verify};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::ids::RecordId;

/// JWT claims. `id` is the user's record id.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub id: String,
    pub iat: usize,
    pub exp: usize,
    /// Random nonce so two tokens minted in the same second still differ.
    pub jti: String,
}

/// An access/refresh token pair, as stored on the user and handed to the client.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

pub fn create_jwt(
    user_id: &RecordId,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize;

    let claims = Claims {
        id: user_id.to_string(),
        iat: now,
        exp: now + ttl.as_secs() as usize,
        jti: uuid::Uuid::new_v4().simple().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(token_data.claims)
}

/// Mints a fresh access token and refresh token, each signed with its own secret.
pub fn issue_tokens(
    user_id: &RecordId,
    config: &Config,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        token: create_jwt(user_id, &config.token_secret, config.token_ttl)?,
        refresh_token: create_jwt(user_id, &config.refresh_secret, config.refresh_ttl)?,
    })
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
