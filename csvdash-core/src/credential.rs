//! Session credential decoding
//!
//! Credentials are JWTs issued by the dashboard's auth endpoint. The client
//! never holds the signing key, so decoding only reads the embedded claims:
//! - `sub`: username
//! - `role`: `admin` or `user`
//! - `exp`: expiry as a Unix timestamp
//!
//! The server re-validates the signature on every request. A token that
//! parses but whose `exp` is not strictly in the future is rejected here.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode as decode_jwt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims embedded in a session credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Role granted by the server
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Malformed credential: {0}")]
    Malformed(String),

    #[error("Credential expired at {expired_at}")]
    Expired { expired_at: u64 },
}

/// Decode a credential against the current wall-clock time
pub fn decode(token: &str) -> Result<Claims, CredentialError> {
    decode_at(token, now_secs())
}

/// Decode a credential, treating it as expired unless `exp > now`
pub fn decode_at(token: &str, now: u64) -> Result<Claims, CredentialError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    // exp is compared below without leeway
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode_jwt::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| CredentialError::Malformed(e.to_string()))?;

    let claims = data.claims;
    if claims.exp <= now {
        return Err(CredentialError::Expired {
            expired_at: claims.exp,
        });
    }

    Ok(claims)
}

/// Current Unix time in seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
