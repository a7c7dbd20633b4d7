/// JWT Token Issuing and Verification
///
/// Access and refresh tokens are HS256 JWTs signed with two distinct secrets,
/// so holding one kind of token never lets a client forge the other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::auth::claims::{AccountIdentity, Claims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Signed short-lived credential
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessToken(String);

/// Signed long-lived credential, exchanged for a new pair on refresh
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RefreshToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Token values stay out of Debug output so they never reach the logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken(..)")
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

#[derive(Clone)]
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    fn sign(
        &self,
        identity: &AccountIdentity,
        now: DateTime<Utc>,
        jti: Uuid,
        issuer: &str,
    ) -> Result<String, AppError> {
        let claims = Claims::new(identity, now, self.ttl, issuer, jti)?;
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

/// Issues and verifies both token kinds
#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKey,
    refresh: SigningKey,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access: SigningKey::new(
                &config.access_token_secret,
                config.access_token_expiry.as_duration(),
            ),
            refresh: SigningKey::new(
                &config.refresh_token_secret,
                config.refresh_token_expiry.as_duration(),
            ),
            issuer: config.issuer.clone(),
        }
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access.ttl
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh.ttl
    }

    /// Deterministic core: the same identity, instant and `jti` always yield
    /// the same token
    pub fn issue_access_token_at(
        &self,
        identity: &AccountIdentity,
        now: DateTime<Utc>,
        jti: Uuid,
    ) -> Result<AccessToken, AppError> {
        self.access
            .sign(identity, now, jti, &self.issuer)
            .map(AccessToken)
    }

    pub fn issue_refresh_token_at(
        &self,
        identity: &AccountIdentity,
        now: DateTime<Utc>,
        jti: Uuid,
    ) -> Result<RefreshToken, AppError> {
        self.refresh
            .sign(identity, now, jti, &self.issuer)
            .map(RefreshToken)
    }

    pub fn issue_access_token(&self, identity: &AccountIdentity) -> Result<AccessToken, AppError> {
        self.issue_access_token_at(identity, Utc::now(), Uuid::new_v4())
    }

    pub fn issue_refresh_token(
        &self,
        identity: &AccountIdentity,
    ) -> Result<RefreshToken, AppError> {
        self.issue_refresh_token_at(identity, Utc::now(), Uuid::new_v4())
    }

    pub fn issue_pair(&self, identity: &AccountIdentity) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(identity)?,
            refresh_token: self.issue_refresh_token(identity)?,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode_claims(token, &self.access.decoding, &self.issuer)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode_claims(token, &self.refresh.decoding, &self.issuer)
    }
}

/// Validate a token against a raw secret and extract its claims
///
/// # Errors
/// `TokenExpired` past expiry, `TokenInvalid` for anything else
/// (bad signature, malformed token, wrong issuer)
pub fn verify_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, AuthError> {
    decode_claims(token, &DecodingKey::from_secret(secret.as_bytes()), issuer)
}

fn decode_claims(token: &str, key: &DecodingKey, issuer: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);

    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                tracing::debug!("JWT rejected: expired");
                AuthError::TokenExpired
            }
            _ => {
                tracing::debug!("JWT rejected: {}", e);
                AuthError::TokenInvalid
            }
        })
}
