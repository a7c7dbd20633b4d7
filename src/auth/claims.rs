/// JWT Claims structure
///
/// Access and refresh tokens carry the same claims shape; only the signing
/// secret and lifetime tell them apart.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Account;
use crate::error::{AppError, AuthError};

/// Identity fields embedded in every token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub fullname: String,
}

impl From<&Account> for AccountIdentity {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
            fullname: account.fullname.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub email: String,
    pub username: String,
    pub fullname: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    /// Unique token id; keeps two tokens minted in the same second apart
    pub jti: String,
}

impl Claims {
    /// # Errors
    /// `Internal` when `issued_at + ttl` falls outside the representable range
    pub fn new(
        identity: &AccountIdentity,
        issued_at: DateTime<Utc>,
        ttl: Duration,
        issuer: &str,
        jti: Uuid,
    ) -> Result<Self, AppError> {
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal(format!("Token lifetime {} is out of range", ttl)))?;

        Ok(Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            username: identity.username.clone(),
            fullname: identity.fullname.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: issuer.to_string(),
            jti: jti.to_string(),
        })
    }

    /// Extract account ID from claims
    ///
    /// # Errors
    /// A subject that is not a UUID means the token was not minted here
    pub fn account_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }

    pub fn identity(&self) -> Result<AccountIdentity, AuthError> {
        Ok(AccountIdentity {
            id: self.account_id()?,
            email: self.email.clone(),
            username: self.username.clone(),
            fullname: self.fullname.clone(),
        })
    }
}
