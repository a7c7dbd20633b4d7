/// Stored form of refresh tokens
///
/// The account store only ever sees the SHA-256 digest of a refresh token.
/// Comparing digests is equivalent to comparing the tokens themselves.

use sha2::{Digest, Sha256};

use crate::auth::jwt::RefreshToken;

/// Hex-encoded SHA-256 digest of a refresh token
pub fn digest_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl RefreshToken {
    pub fn digest(&self) -> String {
        digest_refresh_token(self.as_str())
    }
}

/// Whether a presented token is the one currently stored for the account
pub fn matches_stored(presented: &str, stored_digest: Option<&str>) -> bool {
    match stored_digest {
        Some(stored) => digest_refresh_token(presented) == stored,
        None => false,
    }
}
