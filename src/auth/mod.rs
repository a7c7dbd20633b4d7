/// Authentication module
///
/// Handles JWT issuing/verification, password hashing,
/// and the stored form of refresh tokens.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::{AccountIdentity, Claims};
pub use jwt::{verify_token, AccessToken, RefreshToken, TokenIssuer, TokenPair};
pub use password::{hash_password, verify_password};
pub use refresh_token::{digest_refresh_token, matches_stored};
