/// Password Hashing and Verification
///
/// bcrypt with a fixed cost. Both operations are CPU-bound and run on the
/// blocking thread pool so they never stall the request workers.

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};

const HASH_COST: u32 = 10;
/// bcrypt ignores every byte past the 72nd, so longer input would let two
/// different passwords share one hash.
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Hash a password using bcrypt with a fresh salt
///
/// # Errors
/// Returns error if:
/// - Password is empty or longer than 72 bytes
/// - Bcrypt hashing fails
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password").into());
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH).into());
    }

    let password = password.to_owned();
    spawn_blocking_with_tracing(move || hash(password, HASH_COST))
        .await?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
/// Input over the length cap can never have been hashed, so it never matches.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Ok(false);
    }

    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    spawn_blocking_with_tracing(move || verify(password, &password_hash))
        .await?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

async fn spawn_blocking_with_tracing<F, R>(f: F) -> Result<R, AppError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|e| AppError::Internal(format!("Password worker failed: {}", e)))
}
