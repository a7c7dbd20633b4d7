/// Account store adapter
///
/// Every method is an atomic operation on a single account record.
/// Implementations must make `rotate_refresh_token` a true compare-and-set:
/// two concurrent rotations presenting the same token can never both win.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::account::{Account, NewAccount};
use crate::error::StoreError;

pub use memory::InMemoryAccountStore;
pub use postgres::PgAccountStore;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find the account whose username equals `username` or whose email
    /// equals `email`. `None` arguments never match.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Persist a new account
    ///
    /// # Errors
    /// `StoreError::UniqueViolation` when the username or email is taken
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Overwrite (or clear) the stored refresh token digest unconditionally.
    /// Unknown ids are not an error.
    async fn update_refresh_token(
        &self,
        id: Uuid,
        token_hash: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Replace the stored digest with `next` only if it currently equals
    /// `expected`. Returns whether the swap happened.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError>;
}
