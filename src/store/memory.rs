/// Process-local account store
///
/// All records sit behind one `RwLock`; every mutation (including the
/// compare-and-set rotation) happens under a single write guard.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::account::{Account, NewAccount};
use crate::error::StoreError;
use crate::store::AccountStore;

#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        let by_username = username.and_then(|u| accounts.values().find(|a| a.username == u));
        let by_email = || email.and_then(|e| accounts.values().find(|a| a.email == e));

        Ok(by_username.or_else(by_email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;

        if accounts.values().any(|a| a.username == account.username) {
            return Err(StoreError::UniqueViolation("username"));
        }
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::UniqueViolation("email"));
        }

        let account = account.into_account(Utc::now());
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_refresh_token(
        &self,
        id: Uuid,
        token_hash: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(account) = self.accounts.write().await.get_mut(&id) {
            account.refresh_token_hash = token_hash.map(str::to_owned);
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&id) {
            Some(account) if account.refresh_token_hash.as_deref() == Some(expected) => {
                account.refresh_token_hash = Some(next.to_owned());
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
