/// Session Manager
///
/// Orchestrates registration, login, refresh-token rotation and logout on top
/// of the account store, the password hasher and the token issuer.
///
/// Each account holds at most one live refresh token (stored as a digest).
/// Login overwrites it, refresh swaps it with a compare-and-set, logout clears
/// it. A refresh token that is not the stored one is rejected.

use std::sync::Arc;
use uuid::Uuid;

use crate::account::{NewAccount, PublicAccount};
use crate::auth::{
    digest_refresh_token, hash_password, matches_stored, verify_password, AccountIdentity,
    TokenIssuer, TokenPair,
};
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::AccountStore;
use crate::validators::{is_valid_email, is_valid_fullname, is_valid_username, non_blank};

/// Raw registration input; every field may be missing
#[derive(Default, Clone, Copy)]
pub struct Registration<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub fullname: Option<&'a str>,
    pub password: Option<&'a str>,
    pub avatar: Option<&'a str>,
    pub cover_image: Option<&'a str>,
}

/// Raw login input; at least one identifier is required
#[derive(Default, Clone, Copy)]
pub struct Credentials<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// Result of a successful login or refresh
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub account: PublicAccount,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn AccountStore>,
    tokens: TokenIssuer,
}

impl SessionManager {
    pub fn new(store: Arc<dyn AccountStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Create a new account
    ///
    /// # Errors
    /// - `Validation`: a required field is blank or malformed, or the avatar is missing
    /// - `Conflict`: username or email already taken
    pub async fn register(&self, registration: Registration<'_>) -> Result<PublicAccount, AppError> {
        let password = registration.password.filter(|p| !p.trim().is_empty());
        let (Some(username), Some(email), Some(fullname), Some(password)) = (
            non_blank(registration.username),
            non_blank(registration.email),
            non_blank(registration.fullname),
            password,
        ) else {
            return Err(ValidationError::RequiredFields.into());
        };

        let username = is_valid_username(username)?;
        let email = is_valid_email(email)?;
        let fullname = is_valid_fullname(fullname)?;

        if self
            .store
            .find_by_username_or_email(Some(&username), Some(&email))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let avatar = non_blank(registration.avatar).ok_or(ValidationError::MissingAvatar)?;
        let cover_image = non_blank(registration.cover_image).map(str::to_owned);

        let password_hash = hash_password(password).await?;

        let account = self
            .store
            .create(NewAccount {
                username,
                email,
                fullname,
                password_hash,
                avatar: avatar.to_owned(),
                cover_image,
            })
            .await?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(PublicAccount::from(&account))
    }

    /// Verify credentials and start a new session
    ///
    /// Any previous session of the account ends: its refresh token is
    /// overwritten.
    ///
    /// # Errors
    /// - `Validation`: no identifier or no password supplied
    /// - `NotFound`: no account matches (checked before the password)
    /// - `Auth`: wrong password
    pub async fn login(&self, credentials: Credentials<'_>) -> Result<AuthenticatedSession, AppError> {
        let username = non_blank(credentials.username).map(str::to_lowercase);
        let email = non_blank(credentials.email).map(str::to_lowercase);
        if username.is_none() && email.is_none() {
            return Err(ValidationError::MissingIdentifier.into());
        }
        let password = credentials
            .password
            .filter(|p| !p.is_empty())
            .ok_or(ValidationError::EmptyField("password"))?;

        let account = self
            .store
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if !verify_password(password, &account.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.tokens.issue_pair(&AccountIdentity::from(&account))?;
        self.store
            .update_refresh_token(account.id, Some(&tokens.refresh_token.digest()))
            .await?;

        tracing::info!(account_id = %account.id, "Account logged in");
        Ok(AuthenticatedSession {
            account: PublicAccount::from(&account),
            tokens,
        })
    }

    /// Exchange the current refresh token for a new pair (rotation)
    ///
    /// # Errors
    /// - `Auth`: token missing, invalid, expired, or not the stored one
    /// - `NotFound`: the token's account no longer exists
    pub async fn refresh(&self, presented: Option<&str>) -> Result<AuthenticatedSession, AppError> {
        let presented = non_blank(presented).ok_or(AuthError::MissingToken)?;
        let claims = self.tokens.verify_refresh_token(presented)?;
        let account_id = claims.account_id()?;

        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if !matches_stored(presented, account.refresh_token_hash.as_deref()) {
            tracing::warn!(account_id = %account_id, "Stale refresh token presented");
            return Err(AuthError::TokenReused.into());
        }

        let tokens = self.tokens.issue_pair(&AccountIdentity::from(&account))?;
        let rotated = self
            .store
            .rotate_refresh_token(
                account_id,
                &digest_refresh_token(presented),
                &tokens.refresh_token.digest(),
            )
            .await?;

        if !rotated {
            tracing::warn!(account_id = %account_id, "Concurrent refresh lost the rotation");
            return Err(AuthError::TokenReused.into());
        }

        tracing::info!(account_id = %account_id, "Refresh token rotated");
        Ok(AuthenticatedSession {
            account: PublicAccount::from(&account),
            tokens,
        })
    }

    /// End the account's session; idempotent
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AppError> {
        self.store.update_refresh_token(account_id, None).await?;
        tracing::info!(account_id = %account_id, "Account logged out");
        Ok(())
    }

    pub async fn current_account(&self, account_id: Uuid) -> Result<PublicAccount, AppError> {
        self.store
            .find_by_id(account_id)
            .await?
            .map(|account| PublicAccount::from(&account))
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{JwtSettings, TokenExpiry};
    use crate::store::InMemoryAccountStore;

    fn manager() -> (SessionManager, Arc<InMemoryAccountStore>) {
        let store = Arc::new(InMemoryAccountStore::new());
        let settings = JwtSettings {
            access_token_secret: "test-access-secret-at-least-32-characters".to_string(),
            access_token_expiry: TokenExpiry::from_secs(900),
            refresh_token_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            refresh_token_expiry: TokenExpiry::from_secs(864_000),
            issuer: "test".to_string(),
        };
        (
            SessionManager::new(store.clone(), TokenIssuer::new(&settings)),
            store,
        )
    }

    fn alice() -> Registration<'static> {
        Registration {
            username: Some("alice"),
            email: Some("a@x.com"),
            fullname: Some("Alice A"),
            password: Some("Secr3t!"),
            avatar: Some("a.png"),
            cover_image: None,
        }
    }

    fn alice_login() -> Credentials<'static> {
        Credentials {
            username: Some("alice"),
            email: None,
            password: Some("Secr3t!"),
        }
    }

    #[tokio::test]
    async fn register_stores_hash_not_plaintext() {
        let (manager, store) = manager();
        let account = manager.register(alice()).await.unwrap();

        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "a@x.com");
        assert_eq!(account.avatar, "a.png");

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "Secr3t!");
        assert!(!stored.password_hash.is_empty());
        assert!(stored.refresh_token_hash.is_none());
        assert!(verify_password("Secr3t!", &stored.password_hash).await.unwrap());
        assert!(!verify_password("Secr3t", &stored.password_hash).await.unwrap());
    }

    #[tokio::test]
    async fn register_normalizes_identifiers() {
        let (manager, _) = manager();
        let account = manager
            .register(Registration {
                username: Some("  Alice "),
                email: Some("A@X.com"),
                ..alice()
            })
            .await
            .unwrap();

        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "a@x.com");
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let (manager, _) = manager();
        let cases = [
            Registration { username: Some("  "), ..alice() },
            Registration { email: None, ..alice() },
            Registration { fullname: Some(""), ..alice() },
            Registration { password: Some("   "), ..alice() },
        ];

        for case in cases {
            let result = manager.register(case).await;
            assert!(matches!(
                result,
                Err(AppError::Validation(ValidationError::RequiredFields))
            ));
        }
    }

    #[tokio::test]
    async fn register_requires_avatar() {
        let (manager, _) = manager();
        for avatar in [None, Some(""), Some("   ")] {
            let result = manager.register(Registration { avatar, ..alice() }).await;
            assert!(matches!(
                result,
                Err(AppError::Validation(ValidationError::MissingAvatar))
            ));
        }
    }

    #[tokio::test]
    async fn register_keeps_cover_image() {
        let (manager, _) = manager();
        let account = manager
            .register(Registration { cover_image: Some("cover.png"), ..alice() })
            .await
            .unwrap();

        assert_eq!(account.cover_image.as_deref(), Some("cover.png"));
    }

    #[tokio::test]
    async fn register_twice_is_a_conflict_regardless_of_case() {
        let (manager, _) = manager();
        manager.register(alice()).await.unwrap();

        let same_name = manager
            .register(Registration {
                username: Some("ALICE"),
                email: Some("other@x.com"),
                ..alice()
            })
            .await;
        assert!(matches!(same_name, Err(AppError::Conflict(_))));

        let same_email = manager
            .register(Registration {
                username: Some("bob"),
                email: Some("A@x.COM"),
                ..alice()
            })
            .await;
        assert!(matches!(same_email, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn login_returns_distinct_tokens_and_persists_refresh() {
        let (manager, store) = manager();
        manager.register(alice()).await.unwrap();

        let session = manager.login(alice_login()).await.unwrap();
        let access = session.tokens.access_token.as_str();
        let refresh = session.tokens.refresh_token.as_str();

        assert!(!access.is_empty());
        assert!(!refresh.is_empty());
        assert_ne!(access, refresh);
        assert_eq!(session.account.username, "alice");

        let stored = store.find_by_id(session.account.id).await.unwrap().unwrap();
        assert_eq!(
            stored.refresh_token_hash,
            Some(session.tokens.refresh_token.digest())
        );
    }

    #[tokio::test]
    async fn login_accepts_email_in_any_case() {
        let (manager, _) = manager();
        manager.register(alice()).await.unwrap();

        let session = manager
            .login(Credentials {
                username: None,
                email: Some("A@X.COM"),
                password: Some("Secr3t!"),
            })
            .await;
        assert!(session.is_ok());
    }

    #[tokio::test]
    async fn login_requires_an_identifier() {
        let (manager, _) = manager();
        let result = manager
            .login(Credentials {
                username: Some(" "),
                email: None,
                password: Some("Secr3t!"),
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::MissingIdentifier))
        ));
    }

    #[tokio::test]
    async fn login_unknown_user_is_not_found() {
        let (manager, _) = manager();
        manager.register(alice()).await.unwrap();

        let result = manager
            .login(Credentials { username: Some("mallory"), ..alice_login() })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn login_wrong_password_is_unauthorized() {
        let (manager, store) = manager();
        let account = manager.register(alice()).await.unwrap();

        let result = manager
            .login(Credentials { password: Some("wrong"), ..alice_login() })
            .await;
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn password_sharing_the_first_72_bytes_cannot_log_in() {
        let (manager, _) = manager();
        let password = "p".repeat(72);
        let longer = format!("{}CORRECT-SUFFIX", password);

        let result = manager
            .register(Registration { password: Some(&longer), ..alice() })
            .await;
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::TooLong("password", 72)))
        ));

        manager
            .register(Registration { password: Some(&password), ..alice() })
            .await
            .unwrap();

        let impostor = format!("{}attacker", password);
        let result = manager
            .login(Credentials { password: Some(&impostor), ..alice_login() })
            .await;
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));

        assert!(manager
            .login(Credentials { password: Some(&password), ..alice_login() })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn second_login_ends_the_first_session() {
        let (manager, _) = manager();
        manager.register(alice()).await.unwrap();

        let first = manager.login(alice_login()).await.unwrap();
        let second = manager.login(alice_login()).await.unwrap();

        let stale = manager
            .refresh(Some(first.tokens.refresh_token.as_str()))
            .await;
        assert!(matches!(stale, Err(AppError::Auth(AuthError::TokenReused))));

        assert!(manager
            .refresh(Some(second.tokens.refresh_token.as_str()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn refresh_rotates_and_detects_reuse() {
        let (manager, store) = manager();
        manager.register(alice()).await.unwrap();
        let login = manager.login(alice_login()).await.unwrap();
        let r1 = login.tokens.refresh_token.as_str().to_owned();

        let rotated = manager.refresh(Some(&r1)).await.unwrap();
        let r2 = rotated.tokens.refresh_token.as_str().to_owned();
        assert_ne!(r1, r2);

        let stored = store.find_by_id(login.account.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash, Some(digest_refresh_token(&r2)));

        let reuse = manager.refresh(Some(&r1)).await;
        assert!(matches!(reuse, Err(AppError::Auth(AuthError::TokenReused))));

        let next = manager.refresh(Some(&r2)).await.unwrap();
        assert_ne!(next.tokens.refresh_token.as_str(), r2);
    }

    #[tokio::test]
    async fn refresh_rejects_missing_and_invalid_tokens() {
        let (manager, _) = manager();

        assert!(matches!(
            manager.refresh(None).await,
            Err(AppError::Auth(AuthError::MissingToken))
        ));
        assert!(matches!(
            manager.refresh(Some("  ")).await,
            Err(AppError::Auth(AuthError::MissingToken))
        ));
        assert!(matches!(
            manager.refresh(Some("not.a.token")).await,
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let (manager, _) = manager();
        manager.register(alice()).await.unwrap();
        let login = manager.login(alice_login()).await.unwrap();

        let result = manager
            .refresh(Some(login.tokens.access_token.as_str()))
            .await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::TokenInvalid))));
    }

    #[tokio::test]
    async fn refresh_for_unknown_account_is_not_found() {
        let (manager, _) = manager();
        let ghost = AccountIdentity {
            id: Uuid::new_v4(),
            email: "ghost@x.com".to_string(),
            username: "ghost".to_string(),
            fullname: "Ghost".to_string(),
        };
        let token = manager.tokens().issue_refresh_token(&ghost).unwrap();

        let result = manager.refresh(Some(token.as_str())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn logout_invalidates_refresh_token() {
        let (manager, _) = manager();
        manager.register(alice()).await.unwrap();
        let login = manager.login(alice_login()).await.unwrap();

        manager.logout(login.account.id).await.unwrap();
        manager.logout(login.account.id).await.unwrap();

        let result = manager
            .refresh(Some(login.tokens.refresh_token.as_str()))
            .await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn concurrent_refreshes_with_same_token_have_one_winner() {
        let (manager, _) = manager();
        manager.register(alice()).await.unwrap();
        let login = manager.login(alice_login()).await.unwrap();
        let token = login.tokens.refresh_token.as_str();

        let (first, second) = tokio::join!(
            manager.refresh(Some(token)),
            manager.refresh(Some(token))
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
    }

    #[tokio::test]
    async fn current_account_resolves_public_view() {
        let (manager, _) = manager();
        let registered = manager.register(alice()).await.unwrap();

        let current = manager.current_account(registered.id).await.unwrap();
        assert_eq!(current, registered);

        assert!(matches!(
            manager.current_account(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
