/// Account records
///
/// `Account` is the stored record and is never serialized. `PublicAccount`
/// is the only outward view; it has no password or refresh-token fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    /// SHA-256 digest of the single live refresh token, if any
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated, normalized input for `AccountStore::create`
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub avatar: String,
    pub cover_image: Option<String>,
}

impl NewAccount {
    pub fn into_account(self, now: DateTime<Utc>) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            fullname: self.fullname,
            password_hash: self.password_hash,
            avatar: self.avatar,
            cover_image: self.cover_image,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for PublicAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            fullname: account.fullname.clone(),
            avatar: account.avatar.clone(),
            cover_image: account.cover_image.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_account_hides_secrets() {
        let mut account = NewAccount {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            fullname: "Alice A".to_string(),
            password_hash: "$2b$10$hash".to_string(),
            avatar: "a.png".to_string(),
            cover_image: None,
        }
        .into_account(Utc::now());
        account.refresh_token_hash = Some("digest".to_string());

        let json = serde_json::to_value(PublicAccount::from(&account)).unwrap();
        let object = json.as_object().unwrap();

        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("passwordHash"));
        assert!(!object.contains_key("refreshToken"));
        assert!(!object.contains_key("refreshTokenHash"));
        assert_eq!(object["username"], "alice");
        assert_eq!(object["avatar"], "a.png");
        assert!(object.contains_key("coverImage"));
    }
}
