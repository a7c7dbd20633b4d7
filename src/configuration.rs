use config::ConfigError;
use std::fmt;

use crate::error::ConfigError as SettingsError;

/// Environment variables that map straight onto the token settings
const TOKEN_ENV_OVERRIDES: [(&str, &str); 4] = [
    ("ACCESS_TOKEN_SECRET", "jwt.access_token_secret"),
    ("ACCESS_TOKEN_EXPIRY", "jwt.access_token_expiry"),
    ("REFRESH_TOKEN_SECRET", "jwt.refresh_token_secret"),
    ("REFRESH_TOKEN_EXPIRY", "jwt.refresh_token_expiry"),
];

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    /// Absent means the in-memory account store is used
    pub database: Option<DatabaseSettings>,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Mark session cookies `Secure`; only disable for plain-http development
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server-level connection, used to create throwaway test databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token lifetime, written as plain seconds or with an `s`/`m`/`h`/`d` suffix
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct TokenExpiry(i64);

impl TokenExpiry {
    pub fn from_secs(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.0).unwrap_or_else(chrono::Duration::max_value)
    }

    fn is_in_range(&self) -> bool {
        self.0 > 0 && self.0 <= MAX_TOKEN_EXPIRY_SECS
    }
}

impl TryFrom<String> for TokenExpiry {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        parse_expiry(&raw).map(TokenExpiry)
    }
}

impl fmt::Display for TokenExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Ten years; longer lifetimes overflow timestamp arithmetic long before they
/// make sense for a session.
pub const MAX_TOKEN_EXPIRY_SECS: i64 = 10 * 365 * 24 * 60 * 60;

fn parse_expiry(raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    let (digits, unit) = match trimmed.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&trimmed[..trimmed.len() - 1], c),
        _ => (trimmed, 's'),
    };

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        other => return Err(format!("unknown expiry unit '{}' in '{}'", other, raw)),
    };

    let value: i64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid expiry '{}'", raw))?;

    if value <= 0 {
        return Err(format!("expiry must be positive, got '{}'", raw));
    }

    value
        .checked_mul(multiplier)
        .filter(|secs| *secs <= MAX_TOKEN_EXPIRY_SECS)
        .ok_or_else(|| format!("expiry '{}' is out of range", raw))
}

/// JWT signing settings; each token kind has its own secret and lifetime
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub access_token_expiry: TokenExpiry,   // e.g. "15m"
    pub refresh_token_secret: String,
    pub refresh_token_expiry: TokenExpiry,  // e.g. "10d"
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_issuer() -> String {
    "session_service".to_string()
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.access_token_secret.trim().is_empty() {
            return Err(SettingsError::MissingRequired("ACCESS_TOKEN_SECRET".to_string()));
        }
        if self.refresh_token_secret.trim().is_empty() {
            return Err(SettingsError::MissingRequired("REFRESH_TOKEN_SECRET".to_string()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(SettingsError::InvalidValue(
                "access and refresh tokens must use distinct secrets".to_string(),
            ));
        }
        for (name, expiry) in [
            ("ACCESS_TOKEN_EXPIRY", &self.access_token_expiry),
            ("REFRESH_TOKEN_EXPIRY", &self.refresh_token_expiry),
        ] {
            if !expiry.is_in_range() {
                return Err(SettingsError::InvalidValue(format!(
                    "{} ({}) must be between 1s and {}s",
                    name, expiry, MAX_TOKEN_EXPIRY_SECS
                )));
            }
        }
        if self.access_token_expiry.as_secs() >= self.refresh_token_expiry.as_secs() {
            return Err(SettingsError::InvalidValue(format!(
                "access token expiry ({}) must be shorter than refresh token expiry ({})",
                self.access_token_expiry, self.refresh_token_expiry
            )));
        }
        Ok(())
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"));

    for (var, key) in TOKEN_ENV_OVERRIDES {
        if let Ok(value) = std::env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    let settings = builder.build()?.try_deserialize::<Settings>()?;
    settings
        .jwt
        .validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;

    Ok(settings)
}
