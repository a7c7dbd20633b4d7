/// Authentication Routes
///
/// HTTP surface of the session manager: registration, login, token refresh,
/// logout and the current account. Login and refresh hand the token pair out
/// twice: as HttpOnly cookies and in the JSON body for non-browser clients.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::account::PublicAccount;
use crate::auth::{AccessToken, Claims, RefreshToken};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::session::{AuthenticatedSession, Credentials, Registration, SessionManager};

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Cookie attributes shared by every session cookie
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    fn session_cookie(&self, name: &'static str, value: &str, max_age: chrono::Duration) -> Cookie<'static> {
        Cookie::build(name, value.to_owned())
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(CookieDuration::seconds(max_age.num_seconds()))
            .finish()
    }

    fn removal_cookie(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = Cookie::build(name, "")
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .finish();
        cookie.make_removal();
        cookie
    }
}

/// Account registration request; avatar and cover image are asset references
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub fullname: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// Login with username or email
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Refresh token for clients that do not send cookies
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: PublicAccount,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

/// POST /auth/register
///
/// # Errors
/// - 400: blank or malformed field, missing avatar
/// - 409: username or email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let account = sessions
        .register(Registration {
            username: form.username.as_deref(),
            email: form.email.as_deref(),
            fullname: form.fullname.as_deref(),
            password: form.password.as_deref(),
            avatar: form.avatar.as_deref(),
            cover_image: form.cover_image.as_deref(),
        })
        .await?;

    Ok(ApiResponse::created(account, "User registered successfully").into_response())
}

/// POST /auth/login
///
/// # Errors
/// - 400: no username/email or no password
/// - 404: no such account
/// - 401: wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    let session = sessions
        .login(Credentials {
            username: form.username.as_deref(),
            email: form.email.as_deref(),
            password: form.password.as_deref(),
        })
        .await?;

    Ok(session_response(session, &sessions, &cookies, "User logged in successfully"))
}

/// POST /auth/refresh
///
/// Reads the refresh token from the `refreshToken` cookie, falling back to the
/// JSON body. The response carries the pair that was just persisted.
///
/// # Errors
/// - 401: missing, invalid, expired or already rotated refresh token
/// - 404: the token's account no longer exists
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token));

    let session = sessions.refresh(presented.as_deref()).await?;

    Ok(session_response(session, &sessions, &cookies, "Access token refreshed"))
}

/// POST /auth/logout
///
/// **Requires a valid access token**; clears the stored refresh token and
/// both cookies.
pub async fn logout(
    claims: web::ReqData<Claims>,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    let account_id = claims.account_id()?;
    sessions.logout(account_id).await?;

    let envelope = ApiResponse::ok(serde_json::json!({}), "User logged out");
    let mut builder = envelope.builder();
    builder
        .cookie(cookies.removal_cookie(ACCESS_COOKIE_NAME))
        .cookie(cookies.removal_cookie(REFRESH_COOKIE_NAME));
    Ok(builder.json(envelope))
}

/// GET /auth/me
///
/// **Requires a valid access token**
pub async fn get_current_account(
    claims: web::ReqData<Claims>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let account = sessions.current_account(claims.account_id()?).await?;

    Ok(ApiResponse::ok(account, "Current user fetched successfully").into_response())
}

fn session_response(
    session: AuthenticatedSession,
    sessions: &SessionManager,
    cookies: &CookiePolicy,
    message: &str,
) -> HttpResponse {
    let AuthenticatedSession { account, tokens } = session;
    let access_cookie = cookies.session_cookie(
        ACCESS_COOKIE_NAME,
        tokens.access_token.as_str(),
        sessions.tokens().access_token_ttl(),
    );
    let refresh_cookie = cookies.session_cookie(
        REFRESH_COOKIE_NAME,
        tokens.refresh_token.as_str(),
        sessions.tokens().refresh_token_ttl(),
    );

    let envelope = ApiResponse::ok(
        SessionData {
            user: account,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
        message,
    );
    let mut builder = envelope.builder();
    builder.cookie(access_cookie).cookie(refresh_cookie);
    builder.json(envelope)
}
