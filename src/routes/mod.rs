mod auth;
mod health_check;

pub use auth::{
    get_current_account, login, logout, refresh, register, CookiePolicy, LoginRequest,
    RefreshRequest, RegisterRequest, SessionData, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME,
};
pub use health_check::health_check;
