mod helpers;
mod middleware;

pub use helpers::{SESSION_COOKIE, extract_bearer_token, extract_cookie_token};
pub use middleware::{AuthError, RequireAuth, RequireUser};
