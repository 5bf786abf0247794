//! Cookie based authentication for the JSON API.

mod cookie;
mod middleware;

pub use cookie::{DEFAULT_COOKIE_DURATION, get_user_id_from_cookies, set_auth_cookie};
pub use middleware::{AuthState, auth_guard};

#[cfg(test)]
pub(crate) use cookie::COOKIE_USER_ID;
