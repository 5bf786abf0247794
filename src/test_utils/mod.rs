#![allow(missing_docs)]

use axum::{Router, extract::Path, routing::post};
use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
use axum_test::TestServer;
use rusqlite::Connection;

use crate::{
    AppState, build_router,
    auth::{COOKIE_USER_ID, DEFAULT_COOKIE_DURATION, set_auth_cookie},
    endpoints::format_endpoint,
    user::UserID,
};

const TEST_LOG_IN_ROUTE: &str = "/test/log_in/{user_id}";

pub(crate) fn get_test_state() -> AppState {
    AppState::new(
        Connection::open_in_memory().expect("Could not open database in memory."),
        "42",
        "Etc/UTC",
    )
    .expect("Could not create app state.")
}

async fn stub_log_in_route(Path(user_id): Path<i64>, jar: PrivateCookieJar) -> PrivateCookieJar {
    set_auth_cookie(jar, UserID::new(user_id), DEFAULT_COOKIE_DURATION)
}

/// Create a test server for the app's router with an extra route that logs in
/// any user without credentials.
pub(crate) fn get_test_server(state: AppState) -> TestServer {
    let log_in_routes = Router::new()
        .route(TEST_LOG_IN_ROUTE, post(stub_log_in_route))
        .with_state(state.clone());
    let app = build_router(state).merge(log_in_routes);

    TestServer::new(app).expect("Could not create test server.")
}

/// Log in as `user_id` and return the auth cookie.
pub(crate) async fn log_in(server: &TestServer, user_id: UserID) -> Cookie<'static> {
    let response = server
        .post(&format_endpoint(TEST_LOG_IN_ROUTE, user_id))
        .await;

    response.assert_status_ok();
    response.cookie(COOKIE_USER_ID)
}
