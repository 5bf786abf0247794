//! Application router configuration.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    auth::auth_guard,
    budget::{get_category_summary_endpoint, set_category_budget_endpoint},
    endpoints,
    logging::logging_middleware,
    recurrence::process_recurring_endpoint,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint,
        get_recurring_transactions_endpoint, get_transactions_endpoint,
        update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Every route requires the auth cookie set by [crate::set_auth_cookie].
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::TRANSACTIONS_API,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::RECURRING_TRANSACTIONS,
            get(get_recurring_transactions_endpoint),
        )
        .route(
            endpoints::PROCESS_RECURRING,
            post(process_recurring_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::CATEGORY_BUDGET,
            put(set_category_budget_endpoint),
        )
        .route(
            endpoints::CATEGORY_SUMMARY,
            get(get_category_summary_endpoint),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod routing_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;

    use crate::{build_router, endpoints, test_utils::get_test_state};

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = TestServer::new(build_router(get_test_state()))
            .expect("Could not create test server.");

        server
            .get("/api/nothing-here")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn every_route_is_protected() {
        let server = TestServer::new(build_router(get_test_state()))
            .expect("Could not create test server.");

        server
            .get(endpoints::TRANSACTIONS_API)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get(endpoints::RECURRING_TRANSACTIONS)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .put("/api/categories/Food/budget")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .delete("/api/transactions/1")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
