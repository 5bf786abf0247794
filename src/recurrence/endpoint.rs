//! Defines the endpoint that generates the current user's due recurring transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AppState, Error, timezone::get_local_offset, user::UserID};

use super::engine::{GeneratedTransaction, advance_due};

/// The state needed to process recurring transactions.
#[derive(Debug, Clone)]
pub struct RecurrenceState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for RecurrenceState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The response body of [process_recurring_endpoint].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTransactions {
    /// The transactions generated by this request.
    pub processed_transactions: Vec<GeneratedTransaction>,
}

/// A route handler that generates the current user's due recurring
/// transactions, responds with the generated transactions.
///
/// What is due is decided by the current date in the server's local timezone.
pub async fn process_recurring_endpoint(
    State(state): State<RecurrenceState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<ProcessedTransactions>, Error> {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        return Err(Error::InvalidTimezoneError(state.local_timezone));
    };
    let now = OffsetDateTime::now_utc().to_offset(local_offset);

    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let processed_transactions = advance_due(&mut *connection, user_id, now)?;

    Ok(Json(ProcessedTransactions {
        processed_transactions,
    }))
}

#[cfg(test)]
mod process_recurring_endpoint_tests {
    use axum::http::StatusCode;
    use time::{Duration, OffsetDateTime};

    use crate::{
        endpoints,
        test_utils::{get_test_server, get_test_state, log_in},
        transaction::{Transaction, TransactionKind, create_transaction, get_transaction},
        user::create_user,
    };

    use super::ProcessedTransactions;

    #[tokio::test]
    async fn generates_due_transactions() {
        let state = get_test_state();
        let today = OffsetDateTime::now_utc().date();
        let (user_id, template) = {
            let connection = state.db_connection.lock().unwrap();
            let user_id = create_user("test@example.com", &connection).unwrap().id;
            let template = create_transaction(
                Transaction::build(
                    user_id,
                    "Rent",
                    -1200.0,
                    TransactionKind::Expense,
                    OffsetDateTime::now_utc() - Duration::weeks(2),
                )
                .category("Housing")
                .recurring("weekly", today - Duration::days(1)),
                &connection,
            )
            .unwrap();
            (user_id, template)
        };
        let server = get_test_server(state.clone());
        let cookie = log_in(&server, user_id).await;

        let response = server
            .post(endpoints::PROCESS_RECURRING)
            .add_cookie(cookie.clone())
            .await;

        response.assert_status_ok();
        let body = response.json::<ProcessedTransactions>();
        assert_eq!(body.processed_transactions.len(), 1);
        let generated = &body.processed_transactions[0];
        assert_eq!(generated.title, "Rent");
        assert_eq!(generated.amount, -1200.0);
        assert_eq!(generated.category, "Housing");
        assert_eq!(generated.next_occurrence_at, today + Duration::days(6));
        assert_eq!(
            get_transaction(user_id, template.id, &state.db_connection.lock().unwrap())
                .unwrap()
                .next_occurrence_at,
            Some(today + Duration::days(6))
        );

        let response = server
            .post(endpoints::PROCESS_RECURRING)
            .add_cookie(cookie)
            .await;

        response.assert_status_ok();
        assert!(
            response
                .json::<ProcessedTransactions>()
                .processed_transactions
                .is_empty()
        );
    }

    #[tokio::test]
    async fn nothing_due_responds_with_empty_list() {
        let state = get_test_state();
        let user_id = create_user("test@example.com", &state.db_connection.lock().unwrap())
            .unwrap()
            .id;
        let server = get_test_server(state);
        let cookie = log_in(&server, user_id).await;

        let response = server
            .post(endpoints::PROCESS_RECURRING)
            .add_cookie(cookie)
            .await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "processed_transactions": [] }));
    }

    #[tokio::test]
    async fn requires_log_in() {
        let server = get_test_server(get_test_state());

        server
            .post(endpoints::PROCESS_RECURRING)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
