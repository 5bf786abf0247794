//! Defines the endpoint for deleting a transaction.

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{TransactionState, delete_transaction},
    user::UserID,
};

/// A route handler for deleting a transaction, responds with 204 No Content.
///
/// Responds with 404 if the transaction does not exist or belongs to another user.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_transaction(user_id, transaction_id, &connection)?;
    tracing::debug!("Deleted transaction {transaction_id} for user {user_id}");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod delete_transaction_endpoint_tests {
    use axum::http::StatusCode;
    use time::macros::datetime;

    use crate::{
        Error,
        endpoints::{self, format_endpoint},
        test_utils::{get_test_server, get_test_state, log_in},
        transaction::{Transaction, TransactionKind, create_transaction, get_transaction},
        user::create_user,
    };

    #[tokio::test]
    async fn deletes_transaction() {
        let state = get_test_state();
        let (user_id, transaction) = {
            let connection = state.db_connection.lock().unwrap();
            let user_id = create_user("test@example.com", &connection).unwrap().id;
            let transaction = create_transaction(
                Transaction::build(
                    user_id,
                    "Test",
                    -1.23,
                    TransactionKind::Expense,
                    datetime!(2025-10-26 12:00 UTC),
                ),
                &connection,
            )
            .unwrap();
            (user_id, transaction)
        };
        let server = get_test_server(state.clone());
        let cookie = log_in(&server, user_id).await;
        let path = format_endpoint(endpoints::TRANSACTION, transaction.id);

        server
            .delete(&path)
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        assert_eq!(
            get_transaction(user_id, transaction.id, &state.db_connection.lock().unwrap()),
            Err(Error::NotFound)
        );
        server
            .delete(&path)
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
