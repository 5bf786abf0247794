//! Defines the endpoint for updating a transaction.

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{Transaction, TransactionForm, TransactionState, update_transaction},
    user::UserID,
};

/// A route handler for replacing the fields of a transaction, responds with the updated transaction.
///
/// The `occurred_at` in the request is ignored, as is the frequency if the
/// transaction already has one.
///
/// Responds with 404 if the transaction does not exist or belongs to another user.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Json(form): Json<TransactionForm>,
) -> Result<Json<Transaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_transaction(
        user_id,
        transaction_id,
        form.into_builder(user_id),
        &connection,
    )
    .map(Json)
    .inspect_err(|error| {
        tracing::debug!("Could not update transaction {transaction_id}: {error}");
    })
}
