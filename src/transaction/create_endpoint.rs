//! Defines the endpoint for creating a new transaction.

use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    recurrence::Frequency,
    transaction::{
        Transaction, TransactionBuilder, TransactionKind, TransactionState, create_transaction,
    },
    user::UserID,
};

/// The request body for creating or updating a transaction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionForm {
    /// Text detailing the transaction.
    pub title: String,
    /// The value of the transaction. The sign is set from `kind`.
    pub amount: f64,
    /// Whether the transaction is an expense or income.
    #[serde(alias = "type")]
    pub kind: TransactionKind,
    /// A free-text category label.
    #[serde(default)]
    pub category: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    /// Whether the transaction repeats on a schedule.
    #[serde(default)]
    pub is_recurring: bool,
    /// How often the transaction repeats.
    #[serde(default)]
    pub recurrence_frequency: Option<Frequency>,
    /// The date the transaction is next due.
    #[serde(default)]
    pub next_occurrence_at: Option<Date>,
}

impl TransactionForm {
    /// Convert the form into a builder for a transaction owned by `owner`.
    ///
    /// The amount is made negative for expenses and positive for income.
    pub fn into_builder(self, owner: UserID) -> TransactionBuilder {
        let mut builder = Transaction::build(
            owner,
            &self.title,
            self.kind.signed_amount(self.amount),
            self.kind,
            self.occurred_at,
        )
        .category(&self.category);

        builder.is_recurring = self.is_recurring;
        builder.recurrence_frequency = self
            .recurrence_frequency
            .map(|frequency| frequency.to_string());
        builder.next_occurrence_at = self.next_occurrence_at;

        builder
    }
}

/// A route handler for creating a new transaction, responds with the created transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<TransactionForm>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = create_transaction(form.into_builder(user_id), &connection)?;
    tracing::debug!("Created transaction {} for user {user_id}", transaction.id);

    Ok((StatusCode::CREATED, Json(transaction)))
}
