//! Defines the endpoints for listing and searching transactions.

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use time::Date;

use crate::{
    Error,
    transaction::{
        SortField, SortOrder, Transaction, TransactionQuery, TransactionState,
        get_recurring_transactions, get_transactions,
    },
    user::UserID,
};

/// The query parameters for searching transactions.
///
/// Every filter is optional, an empty query lists all of the user's transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionSearchParams {
    /// Text that the title must contain, ignoring case.
    pub query: Option<String>,
    /// The exact category to match.
    pub category: Option<String>,
    /// The earliest date to include.
    pub start_date: Option<Date>,
    /// The latest date to include.
    pub end_date: Option<Date>,
    /// The smallest signed amount to include.
    pub min_amount: Option<f64>,
    /// The largest signed amount to include.
    pub max_amount: Option<f64>,
    /// The field to sort by, defaults to date.
    #[serde(default)]
    pub sort_by: SortField,
    /// The direction to sort in, defaults to descending.
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl From<TransactionSearchParams> for TransactionQuery {
    fn from(params: TransactionSearchParams) -> Self {
        let date_range = match (params.start_date, params.end_date) {
            (None, None) => None,
            (start, end) => Some(start.unwrap_or(Date::MIN)..=end.unwrap_or(Date::MAX)),
        };

        TransactionQuery {
            title_contains: params.query.filter(|text| !text.is_empty()),
            category: params.category.filter(|category| !category.is_empty()),
            date_range,
            min_amount: params.min_amount,
            max_amount: params.max_amount,
            sort_by: params.sort_by,
            sort_order: params.sort_order,
        }
    }
}

/// A route handler for listing the current user's transactions.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(params): Query<TransactionSearchParams>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_transactions(user_id, params.into(), &connection).map(Json)
}

/// A route handler for listing the current user's recurring transactions.
pub async fn get_recurring_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_recurring_transactions(user_id, &connection).map(Json)
}
