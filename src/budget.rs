//! Per category budgets and the spending summary shown next to them.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AppState, Error, database_id::TransactionId, user::UserID};

/// How many of a category's newest transactions a [CategorySummary] lists.
pub const RECENT_TRANSACTION_LIMIT: usize = 5;

/// The transactions and budget of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// The category label.
    pub category: String,
    /// The sum of the signed amounts of the category's transactions.
    pub total_amount: f64,
    /// How many transactions are in the category.
    pub transaction_count: u32,
    /// The category's budget, if one has been set.
    pub budget: Option<f64>,
    /// Up to [RECENT_TRANSACTION_LIMIT] of the category's transactions, newest first.
    pub recent_transactions: Vec<RecentTransaction>,
}

/// A short form of a transaction listed in a [CategorySummary].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTransaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The transaction's title.
    pub title: String,
    /// The signed amount of the transaction.
    pub amount: f64,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

/// Set the budget of `owner`'s `category` to `amount`, replacing any earlier budget.
///
/// The category does not need to have any transactions yet.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidBudget] if `amount` is negative or not finite,
/// - or [Error::SqlError] if there is some other SQL error, e.g. the owner does not exist.
pub fn set_category_budget(
    owner: UserID,
    category: &str,
    amount: f64,
    connection: &Connection,
) -> Result<(), Error> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidBudget(amount));
    }

    connection.execute(
        "INSERT INTO category_budget (owner_id, category, amount) VALUES (?1, ?2, ?3)
         ON CONFLICT(owner_id, category) DO UPDATE SET amount = excluded.amount",
        (owner.as_i64(), category, amount),
    )?;

    Ok(())
}

/// Get a summary for every category `owner` has either a transaction or a
/// budget in, ordered by category.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is a SQL error.
pub fn get_category_summaries(
    owner: UserID,
    connection: &Connection,
) -> Result<Vec<CategorySummary>, Error> {
    let mut summaries: Vec<CategorySummary> = connection
        .prepare(
            "SELECT c.category, COALESCE(SUM(t.amount), 0.0), COUNT(t.id), MAX(b.amount)
             FROM (
                SELECT category FROM \"transaction\" WHERE owner_id = :owner_id
                UNION
                SELECT category FROM category_budget WHERE owner_id = :owner_id
             ) c
             LEFT JOIN \"transaction\" t ON t.owner_id = :owner_id AND t.category = c.category
             LEFT JOIN category_budget b ON b.owner_id = :owner_id AND b.category = c.category
             GROUP BY c.category
             ORDER BY c.category ASC",
        )?
        .query_map(&[(":owner_id", &owner.as_i64())], |row| {
            Ok(CategorySummary {
                category: row.get(0)?,
                total_amount: row.get(1)?,
                transaction_count: row.get(2)?,
                budget: row.get(3)?,
                recent_transactions: Vec::new(),
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut statement = connection.prepare(
        "SELECT id, title, amount, occurred_at FROM \"transaction\"
         WHERE owner_id = :owner_id AND category = :category
         ORDER BY julianday(occurred_at) DESC, id DESC
         LIMIT :limit",
    )?;

    for summary in summaries.iter_mut() {
        summary.recent_transactions = statement
            .query_map(
                rusqlite::named_params! {
                    ":owner_id": owner.as_i64(),
                    ":category": summary.category,
                    ":limit": RECENT_TRANSACTION_LIMIT as i64,
                },
                |row| {
                    Ok(RecentTransaction {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        amount: row.get(2)?,
                        occurred_at: row.get(3)?,
                    })
                },
            )?
            .collect::<Result<_, _>>()?;
    }

    Ok(summaries)
}

/// Create the category budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category_budget (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            amount REAL NOT NULL,
            UNIQUE(owner_id, category),
            FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// The state needed to read and write budgets.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for managing budgets.
    db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for setting a category budget.
#[derive(Debug, Deserialize, Serialize)]
pub struct BudgetForm {
    /// The new budget amount.
    pub budget: f64,
}

/// A route handler for setting the budget of a category, responds with 204 No Content.
pub async fn set_category_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(category): Path<String>,
    Json(form): Json<BudgetForm>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    set_category_budget(user_id, &category, form.budget, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for the spending summary of each category.
pub async fn get_category_summary_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<CategorySummary>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_category_summaries(user_id, &connection).map(Json)
}
