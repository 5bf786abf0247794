//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, ops::RangeInclusive, str::FromStr};

use rusqlite::{Connection, Row, params_from_iter, types::Type, types::Value};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Error, database_id::TransactionId, user::UserID};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction spends or earns money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money going out, stored with a negative amount.
    Expense,
    /// Money coming in, stored with a positive amount.
    Income,
}

impl TransactionKind {
    /// Apply the sign convention for this kind to `amount`.
    ///
    /// Expenses are negative and income is positive regardless of the sign
    /// the client sent.
    pub fn signed_amount(self, amount: f64) -> f64 {
        match self {
            TransactionKind::Expense => -amount.abs(),
            TransactionKind::Income => amount.abs(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Expense => "expense",
            TransactionKind::Income => "income",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when a string is neither "expense" nor "income".
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("\"{0}\" is not a valid transaction kind")]
pub struct TransactionKindError(String);

impl FromStr for TransactionKind {
    type Err = TransactionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expense" => Ok(TransactionKind::Expense),
            "income" => Ok(TransactionKind::Income),
            other => Err(TransactionKindError(other.to_owned())),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub owner: UserID,
    /// A short text description of what the transaction was for.
    pub title: String,
    /// The amount of money spent (negative) or earned (positive).
    pub amount: f64,
    /// Whether the transaction is an expense or income.
    pub kind: TransactionKind,
    /// A free-text category label, e.g. "Groceries".
    pub category: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    /// Whether the transaction repeats on a schedule.
    pub is_recurring: bool,
    /// How often the transaction repeats, as stored.
    ///
    /// This is kept as the raw stored text so that rows with an unrecognised
    /// frequency can still be loaded. See [crate::recurrence::Frequency].
    pub recurrence_frequency: Option<String>,
    /// The date on or after which the transaction is due to recur.
    pub next_occurrence_at: Option<Date>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        owner: UserID,
        title: &str,
        amount: f64,
        kind: TransactionKind,
        occurred_at: OffsetDateTime,
    ) -> TransactionBuilder {
        TransactionBuilder {
            owner,
            title: title.to_owned(),
            amount,
            kind,
            category: String::new(),
            occurred_at,
            is_recurring: false,
            recurrence_frequency: None,
            next_occurrence_at: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The amount is stored as given, callers that accept amounts from clients
/// should normalise the sign with [TransactionKind::signed_amount] first.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The user that owns the transaction.
    pub owner: UserID,
    /// A short text description of the transaction.
    pub title: String,
    /// The monetary amount of the transaction.
    ///
    /// Positive values represent income, negative values represent expenses.
    pub amount: f64,
    /// Whether the transaction is an expense or income.
    pub kind: TransactionKind,
    /// A free-text category label.
    pub category: String,
    /// When the transaction happened.
    pub occurred_at: OffsetDateTime,
    /// Whether the transaction repeats on a schedule.
    pub is_recurring: bool,
    /// How often the transaction repeats.
    pub recurrence_frequency: Option<String>,
    /// The date on or after which the transaction is due to recur.
    pub next_occurrence_at: Option<Date>,
}

impl TransactionBuilder {
    /// Set the category for the transaction.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Mark the transaction as recurring every `frequency`, next due on
    /// `next_occurrence_at`.
    pub fn recurring(mut self, frequency: &str, next_occurrence_at: Date) -> Self {
        self.is_recurring = true;
        self.recurrence_frequency = Some(frequency.to_owned());
        self.next_occurrence_at = Some(next_occurrence_at);
        self
    }

    /// Check the recurrence fields are consistent.
    ///
    /// A non-recurring transaction has its recurrence fields cleared.
    ///
    /// # Errors
    /// Returns [Error::MissingFrequency] or [Error::MissingNextOccurrence] if
    /// the transaction is recurring but lacks the matching field.
    fn validated(mut self) -> Result<Self, Error> {
        if !self.is_recurring {
            self.recurrence_frequency = None;
            self.next_occurrence_at = None;
        } else if self.recurrence_frequency.is_none() {
            return Err(Error::MissingFrequency);
        } else if self.next_occurrence_at.is_none() {
            return Err(Error::MissingNextOccurrence);
        }

        Ok(self)
    }
}

/// The field to sort transactions by in a [TransactionQuery].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Sort by when the transaction happened.
    #[default]
    Date,
    /// Sort by signed amount.
    Amount,
    /// Sort alphabetically by title.
    Title,
}

/// The order to sort transactions in a [TransactionQuery].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Sort in order of increasing value.
    Asc,
    /// Sort in order of decreasing value.
    #[default]
    Desc,
}

/// Defines how transactions should be fetched from [get_transactions].
#[derive(Debug, Default, Clone)]
pub struct TransactionQuery {
    /// Only include transactions whose title contains this text (case-insensitive).
    pub title_contains: Option<String>,
    /// Only include transactions with exactly this category.
    pub category: Option<String>,
    /// Include transactions that occurred within `date_range` (inclusive).
    ///
    /// A transaction's date is its calendar date in the offset it was recorded
    /// with.
    pub date_range: Option<RangeInclusive<Date>>,
    /// Exclude transactions with an amount below this value.
    pub min_amount: Option<f64>,
    /// Exclude transactions with an amount above this value.
    pub max_amount: Option<f64>,
    /// The field to sort by.
    pub sort_by: SortField,
    /// The direction to sort in.
    pub sort_order: SortOrder,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, owner_id, title, amount, kind, category, occurred_at, \
     is_recurring, recurrence_frequency, next_occurrence_at";

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::MissingFrequency] or [Error::MissingNextOccurrence] if the builder is recurring
///   without a frequency or next occurrence date,
/// - or [Error::SqlError] if there is some other SQL error, e.g. the owner does not exist.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let builder = builder.validated()?;

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (owner_id, title, amount, kind, category, occurred_at,
                is_recurring, recurrence_frequency, next_occurrence_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.owner.as_i64(),
                builder.title,
                builder.amount,
                builder.kind.as_str(),
                builder.category,
                builder.occurred_at,
                builder.is_recurring,
                builder.recurrence_frequency,
                builder.next_occurrence_at,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction owned by `owner` from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    owner: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id AND owner_id = :owner_id"
        ))?
        .query_row(
            &[(":id", &id), (":owner_id", &owner.as_i64())],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Query for the transactions owned by `owner`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn get_transactions(
    owner: UserID,
    query: TransactionQuery,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut where_clause_parts = vec!["owner_id = ?1".to_owned()];
    let mut query_parameters = vec![Value::Integer(owner.as_i64())];

    if let Some(text) = query.title_contains {
        query_parameters.push(Value::Text(format!("%{text}%")));
        where_clause_parts.push(format!("title LIKE ?{}", query_parameters.len()));
    }

    if let Some(category) = query.category {
        query_parameters.push(Value::Text(category));
        where_clause_parts.push(format!("category = ?{}", query_parameters.len()));
    }

    if let Some(date_range) = query.date_range {
        // The first ten characters of the stored date-time are the date in the
        // offset the transaction was recorded with, not the UTC date.
        where_clause_parts.push(format!(
            "substr(occurred_at, 1, 10) BETWEEN ?{} AND ?{}",
            query_parameters.len() + 1,
            query_parameters.len() + 2,
        ));
        query_parameters.push(Value::Text(date_range.start().to_string()));
        query_parameters.push(Value::Text(date_range.end().to_string()));
    }

    if let Some(min_amount) = query.min_amount {
        query_parameters.push(Value::Real(min_amount));
        where_clause_parts.push(format!("amount >= ?{}", query_parameters.len()));
    }

    if let Some(max_amount) = query.max_amount {
        query_parameters.push(Value::Real(max_amount));
        where_clause_parts.push(format!("amount <= ?{}", query_parameters.len()));
    }

    let sort_column = match query.sort_by {
        // Date-times are stored with their offset, so compare them as instants.
        SortField::Date => "julianday(occurred_at)",
        SortField::Amount => "amount",
        SortField::Title => "title",
    };
    let sort_order = match query.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    let query_string = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE {} ORDER BY {sort_column} {sort_order}, id ASC",
        where_clause_parts.join(" AND ")
    );

    connection
        .prepare(&query_string)?
        .query_map(params_from_iter(query_parameters.iter()), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get every recurring transaction owned by `owner`, in insertion order.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn get_recurring_transactions(
    owner: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE owner_id = :owner_id AND is_recurring = 1
             ORDER BY id ASC"
        ))?
        .query_map(&[(":owner_id", &owner.as_i64())], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the recurring transactions owned by `owner` that are due on or before
/// `today`, in the order they were stored.
///
/// Transactions that are not recurring are never returned, whatever their
/// stored next occurrence date.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn find_due_transactions(
    owner: UserID,
    today: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE owner_id = :owner_id
               AND is_recurring = 1
               AND next_occurrence_at IS NOT NULL
               AND next_occurrence_at <= :today
             ORDER BY id ASC"
        ))?
        .query_map(
            rusqlite::named_params! { ":owner_id": owner.as_i64(), ":today": today },
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Set the next occurrence date of the transaction `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn set_next_occurrence(
    id: TransactionId,
    next_occurrence_at: Date,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET next_occurrence_at = ?1 WHERE id = ?2",
        (next_occurrence_at, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Replace the fields of the transaction `id` owned by `owner` with those in `builder`.
///
/// The owner and occurrence time of a transaction never change, so
/// `builder.owner` and `builder.occurred_at` are ignored. Once a recurrence
/// frequency has been stored it is kept, `builder.recurrence_frequency` only
/// fills in a frequency the transaction did not have.
///
/// # Errors
/// This function will return a:
/// - [Error::MissingFrequency] or [Error::MissingNextOccurrence] if the builder is recurring
///   without a frequency or next occurrence date,
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a transaction owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    owner: UserID,
    id: TransactionId,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let builder = builder.validated()?;

    connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET title = ?1, amount = ?2, kind = ?3, category = ?4, is_recurring = ?5,
                 recurrence_frequency = COALESCE(recurrence_frequency, ?6),
                 next_occurrence_at = ?7
             WHERE id = ?8 AND owner_id = ?9
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.title,
                builder.amount,
                builder.kind.as_str(),
                builder.category,
                builder.is_recurring,
                builder.recurrence_frequency,
                builder.next_occurrence_at,
                id,
                owner.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingTransaction,
            error => error.into(),
        })
}

/// Delete the transaction `id` owned by `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a transaction owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(
    owner: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND owner_id = ?2",
        (id, owner.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            amount REAL NOT NULL,
            kind TEXT NOT NULL,
            category TEXT NOT NULL,
            occurred_at TEXT NOT NULL,
            is_recurring INTEGER NOT NULL DEFAULT 0,
            recurrence_frequency TEXT,
            next_occurrence_at TEXT,
            FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        -- Used when looking for due recurring transactions.
        CREATE INDEX IF NOT EXISTS idx_transaction_owner_recurring
            ON \"transaction\"(owner_id, is_recurring, next_occurrence_at);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let owner = UserID::new(row.get(1)?);
    let title = row.get(2)?;
    let amount = row.get(3)?;
    let raw_kind: String = row.get(4)?;
    let kind = raw_kind.parse::<TransactionKind>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error))
    })?;
    let category = row.get(5)?;
    let occurred_at = row.get(6)?;
    let is_recurring = row.get(7)?;
    let recurrence_frequency = row.get(8)?;
    let next_occurrence_at = row.get(9)?;

    Ok(Transaction {
        id,
        owner,
        title,
        amount,
        kind,
        category,
        occurred_at,
        is_recurring,
        recurrence_frequency,
        next_occurrence_at,
    })
}

// ============================================================================
// TESTS
// ============================================================================
