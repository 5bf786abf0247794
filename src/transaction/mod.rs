//! Transaction management for the finance tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - The JSON route handlers for transactions

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod list_endpoint;

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::AppState;

pub use core::{
    SortField, SortOrder, Transaction, TransactionBuilder, TransactionKind, TransactionQuery,
    create_transaction, create_transaction_table, delete_transaction, find_due_transactions,
    get_recurring_transactions, get_transaction, get_transactions, set_next_occurrence,
    update_transaction,
};
pub use create_endpoint::{TransactionForm, create_transaction_endpoint};
pub use delete_endpoint::delete_transaction_endpoint;
pub use edit_endpoint::update_transaction_endpoint;
pub use list_endpoint::{
    TransactionSearchParams, get_recurring_transactions_endpoint, get_transactions_endpoint,
};

#[cfg(test)]
pub use core::count_transactions;

/// The state needed by the transaction route handlers.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}
