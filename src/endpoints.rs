//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/transactions/{transaction_id}', use [format_endpoint].

use std::fmt::Display;

/// The route to create and list transactions.
pub const TRANSACTIONS_API: &str = "/api/transactions";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to list the current user's recurring transactions.
pub const RECURRING_TRANSACTIONS: &str = "/api/transactions/recurring";
/// The route to generate the recurring transactions that are due.
pub const PROCESS_RECURRING: &str = "/api/transactions/process-recurring";
/// The route to set the monthly budget of a category.
pub const CATEGORY_BUDGET: &str = "/api/categories/{category}/budget";
/// The route to get spending per category alongside its budget.
pub const CATEGORY_SUMMARY: &str = "/api/categories/summary";

/// Replace the parameter in `endpoint_path` with `value`.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, value: impl Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        value,
        &endpoint_path[param_end..]
    )
}
