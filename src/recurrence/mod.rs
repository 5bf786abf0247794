//! Recurring transactions.
//!
//! [compute_next] and [next_occurrence] decide when a recurring transaction is
//! next due. [advance_due] turns every due recurring transaction of a user
//! into a new transaction and moves the recurring transaction on to its next
//! occurrence, all in one unit of work of an [AtomicStore].

mod endpoint;
mod engine;
mod policy;
mod store;

pub use endpoint::{ProcessedTransactions, RecurrenceState, process_recurring_endpoint};
pub use engine::{GeneratedTransaction, advance_due};
pub use policy::{Frequency, RecurrenceError, compute_next, next_occurrence};
pub use store::{AtomicStore, RecurrenceStore, StoreScope};
