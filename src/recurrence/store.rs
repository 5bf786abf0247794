//! Defines the store traits the advancement engine works through, and their
//! SQLite implementation.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use time::Date;

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{
        Transaction, TransactionBuilder, create_transaction, find_due_transactions,
        set_next_occurrence,
    },
    user::UserID,
};

/// The transaction store operations needed to advance recurring transactions.
pub trait RecurrenceStore {
    /// Get the recurring transactions owned by `owner` whose next occurrence
    /// is on or before `today`, in the store's natural order.
    fn find_due(&self, owner: UserID, today: Date) -> Result<Vec<Transaction>, Error>;

    /// Create a new transaction in the store.
    fn insert(&mut self, builder: TransactionBuilder) -> Result<Transaction, Error>;

    /// Set the next occurrence date of the transaction `id`.
    fn set_next_occurrence(&mut self, id: TransactionId, next: Date) -> Result<(), Error>;
}

/// A unit of work over a [RecurrenceStore].
///
/// Changes are only kept if [StoreScope::commit] succeeds. Dropping a scope
/// without committing it discards every change made through it.
pub trait StoreScope: RecurrenceStore {
    /// Make every change made through this scope durable.
    fn commit(self) -> Result<(), Error>;
}

/// A store that can open a [StoreScope].
pub trait AtomicStore {
    /// The unit of work type handed out by [AtomicStore::begin].
    type Scope<'a>: StoreScope
    where
        Self: 'a;

    /// Start a unit of work.
    ///
    /// Implementations must not let two open scopes advance the same
    /// transaction, e.g. by taking a write lock here.
    fn begin(&mut self) -> Result<Self::Scope<'_>, Error>;
}

impl AtomicStore for Connection {
    type Scope<'a> = SqlTransaction<'a>;

    /// Start an immediate SQLite transaction.
    ///
    /// The write lock is taken straight away so that a second advancement
    /// run on the same database waits instead of reading the same due rows.
    fn begin(&mut self) -> Result<Self::Scope<'_>, Error> {
        Ok(self.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

impl RecurrenceStore for SqlTransaction<'_> {
    fn find_due(&self, owner: UserID, today: Date) -> Result<Vec<Transaction>, Error> {
        find_due_transactions(owner, today, self)
    }

    fn insert(&mut self, builder: TransactionBuilder) -> Result<Transaction, Error> {
        create_transaction(builder, self)
    }

    fn set_next_occurrence(&mut self, id: TransactionId, next: Date) -> Result<(), Error> {
        set_next_occurrence(id, next, self)
    }
}

impl StoreScope for SqlTransaction<'_> {
    fn commit(self) -> Result<(), Error> {
        SqlTransaction::commit(self)?;

        Ok(())
    }
}
