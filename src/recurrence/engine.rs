//! Materializes the recurring transactions that are due.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{Transaction, TransactionKind},
    user::UserID,
};

use super::{
    policy::next_occurrence,
    store::{AtomicStore, RecurrenceStore, StoreScope},
};

/// A transaction created by [advance_due].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTransaction {
    /// The ID of the new transaction.
    pub id: TransactionId,
    /// The title copied from the recurring transaction.
    pub title: String,
    /// The amount copied from the recurring transaction.
    pub amount: f64,
    /// The kind copied from the recurring transaction.
    pub kind: TransactionKind,
    /// The category copied from the recurring transaction.
    pub category: String,
    /// When the advancement ran.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    /// When both the new transaction and its template are next due.
    pub next_occurrence_at: Date,
}

/// Create a new transaction for each of `owner`'s recurring transactions that
/// are due on the date of `now`, and move each of those templates on to its
/// next occurrence.
///
/// Only the date of `now` is used to decide what is due, the full timestamp is
/// used as the time the new transactions occurred at. Templates whose schedule
/// cannot be advanced, e.g. because of an unknown frequency, are logged and
/// left untouched.
///
/// All changes are made in a single unit of work. A template is advanced by
/// one step per call, so running this twice with the same `now` only generates
/// again for templates whose one step did not move them past the date of `now`.
///
/// # Errors
/// Returns the store's [Error] if any read or write fails. In that case none
/// of the changes are kept.
pub fn advance_due<S: AtomicStore>(
    store: &mut S,
    owner: UserID,
    now: OffsetDateTime,
) -> Result<Vec<GeneratedTransaction>, Error> {
    let mut scope = store.begin()?;
    let due = scope.find_due(owner, now.date())?;

    if due.is_empty() {
        tracing::debug!("No recurring transactions due for user {owner} on {}", now.date());
        return Ok(Vec::new());
    }

    let mut generated = Vec::with_capacity(due.len());

    for template in &due {
        let next = match next_occurrence(template) {
            Ok(next) => next,
            Err(error) => {
                tracing::warn!(
                    "Skipping recurring transaction {} for user {owner}: {error}",
                    template.id
                );
                continue;
            }
        };

        // `next_occurrence` only succeeds if the frequency is set.
        let frequency = template.recurrence_frequency.as_deref().unwrap_or_default();
        let instance = scope.insert(
            Transaction::build(owner, &template.title, template.amount, template.kind, now)
                .category(&template.category)
                .recurring(frequency, next),
        )?;
        scope.set_next_occurrence(template.id, next)?;

        tracing::debug!(
            "Generated transaction {} from recurring transaction {}, next due on {next}",
            instance.id,
            template.id
        );
        generated.push(GeneratedTransaction {
            id: instance.id,
            title: instance.title,
            amount: instance.amount,
            kind: instance.kind,
            category: instance.category,
            occurred_at: instance.occurred_at,
            next_occurrence_at: next,
        });
    }

    scope.commit()?;

    tracing::info!(
        "Generated {} of {} due recurring transactions for user {owner}",
        generated.len(),
        due.len()
    );

    Ok(generated)
}

#[cfg(test)]
mod advance_due_tests {
    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        Error,
        db::initialize,
        recurrence::store::in_memory::InMemoryStore,
        transaction::{
            Transaction, TransactionKind, count_transactions, create_transaction, get_transaction,
            get_transactions,
        },
        user::{UserID, create_user},
    };

    use super::advance_due;

    fn get_test_connection() -> (Connection, UserID) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let owner = create_user("test@example.com", &conn).unwrap().id;

        (conn, owner)
    }

    #[test]
    fn weekly_template_generates_instance_and_advances() {
        let (mut conn, owner) = get_test_connection();
        let template = create_transaction(
            Transaction::build(
                owner,
                "Gym",
                -20.0,
                TransactionKind::Expense,
                datetime!(2024-02-23 18:00 UTC),
            )
            .category("Health")
            .recurring("weekly", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();
        let now = datetime!(2024-03-05 12:00 UTC);

        let generated = advance_due(&mut conn, owner, now).unwrap();

        assert_eq!(generated.len(), 1);
        let summary = &generated[0];
        assert_eq!(summary.title, "Gym");
        assert_eq!(summary.amount, -20.0);
        assert_eq!(summary.kind, TransactionKind::Expense);
        assert_eq!(summary.category, "Health");
        assert_eq!(summary.occurred_at, now);
        assert_eq!(summary.next_occurrence_at, date!(2024 - 03 - 08));

        let instance = get_transaction(owner, summary.id, &conn).unwrap();
        assert!(instance.is_recurring);
        assert_eq!(instance.recurrence_frequency.as_deref(), Some("weekly"));
        assert_eq!(instance.next_occurrence_at, Some(date!(2024 - 03 - 08)));

        let template = get_transaction(owner, template.id, &conn).unwrap();
        assert_eq!(template.next_occurrence_at, Some(date!(2024 - 03 - 08)));
        assert_eq!(template.occurred_at, datetime!(2024-02-23 18:00 UTC));
    }

    #[test]
    fn second_run_with_same_now_generates_nothing() {
        let (mut conn, owner) = get_test_connection();
        create_transaction(
            Transaction::build(
                owner,
                "Rent",
                -1200.0,
                TransactionKind::Expense,
                datetime!(2024-02-01 9:00 UTC),
            )
            .recurring("monthly", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();
        let now = datetime!(2024-03-01 9:00 UTC);

        let first = advance_due(&mut conn, owner, now).unwrap();
        let second = advance_due(&mut conn, owner, now).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(count_transactions(&conn), Ok(2));
    }

    #[test]
    fn second_run_with_same_now_generates_nothing_for_custom_frequency() {
        let (mut conn, owner) = get_test_connection();
        let template = create_transaction(
            Transaction::build(
                owner,
                "Window cleaner",
                -60.0,
                TransactionKind::Expense,
                datetime!(2024-02-20 10:00 UTC),
            )
            .recurring("custom", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();
        let now = datetime!(2024-03-01 10:00 UTC);

        let first = advance_due(&mut conn, owner, now).unwrap();
        let after_first = get_transaction(owner, template.id, &conn).unwrap();
        let second = advance_due(&mut conn, owner, now).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(count_transactions(&conn), Ok(2));
        assert_eq!(after_first.next_occurrence_at, Some(date!(2024 - 03 - 11)));
        assert_eq!(get_transaction(owner, template.id, &conn).unwrap(), after_first);
    }

    #[test]
    fn nothing_due_writes_nothing() {
        let (mut conn, owner) = get_test_connection();
        let template = create_transaction(
            Transaction::build(
                owner,
                "Salary",
                5000.0,
                TransactionKind::Income,
                datetime!(2024-03-01 9:00 UTC),
            )
            .recurring("monthly", date!(2024 - 04 - 01)),
            &conn,
        )
        .unwrap();

        let generated = advance_due(&mut conn, owner, datetime!(2024-03-31 23:59 UTC)).unwrap();

        assert!(generated.is_empty());
        assert_eq!(count_transactions(&conn), Ok(1));
        assert_eq!(get_transaction(owner, template.id, &conn).unwrap(), template);
    }

    #[test]
    fn failed_insert_rolls_back_whole_batch() {
        let owner = UserID::new(1);
        let mut store = InMemoryStore::default();
        for title in ["Rent", "Gym"] {
            store.add(
                Transaction::build(
                    owner,
                    title,
                    -10.0,
                    TransactionKind::Expense,
                    datetime!(2024-02-01 9:00 UTC),
                )
                .recurring("monthly", date!(2024 - 03 - 01)),
            );
        }
        let before = store.transactions.clone();
        store.fail_on_insert = Some(2);

        let result = advance_due(&mut store, owner, datetime!(2024-03-02 9:00 UTC));

        assert_eq!(result, Err(Error::SqlError(rusqlite::Error::InvalidQuery)));
        assert_eq!(store.transactions, before);
    }

    #[test]
    fn failed_sql_insert_rolls_back_whole_batch() {
        let (mut conn, owner) = get_test_connection();
        conn.execute_batch(
            "CREATE TRIGGER reject_broken BEFORE INSERT ON \"transaction\"
             WHEN NEW.title = 'Broken'
             BEGIN
                SELECT RAISE(ABORT, 'broken transaction');
             END;",
        )
        .unwrap();
        // The trigger only checks inserts, so the failing template is renamed after it is stored.
        let fine = create_transaction(
            Transaction::build(
                owner,
                "Fine",
                -10.0,
                TransactionKind::Expense,
                datetime!(2024-02-01 9:00 UTC),
            )
            .recurring("monthly", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();
        let broken = create_transaction(
            Transaction::build(
                owner,
                "Soon broken",
                -10.0,
                TransactionKind::Expense,
                datetime!(2024-02-01 9:00 UTC),
            )
            .recurring("monthly", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();
        conn.execute(
            "UPDATE \"transaction\" SET title = 'Broken' WHERE id = ?1",
            [broken.id],
        )
        .unwrap();

        let result = advance_due(&mut conn, owner, datetime!(2024-03-02 9:00 UTC));

        assert!(matches!(result, Err(Error::SqlError(_))));
        assert_eq!(count_transactions(&conn), Ok(2));
        assert_eq!(
            get_transaction(owner, fine.id, &conn)
                .unwrap()
                .next_occurrence_at,
            Some(date!(2024 - 03 - 01))
        );
    }

    #[test]
    fn unknown_frequency_is_skipped_without_blocking_others() {
        let (mut conn, owner) = get_test_connection();
        let fortnightly = create_transaction(
            Transaction::build(
                owner,
                "Cleaner",
                -80.0,
                TransactionKind::Expense,
                datetime!(2024-02-15 9:00 UTC),
            )
            .recurring("fortnightly", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();
        let daily = create_transaction(
            Transaction::build(
                owner,
                "Coffee",
                -4.5,
                TransactionKind::Expense,
                datetime!(2024-02-29 8:00 UTC),
            )
            .recurring("daily", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();

        let generated = advance_due(&mut conn, owner, datetime!(2024-03-01 8:00 UTC)).unwrap();

        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].title, "Coffee");
        assert_eq!(
            get_transaction(owner, fortnightly.id, &conn).unwrap(),
            fortnightly
        );
        assert_eq!(
            get_transaction(owner, daily.id, &conn)
                .unwrap()
                .next_occurrence_at,
            Some(date!(2024 - 03 - 02))
        );
    }

    #[test]
    fn custom_frequency_repeats_remembered_gap() {
        let (mut conn, owner) = get_test_connection();
        let template = create_transaction(
            Transaction::build(
                owner,
                "Haircut",
                -35.0,
                TransactionKind::Expense,
                datetime!(2024-02-20 10:00 UTC),
            )
            .recurring("custom", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();

        let generated = advance_due(&mut conn, owner, datetime!(2024-03-01 10:00 UTC)).unwrap();

        // 2024-02-20 to 2024-03-01 is ten days.
        assert_eq!(generated[0].next_occurrence_at, date!(2024 - 03 - 11));
        assert_eq!(
            get_transaction(owner, template.id, &conn)
                .unwrap()
                .next_occurrence_at,
            Some(date!(2024 - 03 - 11))
        );
    }

    #[test]
    fn zero_custom_gap_is_skipped() {
        let (mut conn, owner) = get_test_connection();
        let template = create_transaction(
            Transaction::build(
                owner,
                "Odd",
                -1.0,
                TransactionKind::Expense,
                datetime!(2024-03-01 10:00 UTC),
            )
            .recurring("custom", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();

        let generated = advance_due(&mut conn, owner, datetime!(2024-03-01 11:00 UTC)).unwrap();

        assert!(generated.is_empty());
        assert_eq!(count_transactions(&conn), Ok(1));
        assert_eq!(get_transaction(owner, template.id, &conn).unwrap(), template);
    }

    #[test]
    fn generated_instances_are_advanced_on_later_runs() {
        let (mut conn, owner) = get_test_connection();
        create_transaction(
            Transaction::build(
                owner,
                "Paper",
                -3.0,
                TransactionKind::Expense,
                datetime!(2024-02-29 7:00 UTC),
            )
            .recurring("daily", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();

        let first = advance_due(&mut conn, owner, datetime!(2024-03-01 7:00 UTC)).unwrap();
        let second = advance_due(&mut conn, owner, datetime!(2024-03-02 7:00 UTC)).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(count_transactions(&conn), Ok(4));
        assert!(
            second
                .iter()
                .all(|summary| summary.next_occurrence_at == date!(2024 - 03 - 03))
        );
    }

    #[test]
    fn other_users_are_not_advanced() {
        let (mut conn, owner) = get_test_connection();
        let other = create_user("other@example.com", &conn).unwrap().id;
        let theirs = create_transaction(
            Transaction::build(
                other,
                "Their rent",
                -900.0,
                TransactionKind::Expense,
                datetime!(2024-02-01 9:00 UTC),
            )
            .recurring("monthly", date!(2024 - 03 - 01)),
            &conn,
        )
        .unwrap();

        let generated = advance_due(&mut conn, owner, datetime!(2024-03-05 9:00 UTC)).unwrap();

        assert!(generated.is_empty());
        assert_eq!(get_transaction(other, theirs.id, &conn).unwrap(), theirs);
        assert!(
            get_transactions(owner, Default::default(), &conn)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn overdue_template_advances_one_step_per_run() {
        let (mut conn, owner) = get_test_connection();
        let template = create_transaction(
            Transaction::build(
                owner,
                "Gym",
                -20.0,
                TransactionKind::Expense,
                datetime!(2024-01-01 18:00 UTC),
            )
            .recurring("weekly", date!(2024 - 01 - 08)),
            &conn,
        )
        .unwrap();

        let now = datetime!(2024-03-05 12:00 UTC);

        advance_due(&mut conn, owner, now).unwrap();

        assert_eq!(
            get_transaction(owner, template.id, &conn)
                .unwrap()
                .next_occurrence_at,
            Some(date!(2024 - 01 - 15))
        );

        // Still overdue, so the same `now` generates again.
        let second = advance_due(&mut conn, owner, now).unwrap();

        assert!(!second.is_empty());
        assert_eq!(
            get_transaction(owner, template.id, &conn)
                .unwrap()
                .next_occurrence_at,
            Some(date!(2024 - 01 - 22))
        );
    }

    #[test]
    fn time_of_day_does_not_affect_due_check() {
        let (mut conn, owner) = get_test_connection();
        create_transaction(
            Transaction::build(
                owner,
                "Coffee",
                -4.5,
                TransactionKind::Expense,
                datetime!(2024-03-04 23:00 UTC),
            )
            .recurring("daily", date!(2024 - 03 - 05)),
            &conn,
        )
        .unwrap();

        let generated = advance_due(&mut conn, owner, datetime!(2024-03-05 0:00:01 UTC)).unwrap();

        assert_eq!(generated.len(), 1);
    }
}
