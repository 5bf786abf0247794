//! Calendar arithmetic for working out when a recurring transaction is next due.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month};

use crate::transaction::Transaction;

/// How often a recurring transaction happens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// A calendar month of variable length.
    Monthly,
    /// Same day and month each year.
    Yearly,
    /// Repeats after the same gap that separated the transaction from its
    /// next occurrence the last time it was advanced.
    Custom,
}

impl Frequency {
    fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
            Frequency::Custom => "custom",
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            "custom" => Ok(Frequency::Custom),
            other => Err(RecurrenceError::InvalidFrequency(other.to_owned())),
        }
    }
}

/// The reasons a recurring transaction cannot be advanced.
///
/// None of these abort an advancement run. The affected transaction is left
/// as it is and the others are still processed.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecurrenceError {
    /// The stored frequency is not one of the known frequencies.
    #[error("\"{0}\" is not a valid recurrence frequency")]
    InvalidFrequency(String),

    /// The transaction is recurring but has no frequency.
    #[error("the recurring transaction has no frequency")]
    MissingFrequency,

    /// The transaction is recurring but has no next occurrence date.
    #[error("the recurring transaction has no next occurrence date")]
    MissingNextOccurrence,

    /// A custom interval shorter than one day would never move the date forward.
    #[error("the custom interval {0} is shorter than one day")]
    InvalidInterval(Duration),

    /// The next occurrence falls outside the supported calendar.
    #[error("the occurrence after {0} is outside the supported date range")]
    OutOfRange(Date),
}

/// Compute the occurrence that follows `current` for `frequency`.
///
/// `custom_interval` is only used for [Frequency::Custom] and is truncated to
/// whole days.
///
/// Monthly and yearly steps keep the day of month, clamped to the last day of
/// the target month: 2024-01-31 is followed by 2024-02-29, and 2024-02-29 a
/// year later becomes 2025-02-28.
///
/// # Errors
/// Returns a:
/// - [RecurrenceError::InvalidInterval] if `frequency` is custom and `custom_interval` is less than one day,
/// - or [RecurrenceError::OutOfRange] if the result would not be a representable date.
pub fn compute_next(
    current: Date,
    frequency: Frequency,
    custom_interval: Duration,
) -> Result<Date, RecurrenceError> {
    let next = match frequency {
        Frequency::Daily => current.checked_add(Duration::days(1)),
        Frequency::Weekly => current.checked_add(Duration::weeks(1)),
        Frequency::Monthly => add_months_clamped(current, 1),
        Frequency::Yearly => add_months_clamped(current, 12),
        Frequency::Custom => {
            let days = custom_interval.whole_days();

            if days < 1 {
                return Err(RecurrenceError::InvalidInterval(custom_interval));
            }

            current.checked_add(Duration::days(days))
        }
    };

    next.ok_or(RecurrenceError::OutOfRange(current))
}

/// Compute the date `template` should recur on after its current next occurrence.
///
/// The custom interval is the gap between the template's next occurrence and
/// the date it occurred on, measured now.
///
/// # Errors
/// Returns a [RecurrenceError] if the template is missing its frequency or
/// next occurrence, or if [compute_next] fails.
pub fn next_occurrence(template: &Transaction) -> Result<Date, RecurrenceError> {
    let current = template
        .next_occurrence_at
        .ok_or(RecurrenceError::MissingNextOccurrence)?;
    let frequency: Frequency = template
        .recurrence_frequency
        .as_deref()
        .ok_or(RecurrenceError::MissingFrequency)?
        .parse()?;
    let custom_interval = current - template.occurred_at.date();

    compute_next(current, frequency, custom_interval)
}

fn add_months_clamped(date: Date, months: i32) -> Option<Date> {
    let month_index = i32::from(u8::from(date.month())) - 1 + months;
    let year = date.year().checked_add(month_index.div_euclid(12))?;
    let month = Month::try_from(u8::try_from(month_index.rem_euclid(12) + 1).ok()?).ok()?;
    let day = date.day().min(last_day_of_month(year, month));

    Date::from_calendar_date(year, month, day).ok()
}

fn last_day_of_month(year: i32, month: Month) -> u8 {
    match month {
        Month::January
        | Month::March
        | Month::May
        | Month::July
        | Month::August
        | Month::October
        | Month::December => 31,
        Month::April | Month::June | Month::September | Month::November => 30,
        Month::February => {
            if time::util::is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}



#[cfg(test)]
mod next_occurrence_tests {
    use time::macros::{date, datetime};

    use crate::{
        transaction::{Transaction, TransactionKind},
        user::UserID,
    };

    use super::{RecurrenceError, next_occurrence};

    fn template(frequency: Option<&str>, next_occurrence_at: Option<time::Date>) -> Transaction {
        Transaction {
            id: 1,
            owner: UserID::new(1),
            title: "Rent".to_owned(),
            amount: -500.0,
            kind: TransactionKind::Expense,
            category: "Housing".to_owned(),
            occurred_at: datetime!(2024-03-01 9:00 UTC),
            is_recurring: true,
            recurrence_frequency: frequency.map(str::to_owned),
            next_occurrence_at,
        }
    }

    #[test]
    fn advances_from_next_occurrence_not_occurred_at() {
        let template = template(Some("weekly"), Some(date!(2024 - 03 - 08)));

        assert_eq!(next_occurrence(&template), Ok(date!(2024 - 03 - 15)));
    }

    #[test]
    fn custom_reuses_remembered_gap() {
        let template = template(Some("custom"), Some(date!(2024 - 03 - 11)));

        assert_eq!(next_occurrence(&template), Ok(date!(2024 - 03 - 21)));
    }

    #[test]
    fn custom_with_no_gap_is_invalid() {
        let template = template(Some("custom"), Some(date!(2024 - 03 - 01)));

        assert!(matches!(
            next_occurrence(&template),
            Err(RecurrenceError::InvalidInterval(_))
        ));
    }

    #[test]
    fn unknown_frequency_is_invalid() {
        let template = template(Some("hourly"), Some(date!(2024 - 03 - 08)));

        assert_eq!(
            next_occurrence(&template),
            Err(RecurrenceError::InvalidFrequency("hourly".to_owned()))
        );
    }

    #[test]
    fn missing_fields_are_reported() {
        assert_eq!(
            next_occurrence(&template(None, Some(date!(2024 - 03 - 08)))),
            Err(RecurrenceError::MissingFrequency)
        );
        assert_eq!(
            next_occurrence(&template(Some("daily"), None)),
            Err(RecurrenceError::MissingNextOccurrence)
        );
    }
}
