use chrono::{DateTime, NaiveDate, TimeZone};

use crate::calendar::Calendar;

/// A pending obligation read from a sheet.
///
/// `due` is a canonical calendar day. Payments without one (recurring or
/// open-ended rows) are never placed in a date bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    description: String,
    due: Option<NaiveDate>,
}

impl Payment {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            due: None,
        }
    }

    /// Attaches the calendar day `due` falls on, replacing any previous one.
    pub fn with_due_date<T: TimeZone>(mut self, due: &DateTime<T>, calendar: &Calendar) -> Self {
        self.due = Some(calendar.day_of(due));
        self
    }

    /// Attaches a day that is already expressed in the canonical calendar.
    pub fn with_due_day(mut self, due: NaiveDate) -> Self {
        self.due = Some(due);
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn due(&self) -> Option<NaiveDate> {
        self.due
    }

    pub fn is_due(&self) -> bool {
        self.due.is_some()
    }

    /// Whole days from `now`'s canonical day to the due day; negative when
    /// overdue. `None` for payments that are not date-scheduled.
    pub fn diff_from_now_in_days<T: TimeZone>(
        &self,
        now: &DateTime<T>,
        calendar: &Calendar,
    ) -> Option<i64> {
        self.diff_from_day(calendar.day_of(now))
    }

    pub(crate) fn diff_from_day(&self, today: NaiveDate) -> Option<i64> {
        self.due
            .map(|due| due.signed_duration_since(today).num_days())
    }
}
