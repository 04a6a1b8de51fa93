use chrono::{DateTime, NaiveDate, TimeZone};

use crate::calendar::Calendar;
use crate::payment::Payment;

/// Buckets payments by their day-delta against a fixed "today".
///
/// Every finder is a stable filter over its input and leaves out payments
/// that are not date-scheduled.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    today: NaiveDate,
}

impl Classifier {
    pub fn new<T: TimeZone>(calendar: &Calendar, now: &DateTime<T>) -> Self {
        Self::for_day(calendar.day_of(now))
    }

    pub fn for_day(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn day_delta(&self, payment: &Payment) -> Option<i64> {
        payment.diff_from_day(self.today)
    }

    /// Payments due exactly `target` days from today.
    pub fn find_at<'p>(&self, payments: &'p [Payment], target: i64) -> Vec<&'p Payment> {
        self.filter(payments, |delta| delta == target)
    }

    /// Payments due `max` days from today or earlier; `-1` gives the overdue ones.
    pub fn find_until<'p>(&self, payments: &'p [Payment], max: i64) -> Vec<&'p Payment> {
        self.filter(payments, |delta| delta <= max)
    }

    /// Payments due from tomorrow through `window` days ahead.
    pub fn find_coming_up<'p>(&self, payments: &'p [Payment], window: u32) -> Vec<&'p Payment> {
        let window = i64::from(window);
        self.filter(payments, |delta| (1..=window).contains(&delta))
    }

    /// Dated payments due within `window` days, overdue and today included.
    pub fn count_pending_within(&self, payments: &[Payment], window: u32) -> usize {
        self.find_until(payments, i64::from(window)).len()
    }

    pub fn count_undated(&self, payments: &[Payment]) -> usize {
        payments.iter().filter(|p| !p.is_due()).count()
    }

    fn filter<'p>(&self, payments: &'p [Payment], keep: impl Fn(i64) -> bool) -> Vec<&'p Payment> {
        payments
            .iter()
            .filter(|p| self.day_delta(p).is_some_and(&keep))
            .collect()
    }
}
