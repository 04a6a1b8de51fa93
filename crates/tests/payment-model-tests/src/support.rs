use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use payment_model::{Calendar, Cell, Payment};

pub fn athens() -> Calendar {
    Calendar::from_name("Europe/Athens").unwrap()
}

pub fn day(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
}

pub fn instant(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

pub fn utc(rfc3339: &str) -> DateTime<Utc> {
    instant(rfc3339).with_timezone(&Utc)
}

pub fn dated(description: &str, due: &str) -> Payment {
    Payment::new(description).with_due_day(day(due))
}

pub fn rows(grid: &[&[&str]]) -> Vec<Vec<Cell>> {
    grid.iter()
        .map(|row| row.iter().map(|cell| Cell::from(*cell)).collect())
        .collect()
}

pub fn descriptions<'a>(payments: &[&'a Payment]) -> Vec<&'a str> {
    payments.iter().map(|p| p.description()).collect()
}
