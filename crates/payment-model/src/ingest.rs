//! Turns fetched sheet rows into payments.
//!
//! Columns are located by header text, so sheets may reorder columns or
//! carry extra ones. A sheet either ingests completely or fails as a whole.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::error::IngestError;
use crate::payment::Payment;
use crate::sheet::{
    Cell, HeaderIndex, RowView, SheetDescriptor, SheetKind, DESCRIPTION, DUE_DATE, PAYMENT_DATE,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ingests `rows` (header first) of the sheet `descriptor` names. `today` is
/// the canonical day of the run; recurring sheets read last month's column.
pub fn ingest(
    descriptor: &SheetDescriptor,
    rows: &[Vec<Cell>],
    today: NaiveDate,
) -> Result<Vec<Payment>, IngestError> {
    let sheet = descriptor.sheet_name.as_str();
    match descriptor.kind {
        SheetKind::Scheduled => ingest_scheduled(sheet, rows, true),
        SheetKind::DueList => ingest_scheduled(sheet, rows, false),
        SheetKind::Recurring => ingest_recurring(sheet, rows, previous_month(today)),
    }
}

/// Rows keyed by `Description`, with an optional `Due Date` column and a
/// `Payment Date` column whose non-empty cells mark settled rows.
pub fn ingest_scheduled(
    sheet: &str,
    rows: &[Vec<Cell>],
    require_payment_date: bool,
) -> Result<Vec<Payment>, IngestError> {
    let (header, data) = split_header(sheet, rows)?;
    let index = HeaderIndex::from_row(header);
    let description_idx = index.require(sheet, DESCRIPTION)?;
    let payment_date_idx = if require_payment_date {
        Some(index.require(sheet, PAYMENT_DATE)?)
    } else {
        index.position(PAYMENT_DATE)
    };
    let due_date_idx = index.position(DUE_DATE);

    let mut payments = Vec::new();
    for (offset, cells) in data.iter().enumerate() {
        let row = RowView {
            sheet,
            number: offset + 2,
            cells,
        };
        if row.is_blank() {
            continue;
        }
        if let Some(paid) = row.optional(PAYMENT_DATE, payment_date_idx)? {
            debug!(sheet, row = row.number, paid, "skipping settled payment");
            continue;
        }
        let description = description_of(&row, description_idx)?;
        let payment = match row.optional(DUE_DATE, due_date_idx)? {
            Some(raw) => Payment::new(description).with_due_day(parse_due_date(sheet, raw)?),
            None => Payment::new(description),
        };
        payments.push(payment);
    }
    Ok(payments)
}

/// Rows keyed by `Description` with one column per month (`"1"`..`"12"`);
/// a non-empty cell under `month` means that month is already paid.
pub fn ingest_recurring(
    sheet: &str,
    rows: &[Vec<Cell>],
    month: u32,
) -> Result<Vec<Payment>, IngestError> {
    let (header, data) = split_header(sheet, rows)?;
    let index = HeaderIndex::from_row(header);
    let month_column = month.to_string();
    let month_idx = index.require(sheet, &month_column)?;
    let description_idx = index.require(sheet, DESCRIPTION)?;

    let mut payments = Vec::new();
    for (offset, cells) in data.iter().enumerate() {
        let row = RowView {
            sheet,
            number: offset + 2,
            cells,
        };
        if row.is_blank() {
            continue;
        }
        // a row that stops before the month column is pending for that month
        if row.optional(&month_column, Some(month_idx))?.is_some() {
            continue;
        }
        payments.push(Payment::new(description_of(&row, description_idx)?));
    }
    Ok(payments)
}

/// Month before the one `today` falls in, as the sheet header spells it.
pub fn previous_month(today: NaiveDate) -> u32 {
    match today.month() {
        1 => 12,
        month => month - 1,
    }
}

fn split_header<'r>(
    sheet: &str,
    rows: &'r [Vec<Cell>],
) -> Result<(&'r [Cell], &'r [Vec<Cell>]), IngestError> {
    match rows {
        [header, data @ ..] if !data.is_empty() => Ok((header.as_slice(), data)),
        _ => Err(IngestError::NoData {
            sheet: sheet.to_string(),
        }),
    }
}

fn description_of<'a>(row: &RowView<'a>, idx: usize) -> Result<&'a str, IngestError> {
    row.required(DESCRIPTION, idx)?
        .map(str::trim)
        .ok_or_else(|| IngestError::MissingDescription {
            sheet: row.sheet.to_string(),
            row: row.number,
        })
}

fn parse_due_date(sheet: &str, raw: &str) -> Result<NaiveDate, IngestError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| IngestError::DateParse {
        sheet: sheet.to_string(),
        value: raw.to_string(),
    })
}
