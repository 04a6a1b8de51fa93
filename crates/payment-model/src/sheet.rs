use std::collections::HashMap;

use serde::Deserialize;

use crate::error::IngestError;

pub const DESCRIPTION: &str = "Description";
pub const DUE_DATE: &str = "Due Date";
pub const PAYMENT_DATE: &str = "Payment Date";

/// A spreadsheet cell as delivered by the fetch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Empty,
    /// Anything the source could not hand over as text; carries the source
    /// type name for error messages.
    Unsupported(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(value) => value.trim().is_empty(),
            Cell::Unsupported(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    /// Dated payments settled through a required `Payment Date` column.
    #[default]
    Scheduled,
    /// Dated payments where `Payment Date` may be absent.
    DueList,
    /// Monthly obligations ticked off in a column per month.
    Recurring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDescriptor {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub kind: SheetKind,
}

impl SheetDescriptor {
    pub fn label(&self) -> String {
        format!("{}/{}", self.spreadsheet_id, self.sheet_name)
    }
}

/// Header text to column position, resolved once per sheet.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    /// Non-text header cells label no column and are skipped; a reader
    /// that needs such a column reports it as missing.
    pub fn from_row(header: &[Cell]) -> Self {
        let columns = header
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| match cell {
                Cell::Text(label) => Some((label.clone(), idx)),
                Cell::Empty | Cell::Unsupported(_) => None,
            })
            .collect();
        Self { columns }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }

    pub fn require(&self, sheet: &str, column: &str) -> Result<usize, IngestError> {
        self.position(column)
            .ok_or_else(|| IngestError::MissingColumn {
                sheet: sheet.to_string(),
                column: column.to_string(),
            })
    }
}

/// One data row, read through the sheet's header index.
pub(crate) struct RowView<'a> {
    pub sheet: &'a str,
    pub number: usize,
    pub cells: &'a [Cell],
}

impl<'a> RowView<'a> {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    /// Text of a column the row must reach.
    pub fn required(&self, column: &str, idx: usize) -> Result<Option<&'a str>, IngestError> {
        if idx >= self.cells.len() {
            return Err(IngestError::RowShape {
                sheet: self.sheet.to_string(),
                row: self.number,
                column: column.to_string(),
            });
        }
        self.optional(column, Some(idx))
    }

    /// Text of a column that may be trimmed off the end of the row.
    pub fn optional(&self, column: &str, idx: Option<usize>) -> Result<Option<&'a str>, IngestError> {
        let Some(cell) = idx.and_then(|idx| self.cells.get(idx)) else {
            return Ok(None);
        };
        match cell {
            Cell::Text(value) if !value.trim().is_empty() => Ok(Some(value.as_str())),
            Cell::Text(_) | Cell::Empty => Ok(None),
            Cell::Unsupported(_) => Err(IngestError::CellType {
                sheet: self.sheet.to_string(),
                row: self.number,
                column: column.to_string(),
            }),
        }
    }
}
