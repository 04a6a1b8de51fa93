use thiserror::Error;

use crate::calendar::CalendarError;
use crate::schedule::ScheduleError;

/// Reasons a single sheet could not be turned into payments. Row numbers
/// are 1-based sheet rows, the header being row 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("sheet '{sheet}': no data found")]
    NoData { sheet: String },
    #[error("sheet '{sheet}': column '{column}' was not found in sheet header")]
    MissingColumn { sheet: String, column: String },
    #[error("sheet '{sheet}': failed to parse due date value '{value}'")]
    DateParse { sheet: String, value: String },
    #[error("sheet '{sheet}': row {row} ends before column '{column}'")]
    RowShape {
        sheet: String,
        row: usize,
        column: String,
    },
    #[error("sheet '{sheet}': row {row}, column '{column}' does not hold text")]
    CellType {
        sheet: String,
        row: usize,
        column: String,
    },
    #[error("sheet '{sheet}': row {row} has no description")]
    MissingDescription { sheet: String, row: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("environment variable '{0}' is required")]
    MissingEnvVar(String),
    #[error("invalid configuration: {0}")]
    Calendar(#[from] CalendarError),
    #[error("invalid configuration: {0}")]
    Schedule(#[from] ScheduleError),
}
