#![forbid(unsafe_code)]
// Enforce our IO/time bans via Clippy (see clippy.toml):
#![deny(clippy::disallowed_methods, clippy::disallowed_types)]

pub mod calendar;
pub mod classify;
pub mod config;
pub mod error;
pub mod flow;
pub mod ingest;
pub mod payment;
pub mod report;
pub mod schedule;
pub mod sheet;

pub use calendar::{Calendar, CalendarError, DEFAULT_TIMEZONE};
pub use classify::Classifier;
pub use config::{
    ConfigDiscovery, NotificationTarget, ReportConfig, Settings, SheetFailurePolicy, ValueRef,
    CONFIG_DISCOVERY, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATHS, DEFAULT_NTFY_SERVER,
};
pub use error::{ConfigError, IngestError};
pub use flow::{
    Command, EffId, Effect, Event, NotificationRequest, PaymentFlow, RunMode, RunOutcome,
    SheetRequest,
};
pub use ingest::{ingest, ingest_recurring, ingest_scheduled, previous_month};
pub use payment::Payment;
pub use report::{Report, SheetFailure, NOTHING_COMING_UP, NOTHING_FOR_TODAY, NOTHING_TO_REPORT, REPORT_TITLE};
pub use schedule::{Schedule, ScheduleError};
pub use sheet::{Cell, HeaderIndex, SheetDescriptor, SheetKind};
