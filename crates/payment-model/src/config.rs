use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::de::value::MapAccessDeserializer;
use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::calendar::{Calendar, DEFAULT_TIMEZONE};
use crate::error::ConfigError;
use crate::report::{DEFAULT_WINDOW_DAYS, REPORT_TITLE};
use crate::schedule::{Schedule, DEFAULT_SCHEDULE};
use crate::sheet::{SheetDescriptor, SheetKind};

pub const CONFIG_ENV_VAR: &str = "PAYMENT_REPORT_CONFIG";
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = [
    "~/.payment-report/config.yaml",
    "/etc/payment-report.yaml",
];
pub const DEFAULT_NTFY_SERVER: &str = "https://ntfy.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDiscovery {
    pub env_var: &'static str,
    pub fallback_paths: &'static [&'static str],
}

pub const CONFIG_DISCOVERY: ConfigDiscovery = ConfigDiscovery {
    env_var: CONFIG_ENV_VAR,
    fallback_paths: &DEFAULT_CONFIG_PATHS,
};

/// What a run does when one of its sheets cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetFailurePolicy {
    /// Drop the whole run; nothing is sent.
    Abort,
    /// Skip the sheet and list it in the report.
    #[default]
    Annotate,
}

/// A configured string: written inline or read from an environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueRef {
    Literal(String),
    Env(String),
}

impl ValueRef {
    fn collect_env(&self, set: &mut BTreeSet<String>) {
        if let ValueRef::Env(name) = self {
            set.insert(name.clone());
        }
    }

    fn resolve(&self, field: &str, env: &HashMap<String, String>) -> Result<String, ConfigError> {
        let value = match self {
            ValueRef::Literal(value) => value.clone(),
            ValueRef::Env(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::MissingEnvVar(name.clone()))?,
        };
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("'{field}' is empty")));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub server: ValueRef,
    pub topic: ValueRef,
    pub title: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub spreadsheet_id: ValueRef,
    pub sheet_name: ValueRef,
    pub kind: SheetKind,
}

/// The parsed configuration document, before environment lookups.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub calendar: Calendar,
    pub schedule: Schedule,
    pub window_days: u32,
    pub on_sheet_error: SheetFailurePolicy,
    pub credentials: ValueRef,
    pub notification: NotificationConfig,
    pub sheets: Vec<SheetConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTarget {
    pub server: String,
    pub topic: String,
    pub title: String,
    pub tags: Vec<String>,
}

/// Configuration with every value resolved; what a run works from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub calendar: Calendar,
    pub schedule: Schedule,
    pub window_days: u32,
    pub on_sheet_error: SheetFailurePolicy,
    pub credentials: String,
    pub notification: NotificationTarget,
    pub sheets: Vec<SheetDescriptor>,
}

impl ReportConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(contents).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let calendar = Calendar::from_name(&raw.timezone)?;
        let schedule = Schedule::parse(&raw.schedule)?;
        if raw.sheets.is_empty() {
            return Err(ConfigError::Invalid("at least one sheet is required".into()));
        }
        let notification = NotificationConfig {
            server: raw
                .notification
                .server
                .unwrap_or_else(|| ValueRef::Literal(DEFAULT_NTFY_SERVER.into())),
            topic: raw.notification.topic,
            title: raw
                .notification
                .title
                .unwrap_or_else(|| REPORT_TITLE.to_string()),
            tags: raw.notification.tags,
        };
        let sheets = raw
            .sheets
            .into_iter()
            .map(|sheet| SheetConfig {
                spreadsheet_id: sheet.spreadsheet_id,
                sheet_name: sheet.sheet_name,
                kind: sheet.kind,
            })
            .collect();
        Ok(Self {
            calendar,
            schedule,
            window_days: raw.window_days,
            on_sheet_error: raw.on_sheet_error,
            credentials: raw.credentials,
            notification,
            sheets,
        })
    }

    /// Environment variables the configuration refers to.
    pub fn env_requests(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.credentials.collect_env(&mut set);
        self.notification.server.collect_env(&mut set);
        self.notification.topic.collect_env(&mut set);
        for sheet in &self.sheets {
            sheet.spreadsheet_id.collect_env(&mut set);
            sheet.sheet_name.collect_env(&mut set);
        }
        set
    }

    pub fn resolve(&self, env: &HashMap<String, String>) -> Result<Settings, ConfigError> {
        let notification = NotificationTarget {
            server: self
                .notification
                .server
                .resolve("notification.server", env)?
                .trim_end_matches('/')
                .to_string(),
            topic: self.notification.topic.resolve("notification.topic", env)?,
            title: self.notification.title.clone(),
            tags: self.notification.tags.clone(),
        };
        let mut sheets = Vec::with_capacity(self.sheets.len());
        for (idx, sheet) in self.sheets.iter().enumerate() {
            sheets.push(SheetDescriptor {
                spreadsheet_id: sheet
                    .spreadsheet_id
                    .resolve(&format!("sheets[{idx}].spreadsheet_id"), env)?,
                sheet_name: sheet
                    .sheet_name
                    .resolve(&format!("sheets[{idx}].sheet_name"), env)?,
                kind: sheet.kind,
            });
        }
        Ok(Settings {
            calendar: self.calendar,
            schedule: self.schedule.clone(),
            window_days: self.window_days,
            on_sheet_error: self.on_sheet_error,
            credentials: self.credentials.resolve("credentials", env)?,
            notification,
            sheets,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default = "default_schedule")]
    schedule: String,
    #[serde(default = "default_window_days")]
    window_days: u32,
    #[serde(default)]
    on_sheet_error: SheetFailurePolicy,
    credentials: ValueRef,
    notification: RawNotification,
    sheets: Vec<RawSheet>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNotification {
    topic: ValueRef,
    #[serde(default)]
    server: Option<ValueRef>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSheet {
    spreadsheet_id: ValueRef,
    sheet_name: ValueRef,
    #[serde(default)]
    kind: SheetKind,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_schedule() -> String {
    DEFAULT_SCHEDULE.to_string()
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValueMap {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    env: Option<String>,
}

impl ValueRef {
    fn from_map(map: ValueMap) -> Result<Self, String> {
        match (map.value, map.env) {
            (Some(value), None) => Ok(ValueRef::Literal(value)),
            (None, Some(env)) => Ok(ValueRef::Env(env)),
            (Some(_), Some(_)) => Err("value reference must specify only one source".into()),
            (None, None) => Err("value reference must specify 'value' or 'env'".into()),
        }
    }
}

impl<'de> Deserialize<'de> for ValueRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueRefVisitor;

        impl<'de> Visitor<'de> for ValueRefVisitor {
            type Value = ValueRef;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or a map with 'value' or 'env'")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                Ok(ValueRef::Literal(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                Ok(ValueRef::Literal(v))
            }

            // unquoted ids such as `sheet_name: 2024` arrive as numbers
            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                Ok(ValueRef::Literal(v.to_string()))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: DeError,
            {
                Ok(ValueRef::Literal(v.to_string()))
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let value_map = ValueMap::deserialize(MapAccessDeserializer::new(map))?;
                ValueRef::from_map(value_map).map_err(A::Error::custom)
            }
        }

        deserializer.deserialize_any(ValueRefVisitor)
    }
}
