use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

pub const DEFAULT_TIMEZONE: &str = "Europe/Athens";

// offsets change on quarter-hour boundaries; a gap never spans a whole day
const MIDNIGHT_STEP_MINUTES: i64 = 15;
const MIDNIGHT_PROBES: i64 = 24 * 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// The canonical calendar every due date and "now" reference is read in.
///
/// Two instants on the same local day of this calendar are the same day,
/// whatever the host's timezone or the time of day they were taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    tz: Tz,
}

impl Calendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn from_name(name: &str) -> Result<Self, CalendarError> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Calendar day of `t` in the canonical timezone.
    pub fn day_of<T: TimeZone>(&self, t: &DateTime<T>) -> NaiveDate {
        t.with_timezone(&self.tz).date_naive()
    }

    /// Midnight of the canonical day containing `t`.
    pub fn normalize<T: TimeZone>(&self, t: &DateTime<T>) -> DateTime<Tz> {
        self.midnight(self.day_of(t))
    }

    /// First instant of `day`. Zones that skip midnight on a DST switch get
    /// the earliest valid local time of that day instead.
    pub fn midnight(&self, day: NaiveDate) -> DateTime<Tz> {
        let naive = day.and_time(NaiveTime::MIN);
        (0..MIDNIGHT_PROBES)
            .map(|step| naive + Duration::minutes(MIDNIGHT_STEP_MINUTES * step))
            .find_map(|local| self.tz.from_local_datetime(&local).earliest())
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Athens)
    }
}
