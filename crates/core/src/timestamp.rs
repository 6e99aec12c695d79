use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::CoreError;
use crate::value::NativeValue;

/// Text layout of a stored timestamp, always in UTC.
pub const TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const PARSE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A point in time with millisecond precision.
///
/// Civil components are interpreted in a zone only at construction; the
/// value itself is zone-free.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Result<Self, CoreError> {
        DateTime::from_timestamp_millis(millis)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("{millis}ms is out of range")))
    }

    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn now() -> Self {
        let now = Utc::now().timestamp_millis();
        // Utc::now() is always in chrono's representable range.
        Self(DateTime::from_timestamp_millis(now).unwrap_or_default())
    }

    /// Build from civil components in the system default time zone.
    /// `month` and `day` are 1-based.
    pub fn from_local(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        millis: u32,
    ) -> Result<Self, CoreError> {
        Self::from_civil_in(&Local, year, month, day, hour, minute, second, millis)
    }

    /// Build from civil components in `tz`. Fails on a non-existent local
    /// time; ambiguous local times resolve to the earlier instant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_civil_in<Tz: TimeZone>(
        tz: &Tz,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        millis: u32,
    ) -> Result<Self, CoreError> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .filter(|_| millis < 1000)
            .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis))
            .ok_or_else(|| {
                CoreError::InvalidTimestamp(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{millis:03}"
                ))
            })?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("{naive} does not exist in the zone")))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Civil time in the system default zone.
    pub fn to_local(&self) -> NaiveDateTime {
        self.0.with_timezone(&Local).naive_local()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0.format(TEXT_FORMAT))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TEXT_FORMAT))
    }
}

/// Storage form of a timestamp: UTC text for four-digit years, integer
/// epoch milliseconds otherwise.
pub fn encode(ts: &Timestamp) -> NativeValue {
    let year = chrono::Datelike::year(&ts.0);
    if (0..=9999).contains(&year) {
        NativeValue::Text(ts.0.format(TEXT_FORMAT).to_string())
    } else {
        NativeValue::Integer(ts.as_millis())
    }
}

/// Inverse of [`encode`]. Also accepts `T`-separated text, text without
/// fractional seconds, and a bare date.
pub fn decode(value: &NativeValue) -> Result<Timestamp, CoreError> {
    match value {
        NativeValue::Integer(millis) => Timestamp::from_millis(*millis),
        NativeValue::Text(s) => parse_text(s),
        other => Err(CoreError::InvalidTimestamp(format!(
            "{} value is not a timestamp",
            other.type_name()
        ))),
    }
}

fn parse_text(s: &str) -> Result<Timestamp, CoreError> {
    let t = s.trim().trim_end_matches('Z');
    let naive = PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(t, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(t, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| CoreError::InvalidTimestamp(format!("cannot parse '{s}'")))?;
    // Sub-millisecond digits are dropped.
    Timestamp::from_millis(naive.and_utc().timestamp_millis())
}
