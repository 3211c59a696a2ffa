use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single nullable column value as read from, and written back to, the database.
///
/// Variants mirror what the MySQL binary protocol hands back so a row can be
/// copied from one table to another without a lossy round trip through text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Uint(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    DateTime(DateTimeValue),
    Time(TimeValue),
}

/// `DATE`/`DATETIME`/`TIMESTAMP` parts as sent on the wire. Kept raw because
/// MySQL accepts zero dates that chrono cannot represent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateTimeValue {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub micros: u32,
}

impl DateTimeValue {
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_micro_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
            self.micros,
        )
    }
}

impl From<NaiveDateTime> for DateTimeValue {
    fn from(ts: NaiveDateTime) -> Self {
        use chrono::{Datelike, Timelike};
        DateTimeValue {
            year: ts.year() as u16,
            month: ts.month() as u8,
            day: ts.day() as u8,
            hour: ts.hour() as u8,
            minute: ts.minute() as u8,
            second: ts.second() as u8,
            micros: ts.and_utc().timestamp_subsec_micros(),
        }
    }
}

/// MySQL `TIME` values can be negative and exceed 24 hours, so they do not
/// fit into `chrono::NaiveTime`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeValue {
    pub negative: bool,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub micros: u32,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int(v) => Some(v.to_string()),
            Value::Uint(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Double(v) => Some(v.to_string()),
            Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
            Value::DateTime(dt) => Some(dt.to_string()),
            Value::Time(t) => Some(t.to_string()),
        }
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = u64::from(self.days) * 24 + u64::from(self.hours);
        write!(
            f,
            "{}{:02}:{:02}:{:02}.{:06}",
            if self.negative { "-" } else { "" },
            hours,
            self.minutes,
            self.seconds,
            self.micros
        )
    }
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.micros
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "'{s}'"),
                Err(_) => write!(f, "<{} bytes>", b.len()),
            },
            other => f.write_str(&other.as_string().unwrap_or_default()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Bytes(v.into_bytes())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_bytes_parse_as_integers() {
        assert_eq!(Value::from("42").as_i64(), Some(42));
        assert_eq!(Value::Uint(7).as_i64(), Some(7));
        assert_eq!(Value::Null.as_i64(), None);
    }

    #[test]
    fn time_values_render_total_hours() {
        let t = TimeValue {
            negative: true,
            days: 1,
            hours: 2,
            minutes: 3,
            seconds: 4,
            micros: 5,
        };
        assert_eq!(t.to_string(), "-26:03:04.000005");
    }

    #[test]
    fn zero_dates_survive_but_do_not_convert() {
        let zero = DateTimeValue {
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
            second: 0,
            micros: 0,
        };
        assert!(zero.to_naive().is_none());
        assert_eq!(zero.to_string(), "0000-00-00 00:00:00.000000");
    }

    #[test]
    fn naive_datetimes_round_trip_through_parts() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(23, 59, 58, 123_456)
            .unwrap();
        assert_eq!(DateTimeValue::from(ts).to_naive(), Some(ts));
    }

    #[test]
    fn options_map_none_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3_i64)), Value::Int(3));
    }
}
