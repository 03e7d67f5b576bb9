// Time expressions: relative "<n><unit>-ago" forms and absolute instants
use super::error::TimeSpecError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A range bound as written in a chart config, either epoch milliseconds or an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Epoch(i64),
    Expr(String),
}

impl From<&str> for TimeValue {
    fn from(value: &str) -> Self {
        TimeValue::Expr(value.to_string())
    }
}

impl From<i64> for TimeValue {
    fn from(value: i64) -> Self {
        TimeValue::Epoch(value)
    }
}

const RELATIVE_SUFFIX: &str = "-ago";

const ABSOLUTE_FORMATS: [&str; 2] = ["%Y/%m/%d-%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

fn unit_millis(unit: char) -> Option<i64> {
    match unit {
        's' => Some(1_000),
        'm' => Some(60_000),
        'h' => Some(3_600_000),
        'd' => Some(86_400_000),
        _ => None,
    }
}

/// Resolve a time value against `now`.
pub fn parse(value: &TimeValue, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeSpecError> {
    match value {
        TimeValue::Epoch(ms) => from_millis(*ms),
        TimeValue::Expr(expr) => parse_expr(expr, now),
    }
}

pub fn parse_expr(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeSpecError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TimeSpecError::Empty);
    }
    if expr.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    if expr.contains("ago") {
        return parse_relative(expr, now);
    }
    if expr.bytes().all(|b| b.is_ascii_digit()) {
        let ms = expr
            .parse::<i64>()
            .map_err(|_| TimeSpecError::Unrecognized(expr.to_string()))?;
        return from_millis(ms);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(expr) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ABSOLUTE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(expr, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(TimeSpecError::Unrecognized(expr.to_string()))
}

/// Parse "<integer><unit>-ago" and subtract it from `now`.
pub fn parse_relative(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeSpecError> {
    let malformed = || TimeSpecError::MalformedRelative(expr.to_string());

    let body = expr.strip_suffix(RELATIVE_SUFFIX).ok_or_else(malformed)?;
    let unit = body.chars().last().ok_or_else(malformed)?;
    let unit_ms = unit_millis(unit).ok_or_else(malformed)?;
    let amount: i64 = body[..body.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| malformed())?;
    if amount < 0 {
        return Err(malformed());
    }

    let offset = amount
        .checked_mul(unit_ms)
        .ok_or(TimeSpecError::OutOfRange(amount))?;
    now.checked_sub_signed(Duration::milliseconds(offset))
        .ok_or(TimeSpecError::OutOfRange(offset))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, TimeSpecError> {
    DateTime::from_timestamp_millis(ms).ok_or(TimeSpecError::OutOfRange(ms))
}
