//! Human-readable interval resolution.
//!
//! Turns expressions such as `"5 minutes"`, `"1.5 hours"` or
//! `"2 days, 4 hours and 30 minutes"` into a [`Duration`]. A bare number is
//! read as milliseconds. Resolution is pure and stateless, so it is repeated
//! every time a job is rescheduled.

use std::time::Duration;

use thiserror::Error;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60.0 * MS_PER_SECOND;
const MS_PER_HOUR: f64 = 60.0 * MS_PER_MINUTE;
const MS_PER_DAY: f64 = 24.0 * MS_PER_HOUR;
const MS_PER_WEEK: f64 = 7.0 * MS_PER_DAY;
const MS_PER_MONTH: f64 = 30.0 * MS_PER_DAY;
const MS_PER_YEAR: f64 = 365.0 * MS_PER_DAY;

/// Why an interval expression could not be resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval expression is empty")]
    Empty,

    #[error("invalid number {0:?} in interval expression")]
    InvalidNumber(String),

    #[error("unknown time unit {0:?} in interval expression")]
    UnknownUnit(String),

    #[error("number {0:?} is missing a time unit")]
    MissingUnit(String),

    #[error("interval {0:?} resolves to zero milliseconds")]
    Zero(String),

    #[error("interval {0:?} is too large")]
    Overflow(String),
}

/// Resolve a human interval expression into a duration with millisecond
/// precision.
pub fn resolve(expr: &str) -> Result<Duration, IntervalError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(IntervalError::Empty);
    }

    // Bare milliseconds ("1500").
    if let Ok(ms) = trimmed.parse::<u64>() {
        if ms == 0 {
            return Err(IntervalError::Zero(expr.to_string()));
        }
        return Ok(Duration::from_millis(ms));
    }

    let tokens = tokenize(trimmed);
    let mut total_ms = 0.0_f64;
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        let amount = parse_number(token)?;
        let unit = iter
            .next()
            .ok_or_else(|| IntervalError::MissingUnit(token.clone()))?;
        total_ms += amount * unit_ms(unit)?;
    }

    if !total_ms.is_finite() || total_ms > u64::MAX as f64 {
        return Err(IntervalError::Overflow(expr.to_string()));
    }

    let ms = total_ms.round() as u64;
    if ms == 0 {
        return Err(IntervalError::Zero(expr.to_string()));
    }
    Ok(Duration::from_millis(ms))
}

/// Lowercase, drop separators and split words at every number/letter
/// boundary: `"5minutes"` becomes `["5", "minutes"]`, `"1h30m"` becomes
/// `["1", "h", "30", "m"]`.
fn tokenize(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for word in expr
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty() && *w != "and")
    {
        let mut start = 0;
        let mut chars = word.char_indices().peekable();
        while let Some((_, c)) = chars.next() {
            if let Some(&(i, next)) = chars.peek() {
                if c.is_ascii_alphabetic() != next.is_ascii_alphabetic() {
                    tokens.push(word[start..i].to_string());
                    start = i;
                }
            }
        }
        tokens.push(word[start..].to_string());
    }

    tokens
}

fn parse_number(token: &str) -> Result<f64, IntervalError> {
    let value = match token {
        "a" | "an" | "one" => 1.0,
        "two" => 2.0,
        "three" => 3.0,
        "four" => 4.0,
        "five" => 5.0,
        "six" => 6.0,
        "seven" => 7.0,
        "eight" => 8.0,
        "nine" => 9.0,
        "ten" => 10.0,
        other => other
            .parse::<f64>()
            .map_err(|_| IntervalError::InvalidNumber(other.to_string()))?,
    };

    if !value.is_finite() || value < 0.0 {
        return Err(IntervalError::InvalidNumber(token.to_string()));
    }
    Ok(value)
}

fn unit_ms(unit: &str) -> Result<f64, IntervalError> {
    let ms = match unit {
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => MS_PER_SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => MS_PER_MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => MS_PER_HOUR,
        "d" | "day" | "days" => MS_PER_DAY,
        "w" | "wk" | "wks" | "week" | "weeks" => MS_PER_WEEK,
        "mo" | "month" | "months" => MS_PER_MONTH,
        "y" | "yr" | "yrs" | "year" | "years" => MS_PER_YEAR,
        other => return Err(IntervalError::UnknownUnit(other.to_string())),
    };
    Ok(ms)
}
