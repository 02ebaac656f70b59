//! Value parsers: raw scalar input → canonical numeric / ISO forms.
//!
//! Every parser is total. `None` means "unparsable" and is never conflated
//! with zero: a count of `"0"` parses to `Some(0)`, a count of `"abc"` to
//! `None`. Callers decide what to do with unparsable input (the
//! reconciliation engine drops it from the update).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Counts ──────────────────────────────────────────────────────────────────

/// Parse a count such as `"1.2k"`, `"12,000"`, `"3M"` or `500`.
///
/// Thousands separators are stripped, a case-insensitive `k` / `m` suffix
/// scales the number, and the result is rounded to the nearest integer.
/// Negative and non-finite values are unparsable.
pub fn parse_count(raw: &str) -> Option<u64> {
  let cleaned: String = raw
    .trim()
    .chars()
    .filter(|c| *c != ',' && !c.is_whitespace())
    .collect();
  if cleaned.is_empty() {
    return None;
  }

  let (number, multiplier) = match cleaned.chars().last() {
    Some('k' | 'K') => (&cleaned[..cleaned.len() - 1], 1_000.0),
    Some('m' | 'M') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
    _ => (cleaned.as_str(), 1.0),
  };

  let value: f64 = number.parse().ok()?;
  count_from_f64(value * multiplier)
}

/// [`parse_count`] over a JSON value; numbers are taken as-is, strings are
/// parsed, everything else is unparsable.
pub fn parse_count_value(raw: &Value) -> Option<u64> {
  match raw {
    Value::Number(n) => count_from_f64(n.as_f64()?),
    Value::String(s) => parse_count(s),
    _ => None,
  }
}

/// Largest count or duration the store can hold (`i64::MAX`).
pub const MAX_COUNT: u64 = i64::MAX as u64;

fn count_from_f64(value: f64) -> Option<u64> {
  if !value.is_finite() || value < 0.0 {
    return None;
  }
  let rounded = value.round();
  // `i64::MAX as f64` rounds up to 2^63, which is itself out of range.
  (rounded < i64::MAX as f64).then_some(rounded as u64)
}

fn within_range(n: u64) -> Option<u64> { (n <= MAX_COUNT).then_some(n) }

// ─── Durations ───────────────────────────────────────────────────────────────

/// Parse a duration in seconds from raw seconds, `MM:SS` or `HH:MM:SS`.
pub fn parse_duration(raw: &str) -> Option<u64> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }

  let parts: Vec<&str> = raw.split(':').collect();
  let numbers: Vec<u64> = parts
    .iter()
    .map(|p| {
      if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
        None
      } else {
        p.parse().ok()
      }
    })
    .collect::<Option<_>>()?;

  let total = match numbers.as_slice() {
    [seconds] => Some(*seconds),
    [minutes, seconds] if *seconds < 60 => minutes.checked_mul(60)?.checked_add(*seconds),
    [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => hours
      .checked_mul(3_600)?
      .checked_add(minutes * 60 + seconds),
    _ => None,
  };
  total.and_then(within_range)
}

/// [`parse_duration`] over a JSON value. Numeric input must be a
/// non-negative whole number of seconds.
pub fn parse_duration_value(raw: &Value) -> Option<u64> {
  match raw {
    Value::Number(n) => n.as_u64().and_then(within_range),
    Value::String(s) => parse_duration(s),
    _ => None,
  }
}

/// Watch time: duration forms first (`"1:32:00"`), then count forms
/// (`"1.2k"`, `92.6`). Always whole seconds.
pub fn parse_watch_time_value(raw: &Value) -> Option<u64> {
  match raw {
    Value::String(s) => parse_duration(s).or_else(|| parse_count(s)),
    other => parse_count_value(other),
  }
}

// ─── Dates ───────────────────────────────────────────────────────────────────

/// How to read a numeric date whose first two parts could both be a month.
///
/// `03/05/2024` is March 5th under [`DateOrder::MonthFirst`] and May 3rd
/// under [`DateOrder::DayFirst`]. Unambiguous inputs (`13/05/2024`,
/// `2024/03/05`) parse identically under both.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
  #[default]
  MonthFirst,
  DayFirst,
}

const NATIVE_DATE_FORMATS: &[&str] = &[
  "%B %d, %Y",
  "%b %d, %Y",
  "%B %d %Y",
  "%b %d %Y",
  "%d %B %Y",
  "%d %b %Y",
];

const NATIVE_DATETIME_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S",
];

/// Parse a date in any of the accepted shapes.
pub fn parse_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  parse_native_date(raw).or_else(|| parse_numeric_date(raw, order))
}

/// Canonicalise `raw` to `YYYY-MM-DD`, or return it unchanged if it cannot
/// be read as a date.
pub fn normalize_date(raw: &str, order: DateOrder) -> String {
  match parse_date(raw, order) {
    Some(date) => date.format("%Y-%m-%d").to_string(),
    None => raw.to_string(),
  }
}

/// [`parse_date`] over a JSON value; only strings can be dates.
pub fn parse_date_value(raw: &Value, order: DateOrder) -> Option<NaiveDate> {
  raw.as_str().and_then(|s| parse_date(s, order))
}

fn parse_native_date(raw: &str) -> Option<NaiveDate> {
  // chrono's `%Y` accepts any digit count, so `03-05-24` would otherwise be
  // read as year 3. ISO shapes need a four-digit year up front.
  let iso_shaped = raw.len() >= 5
    && raw.as_bytes()[..4].iter().all(u8::is_ascii_digit)
    && raw.as_bytes()[4] == b'-';
  if iso_shaped {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
      return Some(dt.date_naive());
    }
    for format in NATIVE_DATETIME_FORMATS {
      if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(dt.date());
      }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
      return Some(date);
    }
  }
  NATIVE_DATE_FORMATS
    .iter()
    .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Split on `/`, `-` or `.` into three numbers and disambiguate.
///
/// A part greater than 31 is the year. Otherwise the year is the last part
/// and `order` decides between month-first and day-first. Two-digit years
/// are taken as 20xx.
fn parse_numeric_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
  let parts: Vec<u32> = raw
    .split(['/', '-', '.'])
    .map(|p| {
      let p = p.trim();
      if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
        None
      } else {
        p.parse().ok()
      }
    })
    .collect::<Option<_>>()?;
  let [a, b, c] = parts.as_slice() else {
    return None;
  };
  let (a, b, c) = (*a, *b, *c);

  let (year, month, day) = if a > 31 {
    // YYYY/MM/DD
    (a, b, c)
  } else {
    let (month, day) = match order {
      DateOrder::MonthFirst if a <= 12 => (a, b),
      DateOrder::MonthFirst => (b, a),
      DateOrder::DayFirst if b <= 12 => (b, a),
      DateOrder::DayFirst => (a, b),
    };
    (c, month, day)
  };

  let year = if year < 100 { 2000 + year } else { year };
  NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

// ─── Text ────────────────────────────────────────────────────────────────────

/// Trimmed, non-empty text. Numbers and booleans are rendered as text;
/// arrays, objects and `null` are not text.
pub fn parse_text_value(raw: &Value) -> Option<String> {
  let text = match raw {
    Value::String(s) => s.trim().to_string(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    _ => return None,
  };
  (!text.is_empty()).then_some(text)
}

/// Hashtags from a JSON array of strings or a single delimited string.
///
/// Each tag is trimmed and carries exactly one leading `#`; order is
/// preserved and duplicates (case-insensitive) removed. An input with no
/// usable tags is unparsable.
pub fn parse_hashtags_value(raw: &Value) -> Option<Vec<String>> {
  let pieces: Vec<String> = match raw {
    Value::String(s) => s
      .split(|c: char| c == ',' || c.is_whitespace())
      .map(str::to_string)
      .collect(),
    Value::Array(items) => items
      .iter()
      .map(|v| v.as_str().map(str::to_string))
      .collect::<Option<_>>()?,
    _ => return None,
  };

  let mut tags: Vec<String> = Vec::new();
  for piece in pieces {
    let bare = piece.trim().trim_start_matches('#');
    if bare.is_empty() {
      continue;
    }
    let tag = format!("#{bare}");
    if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
      tags.push(tag);
    }
  }
  (!tags.is_empty()).then_some(tags)
}
