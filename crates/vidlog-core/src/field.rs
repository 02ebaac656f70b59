//! The canonical field vocabulary and the typed values the engine writes.
//!
//! Field names are shared by the extraction oracle's JSON schema, spreadsheet
//! column mapping, and the audit log, so each field has exactly one wire name
//! (camelCase, e.g. `watchTimeSeconds`).

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
  Error,
  parse::{
    DateOrder, parse_count_value, parse_date_value, parse_duration_value,
    parse_hashtags_value, parse_text_value, parse_watch_time_value,
  },
  video::Platform,
};

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Which kind of input produced a write.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Source {
  /// Direct edits made through the API.
  Manual,
  /// A text or voice log run through the extraction oracle.
  Transcript,
  /// A spreadsheet row.
  Import,
  /// The video-platform sync client.
  Sync,
}

// ─── Field names ─────────────────────────────────────────────────────────────

/// Core attributes stored on the video itself.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum VideoField {
  Title,
  PostedAt,
  Duration,
}

/// Creator-supplied narrative metadata.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ManualField {
  Hook,
  Caption,
  Hashtags,
  Topic,
  Format,
  CallToAction,
  TargetAudience,
  Rationale,
  Notes,
}

/// Per-platform performance counters.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum MetricField {
  Views,
  Likes,
  Comments,
  Shares,
  Saves,
  WatchTimeSeconds,
  FollowersGained,
}

impl VideoField {
  /// The SQL column backing this field.
  pub fn column(self) -> &'static str {
    match self {
      Self::Title => "title",
      Self::PostedAt => "published_on",
      Self::Duration => "duration_seconds",
    }
  }

  pub fn parse_value(self, raw: &Value, order: DateOrder) -> Option<FieldValue> {
    match self {
      Self::Title => parse_text_value(raw).map(FieldValue::Text),
      Self::PostedAt => parse_date_value(raw, order).map(FieldValue::Date),
      Self::Duration => parse_duration_value(raw).map(FieldValue::Count),
    }
  }
}

impl ManualField {
  pub fn column(self) -> &'static str {
    match self {
      Self::Hook => "hook",
      Self::Caption => "caption",
      Self::Hashtags => "hashtags",
      Self::Topic => "topic",
      Self::Format => "format",
      Self::CallToAction => "call_to_action",
      Self::TargetAudience => "target_audience",
      Self::Rationale => "rationale",
      Self::Notes => "notes",
    }
  }

  pub fn parse_value(self, raw: &Value) -> Option<FieldValue> {
    match self {
      Self::Hashtags => parse_hashtags_value(raw).map(FieldValue::List),
      _ => parse_text_value(raw).map(FieldValue::Text),
    }
  }
}

impl MetricField {
  pub fn column(self) -> &'static str {
    match self {
      Self::Views => "views",
      Self::Likes => "likes",
      Self::Comments => "comments",
      Self::Shares => "shares",
      Self::Saves => "saves",
      Self::WatchTimeSeconds => "watch_time_seconds",
      Self::FollowersGained => "followers_gained",
    }
  }

  pub fn parse_value(self, raw: &Value) -> Option<FieldValue> {
    match self {
      Self::WatchTimeSeconds => parse_watch_time_value(raw).map(FieldValue::Count),
      _ => parse_count_value(raw).map(FieldValue::Count),
    }
  }
}

// ─── Canonical (import) fields ───────────────────────────────────────────────

/// Every target a spreadsheet column can be mapped onto.
///
/// `Platform` and `ExternalId` route a row rather than being merged as
/// values: they pick the metrics row and the video respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
  Video(VideoField),
  Manual(ManualField),
  Metric(MetricField),
  Platform,
  ExternalId,
}

impl CanonicalField {
  /// All canonical fields in a stable order.
  pub fn all() -> Vec<CanonicalField> {
    let mut fields: Vec<CanonicalField> =
      VideoField::iter().map(Self::Video).collect();
    fields.push(Self::ExternalId);
    fields.push(Self::Platform);
    fields.extend(MetricField::iter().map(Self::Metric));
    fields.extend(ManualField::iter().map(Self::Manual));
    fields
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Video(f) => f.into(),
      Self::Manual(f) => f.into(),
      Self::Metric(f) => f.into(),
      Self::Platform => "platform",
      Self::ExternalId => "externalId",
    }
  }
}

impl fmt::Display for CanonicalField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for CanonicalField {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    match s {
      "platform" => return Ok(Self::Platform),
      "externalId" => return Ok(Self::ExternalId),
      _ => {}
    }
    if let Ok(f) = VideoField::from_str(s) {
      return Ok(Self::Video(f));
    }
    if let Ok(f) = ManualField::from_str(s) {
      return Ok(Self::Manual(f));
    }
    if let Ok(f) = MetricField::from_str(s) {
      return Ok(Self::Metric(f));
    }
    Err(Error::UnknownField(s.to_string()))
  }
}

impl Serialize for CanonicalField {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(self.name())
  }
}

impl<'de> Deserialize<'de> for CanonicalField {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A parsed, canonical field value. Serialises to plain JSON (`12000`,
/// `"text"`, `["#a"]`, `"2024-03-05"`) for audit entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
  Count(u64),
  Text(String),
  List(Vec<String>),
  Date(NaiveDate),
}

impl FieldValue {
  pub fn to_json(&self) -> Value {
    match self {
      Self::Count(n) => Value::from(*n),
      Self::Text(s) => Value::from(s.as_str()),
      Self::List(items) => Value::from(items.clone()),
      Self::Date(d) => Value::from(d.format("%Y-%m-%d").to_string()),
    }
  }
}

/// A partial update: only the fields present are written.
pub type Patch<F> = BTreeMap<F, FieldValue>;

// ─── Field sets ──────────────────────────────────────────────────────────────

/// Raw, not-yet-parsed input for one video, namespaced by target entity.
///
/// Values are arbitrary JSON as received (strings from spreadsheets, mixed
/// strings and numbers from the oracle). `null` means "not provided".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub video:   BTreeMap<VideoField, Value>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub manual:  BTreeMap<ManualField, Value>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metrics: BTreeMap<Platform, BTreeMap<MetricField, Value>>,
}

impl FieldSet {
  /// True if no namespace carries a non-null value.
  pub fn is_empty(&self) -> bool {
    self.video.values().all(Value::is_null)
      && self.manual.values().all(Value::is_null)
      && self
        .metrics
        .values()
        .all(|m| m.values().all(Value::is_null))
  }
}
