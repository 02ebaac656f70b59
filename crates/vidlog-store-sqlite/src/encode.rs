//! Encoding and decoding helpers between the domain types and the plain
//! SQLite column representations.
//!
//! Timestamps are RFC 3339 strings with fixed microsecond precision, so
//! they sort lexically. Calendar dates are `YYYY-MM-DD`. Enums use their
//! wire names. Lists and free-form payloads are compact JSON. UUIDs are
//! hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Row, types::Value as SqlValue};
use uuid::Uuid;
use vidlog_core::{
  audit::AuditLogEntry,
  field::FieldValue,
  import::{ImportBatch, ImportRow},
  log::{LogEntry, Transcript},
  video::{ManualFields, PlatformMetrics, Video},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Decode any strum-backed enum from its stored wire name.
pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::Decode { column, value: s.to_string() })
}

fn decode_count(column: &'static str, n: Option<i64>) -> Result<Option<u64>> {
  n.map(|n| {
    u64::try_from(n).map_err(|_| Error::Decode { column, value: n.to_string() })
  })
  .transpose()
}

/// Counts are stored as SQLite integers; anything past `i64::MAX` is
/// rejected rather than clamped.
pub fn encode_count(column: &'static str, n: u64) -> Result<i64> {
  i64::try_from(n).map_err(|_| Error::OutOfRange { column, value: n })
}

/// Bind value for a single field column.
pub fn encode_field_value(column: &'static str, value: &FieldValue) -> Result<SqlValue> {
  Ok(match value {
    FieldValue::Count(n) => SqlValue::Integer(encode_count(column, *n)?),
    FieldValue::Text(s) => SqlValue::Text(s.clone()),
    FieldValue::List(items) => SqlValue::Text(serde_json::to_string(items)?),
    FieldValue::Date(d) => SqlValue::Text(encode_date(*d)),
  })
}

pub fn encode_json(value: &serde_json::Value) -> String { value.to_string() }

fn decode_json(s: &str) -> Result<serde_json::Value> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const VIDEO_COLUMNS: &str = "video_id, external_id, title, published_on, \
                                 duration_seconds, origin, created_at, updated_at";

/// Raw values read directly from a `videos` row.
pub struct RawVideo {
  pub video_id:         String,
  pub external_id:      Option<String>,
  pub title:            String,
  pub published_on:     Option<String>,
  pub duration_seconds: Option<i64>,
  pub origin:           String,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawVideo {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      video_id:         row.get(0)?,
      external_id:      row.get(1)?,
      title:            row.get(2)?,
      published_on:     row.get(3)?,
      duration_seconds: row.get(4)?,
      origin:           row.get(5)?,
      created_at:       row.get(6)?,
      updated_at:       row.get(7)?,
    })
  }

  pub fn into_video(self) -> Result<Video> {
    Ok(Video {
      video_id:         decode_uuid(&self.video_id)?,
      external_id:      self.external_id,
      title:            self.title,
      published_on:     self.published_on.as_deref().map(decode_date).transpose()?,
      duration_seconds: decode_count("duration_seconds", self.duration_seconds)?,
      origin:           decode_enum("origin", &self.origin)?,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

pub const MANUAL_COLUMNS: &str = "video_id, hook, caption, hashtags, topic, format, \
                                  call_to_action, target_audience, rationale, notes, \
                                  updated_at";

pub struct RawManualFields {
  pub video_id:        String,
  pub hook:            Option<String>,
  pub caption:         Option<String>,
  pub hashtags:        Option<String>,
  pub topic:           Option<String>,
  pub format:          Option<String>,
  pub call_to_action:  Option<String>,
  pub target_audience: Option<String>,
  pub rationale:       Option<String>,
  pub notes:           Option<String>,
  pub updated_at:      String,
}

impl RawManualFields {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      video_id:        row.get(0)?,
      hook:            row.get(1)?,
      caption:         row.get(2)?,
      hashtags:        row.get(3)?,
      topic:           row.get(4)?,
      format:          row.get(5)?,
      call_to_action:  row.get(6)?,
      target_audience: row.get(7)?,
      rationale:       row.get(8)?,
      notes:           row.get(9)?,
      updated_at:      row.get(10)?,
    })
  }

  pub fn into_manual_fields(self) -> Result<ManualFields> {
    let hashtags = self
      .hashtags
      .as_deref()
      .map(serde_json::from_str::<Vec<String>>)
      .transpose()?;
    Ok(ManualFields {
      video_id: decode_uuid(&self.video_id)?,
      hook: self.hook,
      caption: self.caption,
      hashtags,
      topic: self.topic,
      format: self.format,
      call_to_action: self.call_to_action,
      target_audience: self.target_audience,
      rationale: self.rationale,
      notes: self.notes,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const METRICS_COLUMNS: &str = "metrics_id, video_id, platform, views, likes, comments, \
                                   shares, saves, watch_time_seconds, followers_gained, \
                                   source, log_id, updated_at";

pub struct RawMetrics {
  pub metrics_id:         String,
  pub video_id:           String,
  pub platform:           String,
  pub views:              Option<i64>,
  pub likes:              Option<i64>,
  pub comments:           Option<i64>,
  pub shares:             Option<i64>,
  pub saves:              Option<i64>,
  pub watch_time_seconds: Option<i64>,
  pub followers_gained:   Option<i64>,
  pub source:             String,
  pub log_id:             Option<String>,
  pub updated_at:         String,
}

impl RawMetrics {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      metrics_id:         row.get(0)?,
      video_id:           row.get(1)?,
      platform:           row.get(2)?,
      views:              row.get(3)?,
      likes:              row.get(4)?,
      comments:           row.get(5)?,
      shares:             row.get(6)?,
      saves:              row.get(7)?,
      watch_time_seconds: row.get(8)?,
      followers_gained:   row.get(9)?,
      source:             row.get(10)?,
      log_id:             row.get(11)?,
      updated_at:         row.get(12)?,
    })
  }

  pub fn into_metrics(self) -> Result<PlatformMetrics> {
    Ok(PlatformMetrics {
      metrics_id:         decode_uuid(&self.metrics_id)?,
      video_id:           decode_uuid(&self.video_id)?,
      platform:           decode_enum("platform", &self.platform)?,
      views:              decode_count("views", self.views)?,
      likes:              decode_count("likes", self.likes)?,
      comments:           decode_count("comments", self.comments)?,
      shares:             decode_count("shares", self.shares)?,
      saves:              decode_count("saves", self.saves)?,
      watch_time_seconds: decode_count("watch_time_seconds", self.watch_time_seconds)?,
      followers_gained:   decode_count("followers_gained", self.followers_gained)?,
      source:             decode_enum("source", &self.source)?,
      log_id:             decode_opt_uuid(self.log_id)?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

pub const LOG_COLUMNS: &str = "log_id, kind, raw_text, audio_ref, status, video_id, error, \
                               actor_id, created_at, updated_at";

pub struct RawLogEntry {
  pub log_id:     String,
  pub kind:       String,
  pub raw_text:   Option<String>,
  pub audio_ref:  Option<String>,
  pub status:     String,
  pub video_id:   Option<String>,
  pub error:      Option<String>,
  pub actor_id:   String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawLogEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      log_id:     row.get(0)?,
      kind:       row.get(1)?,
      raw_text:   row.get(2)?,
      audio_ref:  row.get(3)?,
      status:     row.get(4)?,
      video_id:   row.get(5)?,
      error:      row.get(6)?,
      actor_id:   row.get(7)?,
      created_at: row.get(8)?,
      updated_at: row.get(9)?,
    })
  }

  pub fn into_log_entry(self) -> Result<LogEntry> {
    Ok(LogEntry {
      log_id:     decode_uuid(&self.log_id)?,
      kind:       decode_enum("kind", &self.kind)?,
      raw_text:   self.raw_text,
      audio_ref:  self.audio_ref,
      status:     decode_enum("status", &self.status)?,
      video_id:   decode_opt_uuid(self.video_id)?,
      error:      self.error,
      actor_id:   self.actor_id,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const TRANSCRIPT_COLUMNS: &str =
  "transcript_id, log_id, raw_text, extracted, confidence, created_at";

pub struct RawTranscript {
  pub transcript_id: String,
  pub log_id:        String,
  pub raw_text:      String,
  pub extracted:     String,
  pub confidence:    String,
  pub created_at:    String,
}

impl RawTranscript {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transcript_id: row.get(0)?,
      log_id:        row.get(1)?,
      raw_text:      row.get(2)?,
      extracted:     row.get(3)?,
      confidence:    row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_transcript(self) -> Result<Transcript> {
    Ok(Transcript {
      transcript_id: decode_uuid(&self.transcript_id)?,
      log_id:        decode_uuid(&self.log_id)?,
      raw_text:      self.raw_text,
      extracted:     decode_json(&self.extracted)?,
      confidence:    decode_json(&self.confidence)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const AUDIT_COLUMNS: &str = "audit_id, entity_type, entity_id, field, old_value, \
                                 new_value, source, actor_id, recorded_at";

pub struct RawAudit {
  pub audit_id:    String,
  pub entity_type: String,
  pub entity_id:   String,
  pub field:       String,
  pub old_value:   Option<String>,
  pub new_value:   String,
  pub source:      String,
  pub actor_id:    String,
  pub recorded_at: String,
}

impl RawAudit {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      audit_id:    row.get(0)?,
      entity_type: row.get(1)?,
      entity_id:   row.get(2)?,
      field:       row.get(3)?,
      old_value:   row.get(4)?,
      new_value:   row.get(5)?,
      source:      row.get(6)?,
      actor_id:    row.get(7)?,
      recorded_at: row.get(8)?,
    })
  }

  pub fn into_audit(self) -> Result<AuditLogEntry> {
    Ok(AuditLogEntry {
      audit_id:    decode_uuid(&self.audit_id)?,
      entity_type: decode_enum("entity_type", &self.entity_type)?,
      entity_id:   decode_uuid(&self.entity_id)?,
      field:       self.field,
      old_value:   self.old_value.as_deref().map(decode_json).transpose()?,
      new_value:   decode_json(&self.new_value)?,
      source:      decode_enum("source", &self.source)?,
      actor_id:    self.actor_id,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

pub const BATCH_COLUMNS: &str = "batch_id, version, file_name, content_sha256, row_count, \
                                 column_count, actor_id, uploaded_at";

pub struct RawImportBatch {
  pub batch_id:       String,
  pub version:        i64,
  pub file_name:      Option<String>,
  pub content_sha256: String,
  pub row_count:      i64,
  pub column_count:   i64,
  pub actor_id:       String,
  pub uploaded_at:    String,
}

impl RawImportBatch {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      batch_id:       row.get(0)?,
      version:        row.get(1)?,
      file_name:      row.get(2)?,
      content_sha256: row.get(3)?,
      row_count:      row.get(4)?,
      column_count:   row.get(5)?,
      actor_id:       row.get(6)?,
      uploaded_at:    row.get(7)?,
    })
  }

  pub fn into_batch(self) -> Result<ImportBatch> {
    let count = |column, n| decode_count(column, Some(n)).map(Option::unwrap_or_default);
    Ok(ImportBatch {
      batch_id:       decode_uuid(&self.batch_id)?,
      version:        count("version", self.version)?,
      file_name:      self.file_name,
      content_sha256: self.content_sha256,
      row_count:      count("row_count", self.row_count)?,
      column_count:   count("column_count", self.column_count)?,
      actor_id:       self.actor_id,
      uploaded_at:    decode_dt(&self.uploaded_at)?,
    })
  }
}

pub const IMPORT_ROW_COLUMNS: &str = "row_id, batch_id, row_index, video_id, raw, created_at";

pub struct RawImportRow {
  pub row_id:     String,
  pub batch_id:   String,
  pub row_index:  i64,
  pub video_id:   Option<String>,
  pub raw:        String,
  pub created_at: String,
}

impl RawImportRow {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      row_id:     row.get(0)?,
      batch_id:   row.get(1)?,
      row_index:  row.get(2)?,
      video_id:   row.get(3)?,
      raw:        row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_import_row(self) -> Result<ImportRow> {
    Ok(ImportRow {
      row_id:     decode_uuid(&self.row_id)?,
      batch_id:   decode_uuid(&self.batch_id)?,
      row_index:  decode_count("row_index", Some(self.row_index))?.unwrap_or_default(),
      video_id:   decode_opt_uuid(self.video_id)?,
      raw:        decode_json(&self.raw)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
