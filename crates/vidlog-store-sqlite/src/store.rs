//! [`SqliteStore`]: the SQLite implementation of [`TrackerStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params, params_from_iter, types::Value as SqlValue};
use tracing::debug;
use uuid::Uuid;

use vidlog_core::{
  audit::{AuditLogEntry, AuditQuery, NewAuditEntry},
  field::{ManualField, Patch, VideoField},
  import::{ImportBatch, ImportRow, NewImportBatch, NewImportRow},
  log::{LogEntry, LogQuery, LogStatus, LogTransition, NewLogEntry, NewTranscript, Transcript},
  store::{MetricsUpsert, TrackerStore},
  video::{ManualFields, NewVideo, Platform, PlatformMetrics, Video, VideoView},
};

use crate::{
  Error, Result,
  encode::{
    AUDIT_COLUMNS, BATCH_COLUMNS, IMPORT_ROW_COLUMNS, LOG_COLUMNS, MANUAL_COLUMNS,
    METRICS_COLUMNS, RawAudit, RawImportBatch, RawImportRow, RawLogEntry,
    RawManualFields, RawMetrics, RawTranscript, RawVideo, TRANSCRIPT_COLUMNS,
    VIDEO_COLUMNS, decode_enum, encode_count, encode_date, encode_dt,
    encode_field_value, encode_json, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A vidlog tracker store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn require_video(&self, id: Uuid) -> Result<Video> {
    self.get_video(id).await?.ok_or(Error::VideoNotFound(id))
  }
}

/// Bind values for a partial row write, in patch order.
fn patch_values<F: Copy>(
  patch: &Patch<F>,
  column: impl Fn(F) -> &'static str,
) -> Result<(Vec<&'static str>, Vec<SqlValue>)> {
  let mut columns = Vec::with_capacity(patch.len());
  let mut values = Vec::with_capacity(patch.len());
  for (field, value) in patch {
    let name = column(*field);
    columns.push(name);
    values.push(encode_field_value(name, value)?);
  }
  Ok((columns, values))
}

/// `INSERT … ON CONFLICT(<key>) DO UPDATE` touching only `columns` plus the
/// fixed trailing ones.
fn upsert_sql(table: &str, key: &str, fixed: &[&str], columns: &[&str]) -> String {
  let all: Vec<&str> = fixed.iter().chain(columns).copied().collect();
  let placeholders: Vec<String> = (1..=all.len()).map(|i| format!("?{i}")).collect();
  let updates: Vec<String> = all
    .iter()
    .filter(|c| !key.split(", ").any(|k| k == **c) && **c != "metrics_id")
    .map(|c| format!("{c} = excluded.{c}"))
    .collect();
  format!(
    "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT({key}) DO UPDATE SET {}",
    all.join(", "),
    placeholders.join(", "),
    updates.join(", "),
  )
}

// ─── TrackerStore impl ───────────────────────────────────────────────────────

impl TrackerStore for SqliteStore {
  type Error = Error;

  // ── Videos ────────────────────────────────────────────────────────────────

  async fn create_video(&self, input: NewVideo) -> Result<Video> {
    let now = Utc::now();
    let video = Video {
      video_id:         Uuid::new_v4(),
      external_id:      input.external_id,
      title:            input.title,
      published_on:     input.published_on,
      duration_seconds: input.duration_seconds,
      origin:           input.origin,
      created_at:       now,
      updated_at:       now,
    };

    let id_str       = encode_uuid(video.video_id);
    let external_id  = video.external_id.clone();
    let title        = video.title.clone();
    let published_on = video.published_on.map(encode_date);
    let duration     = video
      .duration_seconds
      .map(|d| encode_count("duration_seconds", d))
      .transpose()?;
    let origin       = video.origin.to_string();
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO videos ({VIDEO_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)"
          ),
          params![id_str, external_id, title, published_on, duration, origin, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(video)
  }

  async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawVideo> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE video_id = ?1"),
              params![id_str],
              RawVideo::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVideo::into_video).transpose()
  }

  async fn list_videos(&self) -> Result<Vec<Video>> {
    let raws: Vec<RawVideo> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map([], RawVideo::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVideo::into_video).collect()
  }

  async fn find_video_by_external_id(&self, external_id: String) -> Result<Option<Video>> {
    let raw: Option<RawVideo> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE external_id = ?1"),
              params![external_id],
              RawVideo::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVideo::into_video).transpose()
  }

  async fn update_video(&self, id: Uuid, patch: Patch<VideoField>) -> Result<Video> {
    let (columns, mut values) = patch_values(&patch, VideoField::column)?;
    values.push(SqlValue::Text(encode_dt(Utc::now())));
    values.push(SqlValue::Text(encode_uuid(id)));

    let sets: Vec<String> = columns
      .iter()
      .enumerate()
      .map(|(i, c)| format!("{c} = ?{}", i + 1))
      .collect();
    let n = columns.len();
    let sql = if sets.is_empty() {
      "UPDATE videos SET updated_at = ?1 WHERE video_id = ?2".to_string()
    } else {
      format!(
        "UPDATE videos SET {}, updated_at = ?{} WHERE video_id = ?{}",
        sets.join(", "),
        n + 1,
        n + 2,
      )
    };

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, params_from_iter(values.iter()))?))
      .await?;
    if changed == 0 {
      return Err(Error::VideoNotFound(id));
    }

    self.require_video(id).await
  }

  async fn set_external_id(&self, id: Uuid, external_id: String) -> Result<Video> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE videos SET external_id = ?1, updated_at = ?2 WHERE video_id = ?3",
          params![external_id, at_str, id_str],
        )?)
      })
      .await?;
    if changed == 0 {
      return Err(Error::VideoNotFound(id));
    }

    self.require_video(id).await
  }

  async fn delete_video(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM manual_fields WHERE video_id = ?1", params![id_str])?;
        tx.execute("DELETE FROM platform_metrics WHERE video_id = ?1", params![id_str])?;
        tx.execute(
          "UPDATE log_entries SET video_id = NULL WHERE video_id = ?1",
          params![id_str],
        )?;
        tx.execute(
          "UPDATE import_rows SET video_id = NULL WHERE video_id = ?1",
          params![id_str],
        )?;
        let n = tx.execute("DELETE FROM videos WHERE video_id = ?1", params![id_str])?;
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;

    if deleted {
      debug!(video_id = %id, "video deleted");
    }
    Ok(deleted)
  }

  // ── Manual fields ─────────────────────────────────────────────────────────

  async fn get_manual_fields(&self, video_id: Uuid) -> Result<Option<ManualFields>> {
    let id_str = encode_uuid(video_id);

    let raw: Option<RawManualFields> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {MANUAL_COLUMNS} FROM manual_fields WHERE video_id = ?1"),
              params![id_str],
              RawManualFields::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawManualFields::into_manual_fields).transpose()
  }

  async fn upsert_manual_fields(
    &self,
    video_id: Uuid,
    patch: Patch<ManualField>,
  ) -> Result<ManualFields> {
    self.require_video(video_id).await?;

    let (columns, field_values) = patch_values(&patch, ManualField::column)?;
    let sql = upsert_sql("manual_fields", "video_id", &["video_id", "updated_at"], &columns);
    let mut values = vec![
      SqlValue::Text(encode_uuid(video_id)),
      SqlValue::Text(encode_dt(Utc::now())),
    ];
    values.extend(field_values);
    let id_str = encode_uuid(video_id);

    let raw: RawManualFields = self
      .conn
      .call(move |conn| {
        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(conn.query_row(
          &format!("SELECT {MANUAL_COLUMNS} FROM manual_fields WHERE video_id = ?1"),
          params![id_str],
          RawManualFields::from_row,
        )?)
      })
      .await?;

    raw.into_manual_fields()
  }

  // ── Platform metrics ──────────────────────────────────────────────────────

  async fn get_metrics(
    &self,
    video_id: Uuid,
    platform: Platform,
  ) -> Result<Option<PlatformMetrics>> {
    let id_str = encode_uuid(video_id);
    let platform_str = platform.to_string();

    let raw: Option<RawMetrics> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {METRICS_COLUMNS} FROM platform_metrics
                 WHERE video_id = ?1 AND platform = ?2"
              ),
              params![id_str, platform_str],
              RawMetrics::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMetrics::into_metrics).transpose()
  }

  async fn list_metrics(&self, video_id: Uuid) -> Result<Vec<PlatformMetrics>> {
    let id_str = encode_uuid(video_id);

    let raws: Vec<RawMetrics> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {METRICS_COLUMNS} FROM platform_metrics
           WHERE video_id = ?1 ORDER BY platform"
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawMetrics::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMetrics::into_metrics).collect()
  }

  async fn upsert_metrics(&self, input: MetricsUpsert) -> Result<PlatformMetrics> {
    self.require_video(input.video_id).await?;

    let (columns, field_values) = patch_values(&input.patch, |f| f.column())?;
    let sql = upsert_sql(
      "platform_metrics",
      "video_id, platform",
      &["metrics_id", "video_id", "platform", "source", "log_id", "updated_at"],
      &columns,
    );
    let video_str = encode_uuid(input.video_id);
    let platform_str = input.platform.to_string();
    let mut values = vec![
      SqlValue::Text(encode_uuid(input.metrics_id)),
      SqlValue::Text(video_str.clone()),
      SqlValue::Text(platform_str.clone()),
      SqlValue::Text(input.source.to_string()),
      input
        .log_id
        .map(|id| SqlValue::Text(encode_uuid(id)))
        .unwrap_or(SqlValue::Null),
      SqlValue::Text(encode_dt(Utc::now())),
    ];
    values.extend(field_values);

    let raw: RawMetrics = self
      .conn
      .call(move |conn| {
        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(conn.query_row(
          &format!(
            "SELECT {METRICS_COLUMNS} FROM platform_metrics
             WHERE video_id = ?1 AND platform = ?2"
          ),
          params![video_str, platform_str],
          RawMetrics::from_row,
        )?)
      })
      .await?;

    raw.into_metrics()
  }

  async fn materialize(&self, video_id: Uuid) -> Result<Option<VideoView>> {
    let Some(video) = self.get_video(video_id).await? else {
      return Ok(None);
    };
    let manual = self.get_manual_fields(video_id).await?;
    let metrics = self.list_metrics(video_id).await?;
    Ok(Some(VideoView { video, manual, metrics }))
  }

  // ── Log entries & transcripts ─────────────────────────────────────────────

  async fn create_log_entry(&self, input: NewLogEntry) -> Result<LogEntry> {
    let now = Utc::now();
    let entry = LogEntry {
      log_id:     Uuid::new_v4(),
      kind:       input.kind,
      raw_text:   input.raw_text,
      audio_ref:  input.audio_ref,
      status:     LogStatus::Processing,
      video_id:   None,
      error:      None,
      actor_id:   input.actor_id,
      created_at: now,
      updated_at: now,
    };

    let id_str    = encode_uuid(entry.log_id);
    let kind      = entry.kind.to_string();
    let raw_text  = entry.raw_text.clone();
    let audio_ref = entry.audio_ref.clone();
    let status    = entry.status.to_string();
    let actor_id  = entry.actor_id.clone();
    let at_str    = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO log_entries ({LOG_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?7, ?7)"
          ),
          params![id_str, kind, raw_text, audio_ref, status, actor_id, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn get_log_entry(&self, id: Uuid) -> Result<Option<LogEntry>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawLogEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {LOG_COLUMNS} FROM log_entries WHERE log_id = ?1"),
              params![id_str],
              RawLogEntry::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLogEntry::into_log_entry).transpose()
  }

  async fn list_log_entries(&self, query: LogQuery) -> Result<Vec<LogEntry>> {
    let status = query.status.map(|s| s.to_string());
    // SQLite treats a negative LIMIT as "no limit".
    let limit = query.limit.map(|l| l as i64).unwrap_or(-1);

    let raws: Vec<RawLogEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LOG_COLUMNS} FROM log_entries
           WHERE (?1 IS NULL OR status = ?1)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(params![status, limit], RawLogEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLogEntry::into_log_entry).collect()
  }

  async fn transition_log_entry(&self, transition: LogTransition) -> Result<LogEntry> {
    let LogTransition { log_id, from, to, video_id, error } = transition;
    if !from.can_transition_to(to) {
      return Err(Error::InvalidTransition { log_id, from, to });
    }

    let id_str    = encode_uuid(log_id);
    let from_str  = from.to_string();
    let to_str    = to.to_string();
    let video_str = video_id.map(encode_uuid);
    let at_str    = encode_dt(Utc::now());

    let (changed, current): (usize, Option<String>) = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE log_entries
           SET status = ?1, video_id = COALESCE(?2, video_id), error = ?3, updated_at = ?4
           WHERE log_id = ?5 AND status = ?6",
          params![to_str, video_str, error, at_str, id_str, from_str],
        )?;
        let current = conn
          .query_row(
            "SELECT status FROM log_entries WHERE log_id = ?1",
            params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        Ok((changed, current))
      })
      .await?;

    let Some(current) = current else {
      return Err(Error::LogNotFound(log_id));
    };
    if changed == 0 {
      return Err(Error::StaleTransition {
        log_id,
        expected: from,
        actual: decode_enum("status", &current)?,
      });
    }

    debug!(%log_id, %from, %to, "log entry transitioned");
    self.get_log_entry(log_id).await?.ok_or(Error::LogNotFound(log_id))
  }

  async fn record_transcript(&self, input: NewTranscript) -> Result<Transcript> {
    let transcript = Transcript {
      transcript_id: Uuid::new_v4(),
      log_id:        input.log_id,
      raw_text:      input.raw_text,
      extracted:     input.extracted,
      confidence:    input.confidence,
      created_at:    Utc::now(),
    };

    let id_str     = encode_uuid(transcript.transcript_id);
    let log_str    = encode_uuid(transcript.log_id);
    let raw_text   = transcript.raw_text.clone();
    let extracted  = encode_json(&transcript.extracted);
    let confidence = encode_json(&transcript.confidence);
    let at_str     = encode_dt(transcript.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO transcripts ({TRANSCRIPT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
          ),
          params![id_str, log_str, raw_text, extracted, confidence, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(transcript)
  }

  async fn latest_transcript(&self, log_id: Uuid) -> Result<Option<Transcript>> {
    let id_str = encode_uuid(log_id);

    let raw: Option<RawTranscript> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts
                 WHERE log_id = ?1 ORDER BY rowid DESC LIMIT 1"
              ),
              params![id_str],
              RawTranscript::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTranscript::into_transcript).transpose()
  }

  // ── Audit log (append-only) ───────────────────────────────────────────────

  async fn append_audit(&self, entries: Vec<NewAuditEntry>) -> Result<Vec<AuditLogEntry>> {
    if entries.is_empty() {
      return Ok(Vec::new());
    }

    let recorded_at = Utc::now();
    let written: Vec<AuditLogEntry> = entries
      .into_iter()
      .map(|e| AuditLogEntry {
        audit_id: Uuid::new_v4(),
        entity_type: e.entity_type,
        entity_id: e.entity_id,
        field: e.field,
        old_value: e.old_value,
        new_value: e.new_value,
        source: e.source,
        actor_id: e.actor_id,
        recorded_at,
      })
      .collect();

    let rows: Vec<[Option<String>; 9]> = written
      .iter()
      .map(|e| {
        [
          Some(encode_uuid(e.audit_id)),
          Some(e.entity_type.to_string()),
          Some(encode_uuid(e.entity_id)),
          Some(e.field.clone()),
          e.old_value.as_ref().map(encode_json),
          Some(encode_json(&e.new_value)),
          Some(e.source.to_string()),
          Some(e.actor_id.clone()),
          Some(encode_dt(e.recorded_at)),
        ]
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT INTO audit_log ({AUDIT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
          ))?;
          for row in &rows {
            stmt.execute(params_from_iter(row.iter()))?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(written)
  }

  async fn list_audit<'a>(&'a self, query: &'a AuditQuery) -> Result<Vec<AuditLogEntry>> {
    let mut conds: Vec<String> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();

    if let Some(entity_type) = query.entity_type {
      values.push(SqlValue::Text(entity_type.to_string()));
      conds.push(format!("entity_type = ?{}", values.len()));
    }
    if !query.entity_ids.is_empty() {
      let mut placeholders = Vec::with_capacity(query.entity_ids.len());
      for id in &query.entity_ids {
        values.push(SqlValue::Text(encode_uuid(*id)));
        placeholders.push(format!("?{}", values.len()));
      }
      conds.push(format!("entity_id IN ({})", placeholders.join(", ")));
    }
    if let Some(field) = &query.field {
      values.push(SqlValue::Text(field.clone()));
      conds.push(format!("field = ?{}", values.len()));
    }
    values.push(SqlValue::Integer(query.limit.map(|l| l as i64).unwrap_or(-1)));
    let limit_param = values.len();

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let sql = format!(
      "SELECT {AUDIT_COLUMNS} FROM audit_log {where_clause} ORDER BY seq LIMIT ?{limit_param}"
    );

    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(values.iter()), RawAudit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAudit::into_audit).collect()
  }

  // ── Spreadsheet imports ───────────────────────────────────────────────────

  async fn record_import_batch(&self, input: NewImportBatch) -> Result<ImportBatch> {
    let batch_id     = Uuid::new_v4();
    let uploaded_at  = Utc::now();
    let id_str       = encode_uuid(batch_id);
    let file_name    = input.file_name.clone();
    let sha          = input.content_sha256.clone();
    let row_count    = encode_count("row_count", input.row_count)?;
    let column_count = encode_count("column_count", input.column_count)?;
    let actor_id     = input.actor_id.clone();
    let at_str       = encode_dt(uploaded_at);

    // The version is assigned inside the insert so it stays monotonic.
    let version: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO import_batches ({BATCH_COLUMNS})
             VALUES (?1, (SELECT COALESCE(MAX(version), 0) + 1 FROM import_batches),
                     ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING version"
          ),
          params![id_str, file_name, sha, row_count, column_count, actor_id, at_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(ImportBatch {
      batch_id,
      version: u64::try_from(version).map_err(|_| Error::Decode {
        column: "version",
        value:  version.to_string(),
      })?,
      file_name: input.file_name,
      content_sha256: input.content_sha256,
      row_count: input.row_count,
      column_count: input.column_count,
      actor_id: input.actor_id,
      uploaded_at,
    })
  }

  async fn latest_import_batch(&self) -> Result<Option<ImportBatch>> {
    let raw: Option<RawImportBatch> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {BATCH_COLUMNS} FROM import_batches ORDER BY version DESC LIMIT 1"
              ),
              [],
              RawImportBatch::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawImportBatch::into_batch).transpose()
  }

  async fn record_import_row(&self, input: NewImportRow) -> Result<ImportRow> {
    let row = ImportRow {
      row_id:     Uuid::new_v4(),
      batch_id:   input.batch_id,
      row_index:  input.row_index,
      video_id:   input.video_id,
      raw:        input.raw,
      created_at: Utc::now(),
    };

    let id_str    = encode_uuid(row.row_id);
    let batch_str = encode_uuid(row.batch_id);
    let index     = encode_count("row_index", row.row_index)?;
    let video_str = row.video_id.map(encode_uuid);
    let raw       = encode_json(&row.raw);
    let at_str    = encode_dt(row.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO import_rows ({IMPORT_ROW_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
          ),
          params![id_str, batch_str, index, video_str, raw, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(row)
  }

  async fn list_import_rows(&self, batch_id: Uuid) -> Result<Vec<ImportRow>> {
    let id_str = encode_uuid(batch_id);

    let raws: Vec<RawImportRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IMPORT_ROW_COLUMNS} FROM import_rows
           WHERE batch_id = ?1 ORDER BY row_index"
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawImportRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawImportRow::into_import_row).collect()
  }
}
