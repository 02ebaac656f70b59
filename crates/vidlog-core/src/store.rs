//! The `TrackerStore` trait.
//!
//! Implemented by storage backends (e.g. `vidlog-store-sqlite`). The
//! reconciliation engine, the ingestion pipeline and the HTTP layer depend
//! on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  audit::{AuditLogEntry, AuditQuery, NewAuditEntry},
  field::{ManualField, MetricField, Patch, Source, VideoField},
  import::{ImportBatch, ImportRow, NewImportBatch, NewImportRow},
  log::{LogEntry, LogQuery, LogTransition, NewLogEntry, NewTranscript, Transcript},
  video::{ManualFields, NewVideo, Platform, PlatformMetrics, Video, VideoView},
};

/// A partial write against the `(video_id, platform)` metrics row.
#[derive(Debug, Clone)]
pub struct MetricsUpsert {
  /// Used only if the row does not exist yet; an existing row keeps its id.
  pub metrics_id: Uuid,
  pub video_id:   Uuid,
  pub platform:   Platform,
  pub patch:      Patch<MetricField>,
  pub source:     Source,
  pub log_id:     Option<Uuid>,
}

/// Abstraction over a vidlog store backend.
///
/// Upserts must be atomic at the single-row level. Audit entries are
/// append-only. No cross-row transactions are assumed by callers.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TrackerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Videos ────────────────────────────────────────────────────────────

  fn create_video(
    &self,
    input: NewVideo,
  ) -> impl Future<Output = Result<Video, Self::Error>> + Send + '_;

  fn get_video(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Video>, Self::Error>> + Send + '_;

  /// All videos, newest first.
  fn list_videos(
    &self,
  ) -> impl Future<Output = Result<Vec<Video>, Self::Error>> + Send + '_;

  fn find_video_by_external_id(
    &self,
    external_id: String,
  ) -> impl Future<Output = Result<Option<Video>, Self::Error>> + Send + '_;

  /// Write only the fields in `patch`; bumps `updated_at`. Errors if the
  /// video does not exist.
  fn update_video(
    &self,
    id: Uuid,
    patch: Patch<VideoField>,
  ) -> impl Future<Output = Result<Video, Self::Error>> + Send + '_;

  /// Give a video an external id. Errors if the video does not exist.
  fn set_external_id(
    &self,
    id: Uuid,
    external_id: String,
  ) -> impl Future<Output = Result<Video, Self::Error>> + Send + '_;

  /// Hard-delete a video along with its manual fields and metrics. Linked
  /// log entries are kept but unlinked. Returns `false` if not found.
  fn delete_video(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Manual fields ─────────────────────────────────────────────────────

  fn get_manual_fields(
    &self,
    video_id: Uuid,
  ) -> impl Future<Output = Result<Option<ManualFields>, Self::Error>> + Send + '_;

  /// Create the row with only the supplied fields, or update only those
  /// fields on the existing row.
  fn upsert_manual_fields(
    &self,
    video_id: Uuid,
    patch: Patch<ManualField>,
  ) -> impl Future<Output = Result<ManualFields, Self::Error>> + Send + '_;

  // ── Platform metrics ──────────────────────────────────────────────────

  fn get_metrics(
    &self,
    video_id: Uuid,
    platform: Platform,
  ) -> impl Future<Output = Result<Option<PlatformMetrics>, Self::Error>> + Send + '_;

  fn list_metrics(
    &self,
    video_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PlatformMetrics>, Self::Error>> + Send + '_;

  /// Keyed by `(video_id, platform)`; partial-update semantics as for
  /// [`TrackerStore::upsert_manual_fields`].
  fn upsert_metrics(
    &self,
    input: MetricsUpsert,
  ) -> impl Future<Output = Result<PlatformMetrics, Self::Error>> + Send + '_;

  /// Assemble a [`VideoView`]. Returns `None` if the video does not exist.
  fn materialize(
    &self,
    video_id: Uuid,
  ) -> impl Future<Output = Result<Option<VideoView>, Self::Error>> + Send + '_;

  // ── Log entries & transcripts ─────────────────────────────────────────

  /// Persist a new entry in `processing` state.
  fn create_log_entry(
    &self,
    input: NewLogEntry,
  ) -> impl Future<Output = Result<LogEntry, Self::Error>> + Send + '_;

  fn get_log_entry(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<LogEntry>, Self::Error>> + Send + '_;

  fn list_log_entries(
    &self,
    query: LogQuery,
  ) -> impl Future<Output = Result<Vec<LogEntry>, Self::Error>> + Send + '_;

  /// Apply `transition` only if the entry is still in `transition.from`.
  /// Errors if the entry is missing, in another state, or the move is not a
  /// legal [`crate::log::LogStatus`] transition.
  fn transition_log_entry(
    &self,
    transition: LogTransition,
  ) -> impl Future<Output = Result<LogEntry, Self::Error>> + Send + '_;

  fn record_transcript(
    &self,
    input: NewTranscript,
  ) -> impl Future<Output = Result<Transcript, Self::Error>> + Send + '_;

  /// The most recently recorded transcript for a log entry.
  fn latest_transcript(
    &self,
    log_id: Uuid,
  ) -> impl Future<Output = Result<Option<Transcript>, Self::Error>> + Send + '_;

  // ── Audit log (append-only) ───────────────────────────────────────────

  /// Append entries in order; all share one server-assigned timestamp.
  fn append_audit(
    &self,
    entries: Vec<NewAuditEntry>,
  ) -> impl Future<Output = Result<Vec<AuditLogEntry>, Self::Error>> + Send + '_;

  fn list_audit<'a>(
    &'a self,
    query: &'a AuditQuery,
  ) -> impl Future<Output = Result<Vec<AuditLogEntry>, Self::Error>> + Send + 'a;

  // ── Spreadsheet imports ───────────────────────────────────────────────

  /// Record an upload; the store assigns the next monotonic `version`.
  fn record_import_batch(
    &self,
    input: NewImportBatch,
  ) -> impl Future<Output = Result<ImportBatch, Self::Error>> + Send + '_;

  /// The batch with the highest version.
  fn latest_import_batch(
    &self,
  ) -> impl Future<Output = Result<Option<ImportBatch>, Self::Error>> + Send + '_;

  fn record_import_row(
    &self,
    input: NewImportRow,
  ) -> impl Future<Output = Result<ImportRow, Self::Error>> + Send + '_;

  fn list_import_rows(
    &self,
    batch_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ImportRow>, Self::Error>> + Send + '_;
}
