//! A `TrackerStore` that forwards to `SqliteStore` but fails chosen
//! operations on demand.

use std::{
  collections::HashSet,
  sync::{Mutex, PoisonError},
};

use thiserror::Error;
use uuid::Uuid;
use vidlog_core::{
  audit::{AuditLogEntry, AuditQuery, NewAuditEntry},
  field::{ManualField, Patch, VideoField},
  import::{ImportBatch, ImportRow, NewImportBatch, NewImportRow},
  log::{LogEntry, LogQuery, LogTransition, NewLogEntry, NewTranscript, Transcript},
  store::{MetricsUpsert, TrackerStore},
  video::{ManualFields, NewVideo, Platform, PlatformMetrics, Video, VideoView},
};

use crate::SqliteStore;

#[derive(Debug, Error)]
pub enum FaultError {
  #[error("{0} is unavailable")]
  Unavailable(&'static str),

  #[error(transparent)]
  Store(#[from] crate::Error),
}

type Result<T> = std::result::Result<T, FaultError>;

pub struct FaultyStore {
  pub inner: SqliteStore,
  failing:   Mutex<HashSet<&'static str>>,
}

impl FaultyStore {
  pub fn new(inner: SqliteStore) -> Self {
    Self { inner, failing: Mutex::new(HashSet::new()) }
  }

  /// Make every later call to `operation` fail.
  pub fn fail(&self, operation: &'static str) {
    self
      .failing
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(operation);
  }

  fn check(&self, operation: &'static str) -> Result<()> {
    let failing = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
    if failing.contains(operation) {
      return Err(FaultError::Unavailable(operation));
    }
    Ok(())
  }
}

impl TrackerStore for FaultyStore {
  type Error = FaultError;

  async fn create_video(&self, input: NewVideo) -> Result<Video> {
    self.check("create_video")?;
    Ok(self.inner.create_video(input).await?)
  }

  async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
    self.check("get_video")?;
    Ok(self.inner.get_video(id).await?)
  }

  async fn list_videos(&self) -> Result<Vec<Video>> {
    self.check("list_videos")?;
    Ok(self.inner.list_videos().await?)
  }

  async fn find_video_by_external_id(&self, external_id: String) -> Result<Option<Video>> {
    self.check("find_video_by_external_id")?;
    Ok(self.inner.find_video_by_external_id(external_id).await?)
  }

  async fn update_video(&self, id: Uuid, patch: Patch<VideoField>) -> Result<Video> {
    self.check("update_video")?;
    Ok(self.inner.update_video(id, patch).await?)
  }

  async fn set_external_id(&self, id: Uuid, external_id: String) -> Result<Video> {
    self.check("set_external_id")?;
    Ok(self.inner.set_external_id(id, external_id).await?)
  }

  async fn delete_video(&self, id: Uuid) -> Result<bool> {
    self.check("delete_video")?;
    Ok(self.inner.delete_video(id).await?)
  }

  async fn get_manual_fields(&self, video_id: Uuid) -> Result<Option<ManualFields>> {
    self.check("get_manual_fields")?;
    Ok(self.inner.get_manual_fields(video_id).await?)
  }

  async fn upsert_manual_fields(
    &self,
    video_id: Uuid,
    patch: Patch<ManualField>,
  ) -> Result<ManualFields> {
    self.check("upsert_manual_fields")?;
    Ok(self.inner.upsert_manual_fields(video_id, patch).await?)
  }

  async fn get_metrics(
    &self,
    video_id: Uuid,
    platform: Platform,
  ) -> Result<Option<PlatformMetrics>> {
    self.check("get_metrics")?;
    Ok(self.inner.get_metrics(video_id, platform).await?)
  }

  async fn list_metrics(&self, video_id: Uuid) -> Result<Vec<PlatformMetrics>> {
    self.check("list_metrics")?;
    Ok(self.inner.list_metrics(video_id).await?)
  }

  async fn upsert_metrics(&self, input: MetricsUpsert) -> Result<PlatformMetrics> {
    self.check("upsert_metrics")?;
    Ok(self.inner.upsert_metrics(input).await?)
  }

  async fn materialize(&self, video_id: Uuid) -> Result<Option<VideoView>> {
    self.check("materialize")?;
    Ok(self.inner.materialize(video_id).await?)
  }

  async fn create_log_entry(&self, input: NewLogEntry) -> Result<LogEntry> {
    self.check("create_log_entry")?;
    Ok(self.inner.create_log_entry(input).await?)
  }

  async fn get_log_entry(&self, id: Uuid) -> Result<Option<LogEntry>> {
    self.check("get_log_entry")?;
    Ok(self.inner.get_log_entry(id).await?)
  }

  async fn list_log_entries(&self, query: LogQuery) -> Result<Vec<LogEntry>> {
    self.check("list_log_entries")?;
    Ok(self.inner.list_log_entries(query).await?)
  }

  async fn transition_log_entry(&self, transition: LogTransition) -> Result<LogEntry> {
    self.check("transition_log_entry")?;
    Ok(self.inner.transition_log_entry(transition).await?)
  }

  async fn record_transcript(&self, input: NewTranscript) -> Result<Transcript> {
    self.check("record_transcript")?;
    Ok(self.inner.record_transcript(input).await?)
  }

  async fn latest_transcript(&self, log_id: Uuid) -> Result<Option<Transcript>> {
    self.check("latest_transcript")?;
    Ok(self.inner.latest_transcript(log_id).await?)
  }

  async fn append_audit(&self, entries: Vec<NewAuditEntry>) -> Result<Vec<AuditLogEntry>> {
    self.check("append_audit")?;
    Ok(self.inner.append_audit(entries).await?)
  }

  async fn list_audit<'a>(&'a self, query: &'a AuditQuery) -> Result<Vec<AuditLogEntry>> {
    self.check("list_audit")?;
    Ok(self.inner.list_audit(query).await?)
  }

  async fn record_import_batch(&self, input: NewImportBatch) -> Result<ImportBatch> {
    self.check("record_import_batch")?;
    Ok(self.inner.record_import_batch(input).await?)
  }

  async fn latest_import_batch(&self) -> Result<Option<ImportBatch>> {
    self.check("latest_import_batch")?;
    Ok(self.inner.latest_import_batch().await?)
  }

  async fn record_import_row(&self, input: NewImportRow) -> Result<ImportRow> {
    self.check("record_import_row")?;
    Ok(self.inner.record_import_row(input).await?)
  }

  async fn list_import_rows(&self, batch_id: Uuid) -> Result<Vec<ImportRow>> {
    self.check("list_import_rows")?;
    Ok(self.inner.list_import_rows(batch_id).await?)
  }
}
