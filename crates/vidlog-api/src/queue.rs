//! Background ingestion.
//!
//! A log entry row in `processing` state is the durable work item; the
//! channel only carries ids. A lost id is recovered by
//! [`IngestQueue::resume_pending`] on the next start.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;
use vidlog_core::{
  ingest::{LogOutcome, Pipeline},
  log::{LogQuery, LogStatus},
  oracle::{ExtractionOracle, Extractor},
  settings::PipelineSettings,
  store::TrackerStore,
};

use crate::error::ApiError;

/// Sending half of the ingestion worker. Cheap to clone.
#[derive(Clone)]
pub struct IngestQueue {
  tx: mpsc::UnboundedSender<Uuid>,
}

impl IngestQueue {
  /// Start the worker task. Entries are processed one at a time, in the
  /// order they were enqueued. The task ends once every queue handle is
  /// dropped.
  pub fn spawn<S, O>(
    store: Arc<S>,
    extractor: Arc<Extractor<O>>,
    settings: Arc<PipelineSettings>,
  ) -> (Self, JoinHandle<()>)
  where
    S: TrackerStore + 'static,
    O: ExtractionOracle + 'static,
  {
    let (tx, mut rx) = mpsc::unbounded_channel::<Uuid>();
    let handle = tokio::spawn(async move {
      let pipeline = Pipeline::new(&*store, &*extractor, &settings);
      while let Some(log_id) = rx.recv().await {
        match pipeline.process(log_id).await {
          Ok(outcome) => report(log_id, &outcome),
          Err(e) => error!(%log_id, error = %e, "log processing aborted"),
        }
      }
      info!("ingest worker stopped");
    });
    (Self { tx }, handle)
  }

  pub fn enqueue(&self, log_id: Uuid) {
    if self.tx.send(log_id).is_err() {
      warn!(%log_id, "ingest worker is gone; entry stays processing until restart");
    }
  }

  /// Re-enqueue every entry still in `processing`, oldest first. Returns
  /// how many were queued.
  pub async fn resume_pending<S: TrackerStore>(&self, store: &S) -> Result<usize, ApiError> {
    let mut pending = store
      .list_log_entries(LogQuery { status: Some(LogStatus::Processing), limit: None })
      .await
      .map_err(ApiError::store)?;
    pending.reverse();
    for entry in &pending {
      self.enqueue(entry.log_id);
    }
    if !pending.is_empty() {
      info!(count = pending.len(), "resumed pending log entries");
    }
    Ok(pending.len())
  }
}

fn report(log_id: Uuid, outcome: &LogOutcome) {
  match outcome {
    LogOutcome::Linked { video_id, report } => info!(
      %log_id,
      %video_id,
      changes = report.changes.len(),
      dropped = report.dropped.len(),
      "log linked"
    ),
    LogOutcome::Unlinked => info!(%log_id, "log completed without a video"),
    LogOutcome::NeedsAssociation { reason } => {
      info!(%log_id, ?reason, "log waiting for association")
    }
    LogOutcome::Failed { message } => warn!(%log_id, %message, "log failed"),
    LogOutcome::Skipped { status } => info!(%log_id, %status, "log already settled"),
  }
}
