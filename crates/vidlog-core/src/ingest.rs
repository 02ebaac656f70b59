//! The single-entry ingestion pipeline for text and voice logs.
//!
//! A [`LogEntry`] is created in `processing` and driven through
//! extraction → resolution → merge by [`Pipeline::process`], which always
//! leaves it in a settled state:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Oracle unusable after retry | `failed` (message stored) |
//! | Candidate names a video (or the only video) | `completed`, linked |
//! | Candidate is ambiguous | `needs_association` |
//! | Nothing to attach | `completed`, unlinked |
//! | Store error at any step | `failed` (best effort), error returned |
//!
//! The extraction result is stored as a [`crate::log::Transcript`] before
//! resolution, so an entry waiting for association can later be completed
//! by [`Pipeline::associate`] without calling the oracle again.

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  field::Source,
  log::{LogEntry, LogQuery, LogStatus, LogTransition, NewTranscript},
  oracle::{ExtractionCandidate, ExtractionContext, ExtractionOracle, Extractor, VideoHint},
  reconcile::{MergeReport, MergeRequest, Reconciler},
  resolve::{AmbiguityReason, Resolution, resolve},
  settings::PipelineSettings,
  store::TrackerStore,
};

/// How a processed log entry settled.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LogOutcome {
  Linked {
    video_id: Uuid,
    report:   MergeReport,
  },
  Unlinked,
  NeedsAssociation {
    reason: AmbiguityReason,
  },
  Failed {
    message: String,
  },
  /// The entry was no longer `processing` when picked up.
  Skipped {
    status: LogStatus,
  },
}

pub struct Pipeline<'a, S, O> {
  store:     &'a S,
  extractor: &'a Extractor<O>,
  settings:  &'a PipelineSettings,
}

impl<'a, S, O> Pipeline<'a, S, O>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  pub fn new(
    store: &'a S,
    extractor: &'a Extractor<O>,
    settings: &'a PipelineSettings,
  ) -> Self {
    Self { store, extractor, settings }
  }

  /// Drive one `processing` entry to a settled state.
  pub async fn process(&self, log_id: Uuid) -> Result<LogOutcome> {
    let entry = self
      .store
      .get_log_entry(log_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::LogNotFound(log_id))?;

    if entry.status != LogStatus::Processing {
      return Ok(LogOutcome::Skipped { status: entry.status });
    }

    let Some(text) = entry.raw_text.clone().filter(|t| !t.trim().is_empty()) else {
      let message = "log entry has no text to extract from".to_string();
      self.fail(log_id, &message).await?;
      return Ok(LogOutcome::Failed { message });
    };

    match self.settle(&entry, text).await {
      Ok(outcome) => Ok(outcome),
      Err(e) => {
        self.fail_best_effort(log_id, &e).await;
        Err(e)
      }
    }
  }

  /// Everything after the entry is known to be processable. Any error
  /// returned here leaves the entry for the caller to mark failed.
  async fn settle(&self, entry: &LogEntry, text: String) -> Result<LogOutcome> {
    let log_id = entry.log_id;
    let context = self.context(entry).await?;
    let extraction = match self.extractor.extract(&text, &context).await {
      Ok(extraction) => extraction,
      Err(Error::ExtractionFailed(message)) => {
        error!(%log_id, %message, "extraction failed");
        self.fail(log_id, &message).await?;
        return Ok(LogOutcome::Failed { message });
      }
      Err(e) => return Err(e),
    };

    let confidence = serde_json::to_value(&extraction.candidate.confidence)?;
    self
      .store
      .record_transcript(NewTranscript {
        log_id,
        raw_text: text,
        extracted: extraction.raw,
        confidence,
      })
      .await
      .map_err(Error::store)?;

    let known: Vec<Uuid> = self
      .store
      .list_videos()
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|v| v.video_id)
      .collect();

    let candidate = extraction.candidate;
    match resolve(&candidate, &known, self.settings.resolver_policy()) {
      Resolution::Resolved(video_id) => {
        let report = self.merge(entry, &candidate, video_id).await?;
        self
          .transition(log_id, LogStatus::Processing, LogStatus::Completed, Some(video_id), None)
          .await?;
        info!(%log_id, %video_id, "log entry completed");
        Ok(LogOutcome::Linked { video_id, report })
      }
      Resolution::NeedsAssociation(reason) => {
        self
          .transition(log_id, LogStatus::Processing, LogStatus::NeedsAssociation, None, None)
          .await?;
        info!(%log_id, ?reason, "log entry needs association");
        Ok(LogOutcome::NeedsAssociation { reason })
      }
      Resolution::Unlinked => {
        self
          .transition(log_id, LogStatus::Processing, LogStatus::Completed, None, None)
          .await?;
        info!(%log_id, "log entry completed without a video");
        Ok(LogOutcome::Unlinked)
      }
    }
  }

  /// Complete a `needs_association` entry against `video_id`, reusing its
  /// stored transcript. `actor_id` is whoever made the choice.
  pub async fn associate(
    &self,
    log_id: Uuid,
    video_id: Uuid,
    actor_id: &str,
  ) -> Result<MergeReport> {
    let entry = self
      .store
      .get_log_entry(log_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::LogNotFound(log_id))?;

    if entry.status != LogStatus::NeedsAssociation {
      return Err(Error::InvalidTransition {
        log_id,
        from: entry.status,
        to: LogStatus::Completed,
      });
    }

    let transcript = self
      .store
      .latest_transcript(log_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::TranscriptMissing(log_id))?;
    let candidate: ExtractionCandidate = serde_json::from_value(transcript.extracted)?;

    let fields = candidate.field_set();
    let report = Reconciler::new(self.store, self.settings.date_order)
      .merge(MergeRequest {
        video_id,
        fields: &fields,
        source: Source::Transcript,
        actor_id,
        log_id: Some(log_id),
      })
      .await?;

    self
      .transition(
        log_id,
        LogStatus::NeedsAssociation,
        LogStatus::Completed,
        Some(video_id),
        None,
      )
      .await?;
    info!(%log_id, %video_id, %actor_id, "log entry associated");
    Ok(report)
  }

  async fn merge(
    &self,
    entry: &LogEntry,
    candidate: &ExtractionCandidate,
    video_id: Uuid,
  ) -> Result<MergeReport> {
    let fields = candidate.field_set();
    Reconciler::new(self.store, self.settings.date_order)
      .merge(MergeRequest {
        video_id,
        fields: &fields,
        source: Source::Transcript,
        actor_id: &entry.actor_id,
        log_id: Some(entry.log_id),
      })
      .await
  }

  /// Known videos (newest first, abbreviated) and recent completed logs.
  async fn context(&self, entry: &LogEntry) -> Result<ExtractionContext> {
    let videos = self.store.list_videos().await.map_err(Error::store)?;

    let mut hints = Vec::new();
    for video in videos.into_iter().take(self.settings.context_videos) {
      let platforms = self
        .store
        .list_metrics(video.video_id)
        .await
        .map_err(Error::store)?
        .into_iter()
        .map(|m| m.platform)
        .collect();
      hints.push(VideoHint {
        id: video.video_id,
        title: video.title,
        posted_at: video.published_on,
        platforms,
      });
    }

    let mut history: Vec<String> = self
      .store
      .list_log_entries(LogQuery {
        status: Some(LogStatus::Completed),
        limit:  Some(self.settings.context_history),
      })
      .await
      .map_err(Error::store)?
      .into_iter()
      .filter(|e| e.log_id != entry.log_id)
      .filter_map(|e| e.raw_text)
      .collect();
    history.reverse();

    Ok(ExtractionContext { videos: hints, history })
  }

  async fn transition(
    &self,
    log_id: Uuid,
    from: LogStatus,
    to: LogStatus,
    video_id: Option<Uuid>,
    error: Option<String>,
  ) -> Result<LogEntry> {
    self
      .store
      .transition_log_entry(LogTransition { log_id, from, to, video_id, error })
      .await
      .map_err(Error::store)
  }

  async fn fail(&self, log_id: Uuid, message: &str) -> Result<()> {
    self
      .transition(
        log_id,
        LogStatus::Processing,
        LogStatus::Failed,
        None,
        Some(message.to_string()),
      )
      .await?;
    Ok(())
  }

  /// Record a failure while another error is already being returned.
  async fn fail_best_effort(&self, log_id: Uuid, cause: &Error) {
    if let Err(e) = self.fail(log_id, &cause.to_string()).await {
      warn!(%log_id, error = %e, "could not mark log entry failed");
    }
  }
}
