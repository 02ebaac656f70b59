//! Log entries (raw ingestion events) and their transcripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

/// How the raw text was captured.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogKind {
  #[default]
  Text,
  /// Transcribed speech; `raw_text` holds the transcription.
  Voice,
}

/// Where a log entry is in the ingestion pipeline.
///
/// ```text
/// processing ─┬─ completed            (linked or unlinked)
///             ├─ needs_association ── completed   (explicit association)
///             └─ failed
/// ```
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogStatus {
  Processing,
  Completed,
  NeedsAssociation,
  Failed,
}

impl LogStatus {
  /// `completed` and `failed` never change again.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed)
  }

  pub fn can_transition_to(self, to: LogStatus) -> bool {
    use LogStatus::*;
    matches!(
      (self, to),
      (Processing, Completed | NeedsAssociation | Failed)
        | (NeedsAssociation, Completed)
    )
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub log_id:     Uuid,
  pub kind:       LogKind,
  pub raw_text:   Option<String>,
  /// Reference to the stored audio for voice logs.
  pub audio_ref:  Option<String>,
  pub status:     LogStatus,
  /// The video this entry was ultimately associated with.
  pub video_id:   Option<Uuid>,
  /// Human-readable failure reason when `status == failed`.
  pub error:      Option<String>,
  pub actor_id:   String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::TrackerStore::create_log_entry`]. New entries
/// always start in [`LogStatus::Processing`].
#[derive(Debug, Clone)]
pub struct NewLogEntry {
  pub kind:      LogKind,
  pub raw_text:  Option<String>,
  pub audio_ref: Option<String>,
  pub actor_id:  String,
}

/// A conditional status change: applied only if the entry is still in
/// `from`.
#[derive(Debug, Clone)]
pub struct LogTransition {
  pub log_id:   Uuid,
  pub from:     LogStatus,
  pub to:       LogStatus,
  pub video_id: Option<Uuid>,
  pub error:    Option<String>,
}

/// Parameters for [`crate::store::TrackerStore::list_log_entries`]; newest
/// first.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
  pub status: Option<LogStatus>,
  pub limit:  Option<usize>,
}

// ─── Transcript ──────────────────────────────────────────────────────────────

/// The structured extraction result for a log entry. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
  pub transcript_id: Uuid,
  pub log_id:        Uuid,
  pub raw_text:      String,
  /// The validated JSON object isolated from the oracle's response.
  pub extracted:     serde_json::Value,
  /// Per-field confidence, `{field: 0..1}`.
  pub confidence:    serde_json::Value,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTranscript {
  pub log_id:     Uuid,
  pub raw_text:   String,
  pub extracted:  serde_json::Value,
  pub confidence: serde_json::Value,
}

#[cfg(test)]
mod tests {
  use super::LogStatus::*;

  #[test]
  fn transitions() {
    assert!(Processing.can_transition_to(Completed));
    assert!(Processing.can_transition_to(NeedsAssociation));
    assert!(Processing.can_transition_to(Failed));
    assert!(NeedsAssociation.can_transition_to(Completed));

    assert!(!NeedsAssociation.can_transition_to(Failed));
    assert!(!Completed.can_transition_to(Processing));
    assert!(!Failed.can_transition_to(Completed));
    assert!(!Processing.can_transition_to(Processing));
  }

  #[test]
  fn terminal_states() {
    assert!(Completed.is_terminal());
    assert!(Failed.is_terminal());
    assert!(!NeedsAssociation.is_terminal());
    assert!(!Processing.is_terminal());
  }

  #[test]
  fn wire_names() {
    assert_eq!(NeedsAssociation.to_string(), "needs_association");
    assert_eq!(
      serde_json::to_string(&NeedsAssociation).unwrap(),
      "\"needs_association\""
    );
  }
}
