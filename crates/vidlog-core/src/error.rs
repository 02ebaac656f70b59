//! Error types for `vidlog-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::log::LogStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("video not found: {0}")]
  VideoNotFound(Uuid),

  #[error("log entry not found: {0}")]
  LogNotFound(Uuid),

  #[error("log entry {0} has no transcript to associate from")]
  TranscriptMissing(Uuid),

  #[error("log entry {log_id} cannot move from {from} to {to}")]
  InvalidTransition {
    log_id: Uuid,
    from:   LogStatus,
    to:     LogStatus,
  },

  /// The oracle produced no usable JSON, even after the strict retry.
  #[error("extraction failed: {0}")]
  ExtractionFailed(String),

  #[error("unknown field name: {0:?}")]
  UnknownField(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error. Used as `.map_err(Error::store)` at every store
  /// call site in this crate.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
