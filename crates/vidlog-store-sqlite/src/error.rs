//! Error type for `vidlog-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;
use vidlog_core::log::LogStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum or number that does not decode.
  #[error("cannot decode column {column}: {value:?}")]
  Decode { column: &'static str, value: String },

  /// A count too large for an SQLite integer.
  #[error("value {value} out of range for column {column}")]
  OutOfRange { column: &'static str, value: u64 },

  #[error("video not found: {0}")]
  VideoNotFound(Uuid),

  #[error("log entry not found: {0}")]
  LogNotFound(Uuid),

  #[error("log entry {log_id} cannot move from {from} to {to}")]
  InvalidTransition {
    log_id: Uuid,
    from:   LogStatus,
    to:     LogStatus,
  },

  /// The entry was not in the expected state when the transition ran.
  #[error("log entry {log_id} is {actual}, expected {expected}")]
  StaleTransition {
    log_id:   Uuid,
    expected: LogStatus,
    actual:   LogStatus,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
