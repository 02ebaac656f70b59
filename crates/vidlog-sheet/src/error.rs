//! Error types for the vidlog-sheet codec.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("sheet has no header row")]
  MissingHeader,

  #[error("unterminated quoted field starting on line {line}")]
  UnterminatedQuote { line: usize },

  #[error("unexpected quote on line {line}, column {column}")]
  StrayQuote { line: usize, column: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
