//! Test doubles shared with downstream crates via the `test-util` feature.

use std::{
  collections::VecDeque,
  future::Future,
  sync::{Mutex, PoisonError},
};

use thiserror::Error;

use crate::oracle::{ExtractionOracle, OracleRequest};

#[derive(Debug, Error)]
#[error("scripted oracle: {0}")]
pub struct ScriptedError(pub String);

/// An [`ExtractionOracle`] that replays queued replies in order and records
/// every request it receives. An exhausted queue answers with an error.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
  replies:  Mutex<VecDeque<Result<String, String>>>,
  requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
  pub fn new<I, T>(replies: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    let oracle = Self::default();
    for reply in replies {
      oracle.push_ok(reply);
    }
    oracle
  }

  pub fn push_ok(&self, reply: impl Into<String>) {
    self
      .replies
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push_back(Ok(reply.into()));
  }

  pub fn push_err(&self, message: impl Into<String>) {
    self
      .replies
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push_back(Err(message.into()));
  }

  /// Every request received so far, in order.
  pub fn requests(&self) -> Vec<OracleRequest> {
    self
      .requests
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn remaining(&self) -> usize {
    self.replies.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

impl ExtractionOracle for ScriptedOracle {
  type Error = ScriptedError;

  fn complete(
    &self,
    request: OracleRequest,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_ {
    self
      .requests
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(request);
    let next = self
      .replies
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .pop_front();
    async move {
      match next {
        Some(Ok(reply)) => Ok(reply),
        Some(Err(message)) => Err(ScriptedError(message)),
        None => Err(ScriptedError("no scripted reply left".into())),
      }
    }
  }
}
