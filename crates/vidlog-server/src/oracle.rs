//! [`ExtractionOracle`] over an OpenAI-compatible chat-completions API.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vidlog_core::oracle::{ExtractionOracle, OracleRequest};

use crate::config::OracleConfig;

#[derive(Debug, Error)]
pub enum OracleError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("oracle returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("oracle reply had no message content")]
  EmptyReply,
}

pub struct HttpOracle {
  client:  reqwest::Client,
  url:     String,
  api_key: Option<String>,
  model:   String,
}

impl HttpOracle {
  pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
      api_key: config.api_key.clone().filter(|k| !k.is_empty()),
      model: config.model.clone(),
    })
  }

  async fn send(&self, request: OracleRequest) -> Result<String, OracleError> {
    let body = ChatRequest {
      model:       &self.model,
      messages:    [
        ChatMessage { role: "system", content: &request.instructions },
        ChatMessage { role: "user", content: &request.input },
      ],
      temperature: 0.0,
    };

    let mut req = self.client.post(&self.url).json(&body);
    if let Some(key) = &self.api_key {
      req = req.bearer_auth(key);
    }
    let resp = req.send().await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(OracleError::Status { status: status.as_u16(), body });
    }
    let reply: ChatResponse = resp.json().await?;
    tracing::debug!(task = ?request.task, strict = request.strict, "chat completion received");
    first_content(reply)
  }
}

impl ExtractionOracle for HttpOracle {
  type Error = OracleError;

  fn complete(
    &self,
    request: OracleRequest,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_ {
    self.send(request)
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
  model:       &'a str,
  messages:    [ChatMessage<'a>; 2],
  temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role:    &'static str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
  content: Option<String>,
}

fn first_content(reply: ChatResponse) -> Result<String, OracleError> {
  reply
    .choices
    .into_iter()
    .next()
    .and_then(|c| c.message.content)
    .filter(|c| !c.trim().is_empty())
    .ok_or(OracleError::EmptyReply)
}
