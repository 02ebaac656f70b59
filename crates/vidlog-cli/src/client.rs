//! Async HTTP client wrapping the vidlog JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;
use vidlog_core::{log::LogEntry, video::VideoView};

/// Connection settings for the vidlog API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Sent as `x-actor-id`; empty means the server default.
  pub actor:    String,
}

/// Async HTTP client for the vidlog JSON REST API.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(120))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn actor(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.actor.is_empty() {
      req
    } else {
      req.header("x-actor-id", &self.config.actor)
    }
  }

  /// Send, turn non-2xx into an error carrying the server's message, and
  /// decode the body.
  async fn call<T: DeserializeOwned>(&self, label: &str, req: RequestBuilder) -> Result<T> {
    tracing::debug!(%label, "request");
    let resp = self
      .actor(req)
      .send()
      .await
      .with_context(|| format!("{label} failed"))?;
    let resp = check(label, resp).await?;
    resp
      .json()
      .await
      .with_context(|| format!("deserialising {label} response"))
  }

  // ── Logs ──────────────────────────────────────────────────────────────────

  /// `POST /api/logs`
  pub async fn submit_log(&self, text: &str) -> Result<LogEntry> {
    let req = self.client.post(self.url("/logs")).json(&json!({ "text": text }));
    self.call("POST /logs", req).await
  }

  /// `GET /api/logs/:id`
  pub async fn get_log(&self, id: Uuid) -> Result<LogEntry> {
    let req = self.client.get(self.url(&format!("/logs/{id}")));
    self.call("GET /logs/:id", req).await
  }

  /// `POST /api/logs/:id/associate`; returns the merge report.
  pub async fn associate(&self, log_id: Uuid, video_id: Uuid) -> Result<Value> {
    let req = self
      .client
      .post(self.url(&format!("/logs/{log_id}/associate")))
      .json(&json!({ "videoId": video_id }));
    self.call("POST /logs/:id/associate", req).await
  }

  // ── Videos ────────────────────────────────────────────────────────────────

  /// `GET /api/videos`
  pub async fn list_videos(&self) -> Result<Vec<VideoView>> {
    let req = self.client.get(self.url("/videos"));
    self.call("GET /videos", req).await
  }

  // ── Spreadsheets ──────────────────────────────────────────────────────────

  /// `POST /api/imports`; returns the import report.
  pub async fn import_csv(
    &self,
    csv: String,
    file_name: Option<&str>,
    platform: Option<&str>,
  ) -> Result<Value> {
    let mut query: Vec<(&str, &str)> = Vec::new();
    if let Some(name) = file_name {
      query.push(("file_name", name));
    }
    if let Some(platform) = platform {
      query.push(("platform", platform));
    }
    let req = self
      .client
      .post(self.url("/imports"))
      .query(&query)
      .header(reqwest::header::CONTENT_TYPE, "text/csv")
      .body(csv);
    self.call("POST /imports", req).await
  }

  /// `GET /api/export.csv`
  pub async fn export_csv(&self) -> Result<String> {
    let resp = self
      .actor(self.client.get(self.url("/export.csv")))
      .send()
      .await
      .context("GET /export.csv failed")?;
    check("GET /export.csv", resp)
      .await?
      .text()
      .await
      .context("reading export body")
  }
}

async fn check(label: &str, resp: Response) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<Value>()
    .await
    .ok()
    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
    .unwrap_or_default();
  Err(anyhow!("{label} → {status} {message}"))
}
