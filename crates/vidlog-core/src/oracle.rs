//! The extraction oracle and its adapter.
//!
//! The oracle is an external natural-language service behind a one-method
//! trait ([`ExtractionOracle::complete`]). It is unreliable by assumption:
//! its reply may wrap the JSON payload in prose or code fences, or may not
//! contain valid JSON at all. [`Extractor`] isolates the first top-level
//! JSON object, validates it, and retries exactly once with a stricter
//! instruction before giving up with [`Error::ExtractionFailed`].

use std::{collections::BTreeMap, future::Future, sync::Arc};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  field::{CanonicalField, FieldSet, ManualField, MetricField, VideoField},
  video::Platform,
};

// ─── Oracle trait ────────────────────────────────────────────────────────────

/// What the oracle is being asked to do; backends may route on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleTask {
  ExtractLog,
  MapColumns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleRequest {
  pub task:         OracleTask,
  /// System-style instructions describing the expected JSON.
  pub instructions: String,
  /// The user payload (raw text plus context, serialised as JSON).
  pub input:        String,
  /// Set on the retry after an unusable first reply.
  pub strict:       bool,
}

/// A text-in, text-out extraction backend.
pub trait ExtractionOracle: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Return the oracle's raw reply to `request`.
  fn complete(
    &self,
    request: OracleRequest,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}

impl<O: ExtractionOracle> ExtractionOracle for Arc<O> {
  type Error = O::Error;

  fn complete(
    &self,
    request: OracleRequest,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_ {
    (**self).complete(request)
  }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// An abbreviated known video, sent so the oracle can name it by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoHint {
  pub id:        Uuid,
  pub title:     String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub posted_at: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionContext {
  pub videos:  Vec<VideoHint>,
  /// Recent raw log texts, oldest first.
  pub history: Vec<String>,
}

// ─── Candidate ───────────────────────────────────────────────────────────────

/// The oracle's best guess for one log entry.
///
/// Unknown field names inside `video`, `metrics` or `manual` fail
/// deserialisation and therefore validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionCandidate {
  #[serde(default)]
  pub video_id:              Option<Uuid>,
  #[serde(default)]
  pub video_confidence:      Option<f64>,
  #[serde(default)]
  pub needs_video_selection: bool,
  /// Free-form; read through [`ExtractionCandidate::platform`].
  #[serde(default)]
  pub platform:              Option<String>,
  #[serde(default)]
  pub video:                 BTreeMap<VideoField, Value>,
  #[serde(default)]
  pub metrics:               BTreeMap<MetricField, Value>,
  #[serde(default)]
  pub manual:                BTreeMap<ManualField, Value>,
  /// Per-field confidence keyed by field name.
  #[serde(default)]
  pub confidence:            BTreeMap<String, f64>,
}

impl ExtractionCandidate {
  pub fn platform(&self) -> Option<Platform> {
    self.platform.as_deref().and_then(Platform::parse_loose)
  }

  /// True if the candidate carries at least one non-null field to merge.
  pub fn has_content(&self) -> bool {
    !self.field_set().is_empty()
  }

  /// Namespaced field set for the reconciliation engine. Metrics with no
  /// recognisable platform are filed under [`Platform::Other`].
  pub fn field_set(&self) -> FieldSet {
    let mut fields = FieldSet {
      video: self.video.clone(),
      manual: self.manual.clone(),
      metrics: BTreeMap::new(),
    };
    if !self.metrics.is_empty() {
      let platform = self.platform().unwrap_or(Platform::Other);
      fields.metrics.insert(platform, self.metrics.clone());
    }
    fields
  }

  fn validate(&self) -> Result<(), String> {
    let in_range = |v: f64| (0.0..=1.0).contains(&v);
    if let Some(c) = self.video_confidence
      && !in_range(c)
    {
      return Err(format!("videoConfidence {c} outside [0, 1]"));
    }
    if let Some((field, c)) = self.confidence.iter().find(|(_, c)| !in_range(**c)) {
      return Err(format!("confidence for {field} ({c}) outside [0, 1]"));
    }
    Ok(())
  }
}

/// A validated candidate plus the JSON object it was read from.
#[derive(Debug, Clone)]
pub struct Extraction {
  pub candidate: ExtractionCandidate,
  pub raw:       Value,
}

// ─── Prompts ─────────────────────────────────────────────────────────────────

const EXTRACT_INSTRUCTIONS: &str = r#"You read a content creator's note about their short-form videos and extract structured performance data.
Reply with a single JSON object of this shape:
{
  "videoId": "<id from the provided videos list, or null>",
  "videoConfidence": <0..1, how sure you are about videoId>,
  "needsVideoSelection": <true if the note could refer to more than one listed video>,
  "platform": "tiktok|youtube|instagram|facebook|x|linkedin|other|null",
  "video":   { "title"?, "postedAt"?, "duration"? },
  "metrics": { "views"?, "likes"?, "comments"?, "shares"?, "saves"?, "watchTimeSeconds"?, "followersGained"? },
  "manual":  { "hook"?, "caption"?, "hashtags"?, "topic"?, "format"?, "callToAction"?, "targetAudience"?, "rationale"?, "notes"? },
  "confidence": { "<field name>": <0..1> }
}
Only use a videoId that appears in the videos list. Omit fields the note does not mention. Keep numbers as written (for example "12k")."#;

const MAP_COLUMNS_INSTRUCTIONS: &str = r#"You map spreadsheet column headers onto a fixed set of canonical field names.
Reply with a single JSON object whose keys are column headers exactly as given and whose values are canonical field names.
Leave out any column you are not sure about. Never map two columns to the same field."#;

const STRICT_SUFFIX: &str = "\nYour previous reply could not be used. Respond with ONLY the JSON object: no prose, no code fences, no comments.";

// ─── Extractor ───────────────────────────────────────────────────────────────

/// Adapter between the engine and an [`ExtractionOracle`].
pub struct Extractor<O> {
  oracle: O,
}

impl<O: ExtractionOracle> Extractor<O> {
  pub fn new(oracle: O) -> Self { Self { oracle } }

  pub fn oracle(&self) -> &O { &self.oracle }

  /// Extract a candidate record from a single log's raw text.
  pub async fn extract(
    &self,
    text: &str,
    context: &ExtractionContext,
  ) -> Result<Extraction> {
    let input = json!({
      "text": text,
      "videos": context.videos,
      "history": context.history,
    })
    .to_string();

    self
      .ask(OracleTask::ExtractLog, EXTRACT_INSTRUCTIONS, input, |raw| {
        let candidate: ExtractionCandidate = serde_json::from_value(raw.clone())
          .map_err(|e| format!("schema mismatch: {e}"))?;
        candidate.validate()?;
        Ok(Extraction { candidate, raw })
      })
      .await
  }

  /// Ask for a `header → canonical field` dictionary. Entries naming an
  /// unknown header or field are dropped, as are duplicate targets after
  /// the first.
  pub async fn map_columns(
    &self,
    headers: &[String],
    samples: &[Vec<String>],
  ) -> Result<BTreeMap<String, CanonicalField>> {
    let fields: Vec<&'static str> =
      CanonicalField::all().into_iter().map(CanonicalField::name).collect();
    let input = json!({
      "headers": headers,
      "sampleRows": samples,
      "canonicalFields": fields,
    })
    .to_string();

    self
      .ask(OracleTask::MapColumns, MAP_COLUMNS_INSTRUCTIONS, input, |raw| {
        let Value::Object(entries) = raw else {
          return Err("mapping is not a JSON object".to_string());
        };
        let mut mapping = BTreeMap::new();
        for header in headers {
          let Some(target) = entries.get(header).and_then(Value::as_str) else {
            continue;
          };
          match target.parse::<CanonicalField>() {
            Ok(field) if !mapping.values().any(|f| *f == field) => {
              mapping.insert(header.clone(), field);
            }
            Ok(field) => debug!(%header, %field, "duplicate mapping target dropped"),
            Err(_) => debug!(%header, target, "unknown mapping target dropped"),
          }
        }
        Ok(mapping)
      })
      .await
  }

  /// One attempt, then one strict retry. Transport errors, missing JSON,
  /// malformed JSON and validation failures all count as a failed attempt.
  async fn ask<T, F>(
    &self,
    task: OracleTask,
    instructions: &str,
    input: String,
    validate: F,
  ) -> Result<T>
  where
    F: Fn(Value) -> Result<T, String>,
  {
    let mut last_reason = String::new();

    for strict in [false, true] {
      let request = OracleRequest {
        task,
        instructions: if strict {
          format!("{instructions}{STRICT_SUFFIX}")
        } else {
          instructions.to_string()
        },
        input: input.clone(),
        strict,
      };

      let reason = match self.oracle.complete(request).await {
        Err(e) => format!("oracle call failed: {e}"),
        Ok(reply) => {
          debug!(?task, strict, reply_len = reply.len(), "oracle replied");
          match find_json_object(&reply) {
            None => "no JSON object in oracle reply".to_string(),
            Some(slice) => match serde_json::from_str::<Value>(slice) {
              Err(e) => format!("invalid JSON in oracle reply: {e}"),
              Ok(value) => match validate(value) {
                Ok(parsed) => return Ok(parsed),
                Err(reason) => reason,
              },
            },
          }
        }
      };

      warn!(?task, strict, %reason, "unusable oracle reply");
      last_reason = reason;
    }

    Err(Error::ExtractionFailed(last_reason))
  }
}

/// Locate the first balanced top-level `{ … }` in `text`, skipping braces
/// inside JSON strings. The slice is not guaranteed to be valid JSON.
pub fn find_json_object(text: &str) -> Option<&str> {
  let bytes = text.as_bytes();
  let mut search_from = 0;

  while let Some(offset) = text[search_from..].find('{') {
    let start = search_from + offset;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
      if in_string {
        match b {
          _ if escaped => escaped = false,
          b'\\' => escaped = true,
          b'"' => in_string = false,
          _ => {}
        }
        continue;
      }
      match b {
        b'"' => in_string = true,
        b'{' => depth += 1,
        b'}' => {
          depth -= 1;
          if depth == 0 {
            return Some(&text[start..=i]);
          }
        }
        _ => {}
      }
    }

    search_from = start + 1;
  }

  None
}
