//! Merging records pulled from a video platform's API.
//!
//! The fetching client lives outside this crate; it hands over
//! [`SyncedVideo`] records keyed by the platform's own video id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
  Error, Result,
  audit::AuditLogEntry,
  field::{FieldSet, MetricField, Source, VideoField},
  parse::DateOrder,
  reconcile::{MergeRequest, Reconciler},
  store::TrackerStore,
  video::{NewVideo, Platform, VideoOrigin},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedVideo {
  pub external_id:      String,
  pub title:            String,
  #[serde(default)]
  pub published_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub duration_seconds: Option<u64>,
  #[serde(default = "default_platform")]
  pub platform:         Platform,
  #[serde(default)]
  pub metrics:          BTreeMap<MetricField, Value>,
}

fn default_platform() -> Platform { Platform::Youtube }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
  pub external_id: String,
  pub message:     String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
  pub created:   usize,
  pub updated:   usize,
  pub unchanged: usize,
  pub changes:   Vec<AuditLogEntry>,
  pub failures:  Vec<SyncFailure>,
}

/// Merge each record with `source = sync`, creating videos for unseen
/// external ids. One bad record does not stop the rest.
pub async fn sync_videos<S: TrackerStore>(
  store: &S,
  date_order: DateOrder,
  records: Vec<SyncedVideo>,
  actor_id: &str,
) -> Result<SyncReport> {
  let reconciler = Reconciler::new(store, date_order);
  let mut report = SyncReport::default();

  for record in records {
    let external_id = record.external_id.clone();
    match sync_one(store, &reconciler, record, actor_id).await {
      Ok((created, changes)) => {
        if created {
          report.created += 1;
        } else if changes.is_empty() {
          report.unchanged += 1;
        } else {
          report.updated += 1;
        }
        report.changes.extend(changes);
      }
      Err(e) => {
        warn!(%external_id, error = %e, "sync record failed");
        report.failures.push(SyncFailure { external_id, message: e.to_string() });
      }
    }
  }

  info!(
    created = report.created,
    updated = report.updated,
    unchanged = report.unchanged,
    failed = report.failures.len(),
    "sync finished"
  );
  Ok(report)
}

async fn sync_one<S: TrackerStore>(
  store: &S,
  reconciler: &Reconciler<'_, S>,
  record: SyncedVideo,
  actor_id: &str,
) -> Result<(bool, Vec<AuditLogEntry>)> {
  let existing = store
    .find_video_by_external_id(record.external_id.clone())
    .await
    .map_err(Error::store)?;

  let (video_id, created) = match existing {
    Some(video) => (video.video_id, false),
    None => {
      let mut input = NewVideo::new(record.title.clone(), VideoOrigin::Sync);
      input.external_id = Some(record.external_id.clone());
      let video = store.create_video(input).await.map_err(Error::store)?;
      (video.video_id, true)
    }
  };

  let fields = field_set(&record);
  let report = reconciler
    .merge(MergeRequest {
      video_id,
      fields: &fields,
      source: Source::Sync,
      actor_id,
      log_id: None,
    })
    .await?;
  Ok((created, report.changes))
}

fn field_set(record: &SyncedVideo) -> FieldSet {
  let mut fields = FieldSet::default();
  fields
    .video
    .insert(VideoField::Title, Value::String(record.title.clone()));
  if let Some(at) = record.published_at {
    fields.video.insert(
      VideoField::PostedAt,
      Value::String(at.date_naive().format("%Y-%m-%d").to_string()),
    );
  }
  if let Some(secs) = record.duration_seconds {
    fields.video.insert(VideoField::Duration, Value::from(secs));
  }
  if !record.metrics.is_empty() {
    fields.metrics.insert(record.platform, record.metrics.clone());
  }
  fields
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[test]
  fn records_default_to_youtube() {
    let record: SyncedVideo = serde_json::from_value(json!({
      "externalId": "yt-1",
      "title": "Desk tour",
      "publishedAt": "2024-03-05T17:30:00Z",
      "metrics": {"views": 1500}
    }))
    .unwrap();
    assert_eq!(record.platform, Platform::Youtube);

    let fields = field_set(&record);
    assert_eq!(fields.video[&VideoField::PostedAt], json!("2024-03-05"));
    assert_eq!(
      fields.metrics[&Platform::Youtube][&MetricField::Views],
      json!(1500)
    );
    assert!(!fields.video.contains_key(&VideoField::Duration));
  }

  #[test]
  fn publish_time_is_reduced_to_its_utc_date() {
    let record = SyncedVideo {
      external_id:      "x".into(),
      title:            "t".into(),
      published_at:     Some(Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 0).unwrap()),
      duration_seconds: Some(42),
      platform:         Platform::Tiktok,
      metrics:          BTreeMap::new(),
    };
    let fields = field_set(&record);
    assert_eq!(fields.video[&VideoField::PostedAt], json!("2024-03-05"));
    assert_eq!(fields.video[&VideoField::Duration], json!(42));
    assert!(fields.metrics.is_empty());
  }
}
