use chrono::NaiveDate;
use serde_json::{Value, json};
use uuid::Uuid;
use vidlog_core::{
  Error as CoreError,
  audit::{AuditQuery, EntityType},
  field::{FieldSet, Source},
  parse::DateOrder,
  reconcile::{MergeRequest, Reconciler},
  store::TrackerStore,
  video::Platform,
};

use super::{store, video};
use crate::SqliteStore;

fn fields(value: Value) -> FieldSet { serde_json::from_value(value).unwrap() }

async fn merge(
  s: &SqliteStore,
  video_id: Uuid,
  fs: &FieldSet,
  source: Source,
) -> vidlog_core::reconcile::MergeReport {
  Reconciler::new(s, DateOrder::MonthFirst)
    .merge(MergeRequest {
      video_id,
      fields: fs,
      source,
      actor_id: "creator",
      log_id: None,
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn merge_is_idempotent() {
  let s = store().await;
  let v = video(&s, "Why Index Funds Win").await;
  let fs = fields(json!({
    "video":   { "postedAt": "03/05/24", "duration": "0:45" },
    "manual":  { "hook": "Stop picking stocks", "hashtags": "money, #stocks" },
    "metrics": { "tiktok": { "views": "12k", "likes": 500 } }
  }));

  let first = merge(&s, v.video_id, &fs, Source::Transcript).await;
  assert_eq!(first.changes.len(), 6);

  let second = merge(&s, v.video_id, &fs, Source::Transcript).await;
  assert!(second.is_noop());

  let all = s.list_audit(&AuditQuery::default()).await.unwrap();
  assert_eq!(all.len(), 6);

  let view = s.materialize(v.video_id).await.unwrap().unwrap();
  assert_eq!(view.video.published_on, NaiveDate::from_ymd_opt(2024, 3, 5));
  assert_eq!(view.video.duration_seconds, Some(45));
  let manual = view.manual.unwrap();
  assert_eq!(
    manual.hashtags,
    Some(vec!["#money".to_string(), "#stocks".to_string()])
  );
  assert_eq!(view.metrics[0].views, Some(12_000));
  assert_eq!(view.metrics[0].source, Source::Transcript);
}

#[tokio::test]
async fn partial_update_leaves_other_fields() {
  let s = store().await;
  let v = video(&s, "Budget hacks").await;

  merge(
    &s,
    v.video_id,
    &fields(json!({ "metrics": { "youtube": { "views": 100, "likes": 10 } } })),
    Source::Import,
  )
  .await;
  let report = merge(
    &s,
    v.video_id,
    &fields(json!({ "metrics": { "youtube": { "views": "250" } } })),
    Source::Sync,
  )
  .await;

  assert_eq!(report.changes.len(), 1);
  let change = &report.changes[0];
  assert_eq!(change.field, "views");
  assert_eq!(change.old_value, Some(json!(100)));
  assert_eq!(change.new_value, json!(250));
  assert_eq!(change.source, Source::Sync);

  let row = s
    .get_metrics(v.video_id, Platform::Youtube)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(row.views, Some(250));
  assert_eq!(row.likes, Some(10));
  assert_eq!(row.source, Source::Sync);
}

#[tokio::test]
async fn unparsable_fields_are_dropped() {
  let s = store().await;
  let v = video(&s, "Mystery numbers").await;

  let report = merge(
    &s,
    v.video_id,
    &fields(json!({
      "video":   { "postedAt": "sometime last week" },
      "metrics": { "instagram": { "views": "lots", "likes": "1.5k" } }
    })),
    Source::Transcript,
  )
  .await;

  assert_eq!(report.changes.len(), 1);
  assert_eq!(report.changes[0].field, "likes");
  assert_eq!(report.dropped.len(), 2);

  let refreshed = s.get_video(v.video_id).await.unwrap().unwrap();
  assert_eq!(refreshed.published_on, None);
  let row = s
    .get_metrics(v.video_id, Platform::Instagram)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(row.views, None);
  assert_eq!(row.likes, Some(1500));
}

#[tokio::test]
async fn new_row_audits_absent_to_present() {
  let s = store().await;
  let v = video(&s, "Fresh").await;

  let report = merge(
    &s,
    v.video_id,
    &fields(json!({ "manual": { "notes": "filmed in one take" } })),
    Source::Manual,
  )
  .await;

  assert_eq!(report.changes.len(), 1);
  let entry = &report.changes[0];
  assert_eq!(entry.entity_type, EntityType::ManualFields);
  assert_eq!(entry.entity_id, v.video_id);
  assert_eq!(entry.old_value, None);
  assert_eq!(entry.new_value, json!("filmed in one take"));
}

#[tokio::test]
async fn metrics_audit_uses_row_id() {
  let s = store().await;
  let v = video(&s, "Row ids").await;

  let report = merge(
    &s,
    v.video_id,
    &fields(json!({ "metrics": { "x": { "shares": 3 } } })),
    Source::Manual,
  )
  .await;
  let row = s.get_metrics(v.video_id, Platform::X).await.unwrap().unwrap();
  assert_eq!(report.changes[0].entity_id, row.metrics_id);

  let report = merge(
    &s,
    v.video_id,
    &fields(json!({ "metrics": { "x": { "shares": 4 } } })),
    Source::Manual,
  )
  .await;
  assert_eq!(report.changes[0].entity_id, row.metrics_id);
}

#[tokio::test]
async fn audit_precedes_write_and_preserves_order() {
  let s = store().await;
  let v = video(&s, "Ordered").await;

  for views in [1, 2, 3] {
    merge(
      &s,
      v.video_id,
      &fields(json!({ "metrics": { "tiktok": { "views": views } } })),
      Source::Sync,
    )
    .await;
  }

  let row = s
    .get_metrics(v.video_id, Platform::Tiktok)
    .await
    .unwrap()
    .unwrap();
  let history = s
    .list_audit(&AuditQuery {
      entity_ids: vec![row.metrics_id],
      ..Default::default()
    })
    .await
    .unwrap();

  let pairs: Vec<_> = history
    .iter()
    .map(|e| (e.old_value.clone(), e.new_value.clone()))
    .collect();
  assert_eq!(
    pairs,
    vec![
      (None, json!(1)),
      (Some(json!(1)), json!(2)),
      (Some(json!(2)), json!(3)),
    ]
  );
  assert!(history.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));
  // Every audited value is the one now stored, and was recorded no later
  // than the row it describes.
  let last = history.last().unwrap();
  assert_eq!(last.new_value, json!(row.views.unwrap()));
  assert!(last.recorded_at <= row.updated_at);
}

#[tokio::test]
async fn video_field_audit_is_not_newer_than_the_video() {
  let s = store().await;
  let v = video(&s, "Timestamps").await;

  merge(
    &s,
    v.video_id,
    &fields(json!({ "video": { "duration": "1:30" } })),
    Source::Manual,
  )
  .await;

  let refreshed = s.get_video(v.video_id).await.unwrap().unwrap();
  let history = s
    .list_audit(&AuditQuery {
      entity_ids: vec![v.video_id],
      ..Default::default()
    })
    .await
    .unwrap();
  let entry = history
    .iter()
    .find(|e| e.entity_type == EntityType::Video)
    .unwrap();
  assert_eq!(entry.new_value, json!(90));
  assert!(entry.recorded_at <= refreshed.updated_at);
}

#[tokio::test]
async fn counts_beyond_storage_range_are_dropped() {
  let s = store().await;
  let v = video(&s, "Too big").await;
  let fs = fields(json!({
    "metrics": { "tiktok": { "views": "10000000000000000000", "likes": 7 } }
  }));

  let first = merge(&s, v.video_id, &fs, Source::Transcript).await;
  assert_eq!(first.changes.len(), 1);
  assert_eq!(first.changes[0].field, "likes");
  assert_eq!(first.dropped.len(), 1);

  let second = merge(&s, v.video_id, &fs, Source::Transcript).await;
  assert!(second.is_noop());

  let row = s
    .get_metrics(v.video_id, Platform::Tiktok)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(row.views, None);
  assert_eq!(s.list_audit(&AuditQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn merge_into_missing_video_writes_nothing() {
  let s = store().await;
  let err = Reconciler::new(&s, DateOrder::MonthFirst)
    .merge(MergeRequest {
      video_id: Uuid::new_v4(),
      fields:   &fields(json!({ "metrics": { "tiktok": { "views": 1 } } })),
      source:   Source::Manual,
      actor_id: "creator",
      log_id:   None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::VideoNotFound(_)));
  assert!(s.list_audit(&AuditQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn day_first_policy_changes_date_reading() {
  let s = store().await;
  let v = video(&s, "Abroad").await;

  Reconciler::new(&s, DateOrder::DayFirst)
    .merge(MergeRequest {
      video_id: v.video_id,
      fields:   &fields(json!({ "video": { "postedAt": "03/05/2024" } })),
      source:   Source::Manual,
      actor_id: "creator",
      log_id:   None,
    })
    .await
    .unwrap();

  let refreshed = s.get_video(v.video_id).await.unwrap().unwrap();
  assert_eq!(refreshed.published_on, NaiveDate::from_ymd_opt(2024, 5, 3));
}
