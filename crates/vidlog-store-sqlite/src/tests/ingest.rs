use serde_json::json;
use vidlog_core::{
  Error as CoreError,
  audit::{AuditQuery, EntityType},
  field::Source,
  ingest::{LogOutcome, Pipeline},
  log::{LogKind, LogStatus, NewLogEntry},
  oracle::{Extractor, OracleTask},
  resolve::AmbiguityReason,
  settings::PipelineSettings,
  store::TrackerStore,
  testing::ScriptedOracle,
  video::Platform,
};

use super::{faults::FaultyStore, store, video};
use crate::SqliteStore;

async fn submit(s: &SqliteStore, text: &str) -> uuid::Uuid {
  s.create_log_entry(NewLogEntry {
    kind:      LogKind::Text,
    raw_text:  Some(text.into()),
    audio_ref: None,
    actor_id:  "creator".into(),
  })
  .await
  .unwrap()
  .log_id
}

#[tokio::test]
async fn tiktok_note_lands_on_the_only_video() {
  let s = store().await;
  let v = video(&s, "Why Index Funds Win").await;
  let log_id = submit(&s, "My TikTok about stocks got 12k views and 500 likes").await;

  let extractor = Extractor::new(ScriptedOracle::new([
    r#"Here is the data: {"platform": "tiktok", "metrics": {"views": "12k", "likes": 500}, "confidence": {"views": 0.9, "likes": 0.95}}"#,
  ]));
  let settings = PipelineSettings::default();
  let outcome = Pipeline::new(&s, &extractor, &settings)
    .process(log_id)
    .await
    .unwrap();

  let LogOutcome::Linked { video_id, report } = outcome else {
    panic!("expected a linked outcome, got {outcome:?}");
  };
  assert_eq!(video_id, v.video_id);
  assert_eq!(report.changes.len(), 2);
  assert!(report.changes.iter().all(|c| c.old_value.is_none()));
  assert!(
    report
      .changes
      .iter()
      .all(|c| c.entity_type == EntityType::PlatformMetrics && c.source == Source::Transcript)
  );

  let row = s
    .get_metrics(v.video_id, Platform::Tiktok)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(row.views, Some(12_000));
  assert_eq!(row.likes, Some(500));
  assert_eq!(row.source, Source::Transcript);
  assert_eq!(row.log_id, Some(log_id));

  let entry = s.get_log_entry(log_id).await.unwrap().unwrap();
  assert_eq!(entry.status, LogStatus::Completed);
  assert_eq!(entry.video_id, Some(v.video_id));

  let transcript = s.latest_transcript(log_id).await.unwrap().unwrap();
  assert_eq!(transcript.confidence, json!({"likes": 0.95, "views": 0.9}));

  // The oracle saw the known video as context.
  let requests = extractor.oracle().requests();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].task, OracleTask::ExtractLog);
  assert!(requests[0].input.contains(&v.video_id.to_string()));
}

#[tokio::test]
async fn ambiguous_note_waits_then_associates() {
  let s = store().await;
  let a = video(&s, "Budget hacks part 1").await;
  let _b = video(&s, "Budget hacks part 2").await;
  let log_id = submit(&s, "the budget hacks video hit 3k views").await;

  let extractor = Extractor::new(ScriptedOracle::new([
    r#"{"needsVideoSelection": true, "platform": "instagram", "metrics": {"views": "3k"}}"#,
  ]));
  let settings = PipelineSettings::default();
  let pipeline = Pipeline::new(&s, &extractor, &settings);

  let outcome = pipeline.process(log_id).await.unwrap();
  assert!(matches!(
    outcome,
    LogOutcome::NeedsAssociation { reason: AmbiguityReason::Flagged }
  ));
  assert!(s.list_audit(&AuditQuery::default()).await.unwrap().is_empty());
  assert_eq!(
    s.get_log_entry(log_id).await.unwrap().unwrap().status,
    LogStatus::NeedsAssociation
  );

  // Association reuses the stored transcript; the oracle is not asked again.
  let report = pipeline.associate(log_id, a.video_id, "editor").await.unwrap();
  assert_eq!(report.changes.len(), 1);
  assert_eq!(report.changes[0].actor_id, "editor");
  assert_eq!(extractor.oracle().requests().len(), 1);

  let entry = s.get_log_entry(log_id).await.unwrap().unwrap();
  assert_eq!(entry.status, LogStatus::Completed);
  assert_eq!(entry.video_id, Some(a.video_id));
  let row = s
    .get_metrics(a.video_id, Platform::Instagram)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(row.views, Some(3_000));

  // A second association is an invalid transition.
  let err = pipeline.associate(log_id, a.video_id, "editor").await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn unnamed_content_with_many_videos_needs_association() {
  let s = store().await;
  video(&s, "one").await;
  video(&s, "two").await;
  let log_id = submit(&s, "got 40 shares").await;

  let extractor = Extractor::new(ScriptedOracle::new([r#"{"metrics": {"shares": 40}}"#]));
  let settings = PipelineSettings::default();
  let outcome = Pipeline::new(&s, &extractor, &settings)
    .process(log_id)
    .await
    .unwrap();
  assert!(matches!(
    outcome,
    LogOutcome::NeedsAssociation { reason: AmbiguityReason::NoVideoNamed }
  ));
}

#[tokio::test]
async fn general_note_completes_unlinked() {
  let s = store().await;
  video(&s, "one").await;
  video(&s, "two").await;
  let log_id = submit(&s, "feeling good about this week").await;

  let extractor = Extractor::new(ScriptedOracle::new([r#"{"confidence": {}}"#]));
  let settings = PipelineSettings::default();
  let outcome = Pipeline::new(&s, &extractor, &settings)
    .process(log_id)
    .await
    .unwrap();

  assert!(matches!(outcome, LogOutcome::Unlinked));
  let entry = s.get_log_entry(log_id).await.unwrap().unwrap();
  assert_eq!(entry.status, LogStatus::Completed);
  assert_eq!(entry.video_id, None);
}

#[tokio::test]
async fn unusable_oracle_marks_entry_failed_after_one_retry() {
  let s = store().await;
  video(&s, "one").await;
  let log_id = submit(&s, "12k views").await;

  let extractor = Extractor::new(ScriptedOracle::new([
    "I'm not sure what you mean.",
    r#"{"metrics": {"views": "#,
    r#"{"metrics": {"views": 1}}"#,
  ]));
  let settings = PipelineSettings::default();
  let outcome = Pipeline::new(&s, &extractor, &settings)
    .process(log_id)
    .await
    .unwrap();

  let LogOutcome::Failed { message } = outcome else {
    panic!("expected failure, got {outcome:?}");
  };
  assert!(message.contains("JSON"));
  assert_eq!(extractor.oracle().remaining(), 1);

  let entry = s.get_log_entry(log_id).await.unwrap().unwrap();
  assert_eq!(entry.status, LogStatus::Failed);
  assert_eq!(entry.error.as_deref(), Some(message.as_str()));
  assert!(s.latest_transcript(log_id).await.unwrap().is_none());
}

#[tokio::test]
async fn settled_entries_are_skipped() {
  let s = store().await;
  let log_id = submit(&s, "anything").await;

  let extractor = Extractor::new(ScriptedOracle::new([r#"{}"#]));
  let settings = PipelineSettings::default();
  let pipeline = Pipeline::new(&s, &extractor, &settings);

  pipeline.process(log_id).await.unwrap();
  let again = pipeline.process(log_id).await.unwrap();
  assert!(matches!(
    again,
    LogOutcome::Skipped { status: LogStatus::Completed }
  ));
  assert_eq!(extractor.oracle().requests().len(), 1);
}

#[tokio::test]
async fn voice_entry_without_text_fails() {
  let s = store().await;
  let log_id = s
    .create_log_entry(NewLogEntry {
      kind:      LogKind::Voice,
      raw_text:  None,
      audio_ref: Some("s3://bucket/memo.m4a".into()),
      actor_id:  "creator".into(),
    })
    .await
    .unwrap()
    .log_id;

  let extractor = Extractor::new(ScriptedOracle::default());
  let settings = PipelineSettings::default();
  let outcome = Pipeline::new(&s, &extractor, &settings)
    .process(log_id)
    .await
    .unwrap();

  assert!(matches!(outcome, LogOutcome::Failed { .. }));
  assert!(extractor.oracle().requests().is_empty());
}

#[tokio::test]
async fn low_confidence_match_is_deferred_when_configured() {
  let s = store().await;
  let v = video(&s, "Only video").await;
  let log_id = submit(&s, "maybe that one got 5 saves").await;

  let reply = format!(
    r#"{{"videoId": "{}", "videoConfidence": 0.4, "metrics": {{"saves": 5}}}}"#,
    v.video_id
  );
  let extractor = Extractor::new(ScriptedOracle::new([reply]));
  let settings = PipelineSettings { min_video_confidence: 0.6, ..Default::default() };
  let outcome = Pipeline::new(&s, &extractor, &settings)
    .process(log_id)
    .await
    .unwrap();

  assert!(matches!(
    outcome,
    LogOutcome::NeedsAssociation { reason: AmbiguityReason::LowConfidence }
  ));
}

#[tokio::test]
async fn store_failure_while_gathering_context_marks_entry_failed() {
  for operation in ["list_videos", "list_log_entries"] {
    let s = FaultyStore::new(store().await);
    let log_id = submit(&s.inner, "got 2k views").await;
    s.fail(operation);

    let extractor = Extractor::new(ScriptedOracle::default());
    let settings = PipelineSettings::default();
    let err = Pipeline::new(&s, &extractor, &settings)
      .process(log_id)
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Store(_)));

    let entry = s.inner.get_log_entry(log_id).await.unwrap().unwrap();
    assert_eq!(entry.status, LogStatus::Failed, "{operation}");
    assert_eq!(
      entry.error.as_deref(),
      Some(format!("store error: {operation} is unavailable").as_str())
    );
    assert!(extractor.oracle().requests().is_empty());
  }
}

#[tokio::test]
async fn store_failure_after_extraction_marks_entry_failed() {
  let s = FaultyStore::new(store().await);
  video(&s.inner, "Only one").await;
  let log_id = submit(&s.inner, "got 2k views").await;
  s.fail("upsert_metrics");

  let extractor = Extractor::new(ScriptedOracle::new([
    r#"{"platform": "tiktok", "metrics": {"views": "2k"}}"#,
  ]));
  let settings = PipelineSettings::default();
  Pipeline::new(&s, &extractor, &settings)
    .process(log_id)
    .await
    .unwrap_err();

  let entry = s.inner.get_log_entry(log_id).await.unwrap().unwrap();
  assert_eq!(entry.status, LogStatus::Failed);
  assert_eq!(
    entry.error.as_deref(),
    Some("store error: upsert_metrics is unavailable")
  );
}
