//! Router tests against an in-memory store and a scripted oracle.

use std::{sync::Arc, time::Duration};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use vidlog_core::{
  log::{LogKind, LogStatus, NewLogEntry},
  oracle::Extractor,
  settings::PipelineSettings,
  store::TrackerStore,
  testing::ScriptedOracle,
  video::{NewVideo, Platform, VideoOrigin},
};
use vidlog_store_sqlite::SqliteStore;

use crate::{ACTOR_HEADER, ApiState, IngestQueue, api_router};

type State = ApiState<SqliteStore, ScriptedOracle>;

async fn make_state(replies: &[&str]) -> State {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let extractor = Arc::new(Extractor::new(ScriptedOracle::new(replies.iter().copied())));
  let settings = Arc::new(PipelineSettings::default());
  let (queue, _worker) = IngestQueue::spawn(store.clone(), extractor.clone(), settings.clone());
  ApiState { store, extractor, settings, queue, default_actor: Arc::from("creator") }
}

async fn send(state: &State, method: &str, uri: &str, body: Option<Value>) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  api_router(state.clone())
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap()
}

async fn send_as(state: &State, actor: &str, method: &str, uri: &str, body: Value) -> Response {
  let req = Request::builder()
    .method(method)
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .header(ACTOR_HEADER, actor)
    .body(Body::from(body.to_string()))
    .unwrap();
  api_router(state.clone()).oneshot(req).await.unwrap()
}

async fn upload_csv(state: &State, uri: &str, csv: &str) -> Response {
  let req = Request::builder()
    .method("POST")
    .uri(uri)
    .header(header::CONTENT_TYPE, "text/csv")
    .body(Body::from(csv.to_string()))
    .unwrap();
  api_router(state.clone()).oneshot(req).await.unwrap()
}

async fn text_of(resp: Response) -> String {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_of(resp: Response) -> Value {
  serde_json::from_str(&text_of(resp).await).unwrap()
}

async fn create_video(state: &State, title: &str) -> Uuid {
  let resp = send(state, "POST", "/videos", Some(json!({ "title": title }))).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = json_of(resp).await;
  body["video"]["video_id"].as_str().unwrap().parse().unwrap()
}

/// Poll until the worker has moved the entry out of `processing`.
async fn settled(state: &State, log_id: Uuid) -> LogStatus {
  for _ in 0..200 {
    let entry = state.store.get_log_entry(log_id).await.unwrap().unwrap();
    if entry.status != LogStatus::Processing {
      return entry.status;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("log entry {log_id} never settled");
}

// ── Videos ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn video_lifecycle() {
  let state = make_state(&[]).await;
  let id = create_video(&state, "Desk tour").await;

  let resp = send(&state, "GET", &format!("/videos/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_of(resp).await["video"]["title"], "Desk tour");

  let resp = send(
    &state,
    "PATCH",
    &format!("/videos/{id}"),
    Some(json!({
      "manual":  { "hook": "You are sitting wrong" },
      "metrics": { "youtube": { "views": "1.5k" } }
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let report = json_of(resp).await;
  assert_eq!(report["changes"].as_array().unwrap().len(), 2);
  assert_eq!(report["changes"][0]["source"], "manual");

  let resp = send(&state, "GET", &format!("/videos/{id}/audit"), None).await;
  let trail = json_of(resp).await;
  assert_eq!(trail.as_array().unwrap().len(), 2);

  let resp = send(&state, "GET", "/videos", None).await;
  let list = json_of(resp).await;
  assert_eq!(list[0]["metrics"][0]["views"], 1500);

  let resp = send(&state, "DELETE", &format!("/videos/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);
  let resp = send(&state, "GET", &format!("/videos/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert!(json_of(resp).await["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn create_with_initial_fields_and_blank_title() {
  let state = make_state(&[]).await;
  let resp = send(
    &state,
    "POST",
    "/videos",
    Some(json!({
      "title":       "Budget hacks",
      "external_id": "yt-7",
      "fields":      { "manual": { "hashtags": "money, budget" } }
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let view = json_of(resp).await;
  assert_eq!(view["manual"]["hashtags"], json!(["#money", "#budget"]));
  assert_eq!(view["video"]["external_id"], "yt-7");

  let resp = send(&state, "POST", "/videos", Some(json!({ "title": "  " }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patching_a_missing_video_is_404() {
  let state = make_state(&[]).await;
  let resp = send(
    &state,
    "PATCH",
    &format!("/videos/{}", Uuid::new_v4()),
    Some(json!({ "video": { "title": "x" } })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn actor_header_is_recorded() {
  let state = make_state(&[]).await;
  let id = create_video(&state, "Desk tour").await;

  send_as(
    &state,
    "editor-2",
    "PATCH",
    &format!("/videos/{id}"),
    json!({ "manual": { "topic": "ergonomics" } }),
  )
  .await;

  let resp = send(&state, "GET", &format!("/audit?entity_ids={id}&field=topic"), None).await;
  let entries = json_of(resp).await;
  assert_eq!(entries.as_array().unwrap().len(), 1);
  assert_eq!(entries[0]["actor_id"], "editor-2");
  assert_eq!(entries[0]["entity_type"], "manual_fields");

  let resp = send(&state, "GET", "/audit?entity_ids=nope", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Logs ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn submitted_log_is_processed_in_the_background() {
  let state = make_state(&[
    r#"{"platform": "tiktok", "metrics": {"views": "12k", "likes": 500}}"#,
  ])
  .await;
  let video_id = create_video(&state, "Why Index Funds Win").await;

  let resp = send(
    &state,
    "POST",
    "/logs",
    Some(json!({ "text": "My TikTok about stocks got 12k views and 500 likes" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::ACCEPTED);
  let entry = json_of(resp).await;
  assert_eq!(entry["status"], "processing");
  let log_id: Uuid = entry["log_id"].as_str().unwrap().parse().unwrap();

  assert_eq!(settled(&state, log_id).await, LogStatus::Completed);

  let resp = send(&state, "GET", &format!("/logs/{log_id}"), None).await;
  let detail = json_of(resp).await;
  assert_eq!(detail["video_id"], video_id.to_string());
  assert_eq!(detail["transcript"]["extracted"]["metrics"]["views"], "12k");

  let metrics = state
    .store
    .get_metrics(video_id, Platform::Tiktok)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(metrics.views, Some(12_000));
}

#[tokio::test]
async fn ambiguous_log_is_associated_once() {
  let state = make_state(&[r#"{"needsVideoSelection": true, "metrics": {"saves": 9}}"#]).await;
  let a = create_video(&state, "Budget hacks part 1").await;
  create_video(&state, "Budget hacks part 2").await;

  let resp = send(&state, "POST", "/logs", Some(json!({ "text": "budget video got 9 saves" }))).await;
  let log_id: Uuid = json_of(resp).await["log_id"].as_str().unwrap().parse().unwrap();
  assert_eq!(settled(&state, log_id).await, LogStatus::NeedsAssociation);

  let resp = send(&state, "GET", "/logs?status=needs_association", None).await;
  assert_eq!(json_of(resp).await.as_array().unwrap().len(), 1);

  let uri = format!("/logs/{log_id}/associate");
  let resp = send(&state, "POST", &uri, Some(json!({ "videoId": a }))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_of(resp).await["changes"].as_array().unwrap().len(), 1);

  let resp = send(&state, "POST", &uri, Some(json!({ "videoId": a }))).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn associate_unknown_log_is_404() {
  let state = make_state(&[]).await;
  let uri = format!("/logs/{}/associate", Uuid::new_v4());
  let resp = send(&state, "POST", &uri, Some(json!({ "videoId": Uuid::new_v4() }))).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_log_is_rejected() {
  let state = make_state(&[]).await;
  let resp = send(&state, "POST", "/logs", Some(json!({ "text": "   " }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_entries_resume_on_start() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  store
    .create_video(NewVideo::new("Only video", VideoOrigin::Manual))
    .await
    .unwrap();
  let entry = store
    .create_log_entry(NewLogEntry {
      kind:      LogKind::Text,
      raw_text:  Some("40 shares".into()),
      audio_ref: None,
      actor_id:  "creator".into(),
    })
    .await
    .unwrap();

  let extractor = Arc::new(Extractor::new(ScriptedOracle::new([r#"{"metrics": {"shares": 40}}"#])));
  let settings = Arc::new(PipelineSettings::default());
  let (queue, _worker) = IngestQueue::spawn(store.clone(), extractor.clone(), settings.clone());

  assert_eq!(queue.resume_pending(&*store).await.unwrap(), 1);
  let state = ApiState { store, extractor, settings, queue, default_actor: Arc::from("creator") };
  assert_eq!(settled(&state, entry.log_id).await, LogStatus::Completed);
}

// ── Imports, sync, export ───────────────────────────────────────────────────

#[tokio::test]
async fn csv_upload_then_export() {
  let state = make_state(&[]).await;
  let csv = "Title,Views,Post Date\r\n\"Budget hacks, part 1\",1.2k,03/05/24\r\n";

  let resp = upload_csv(&state, "/imports?file_name=tiktok.csv&platform=TikTok", csv).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let report = json_of(resp).await;
  assert_eq!(report["rows_imported"], 1);
  assert_eq!(report["mapping"]["Views"], "views");
  let batch_id = report["batch"]["batch_id"].as_str().unwrap().to_string();

  let resp = send(&state, "GET", "/imports/latest", None).await;
  let latest = json_of(resp).await;
  assert_eq!(latest["version"], 1);
  assert_eq!(latest["file_name"], "tiktok.csv");
  assert_eq!(latest["content_sha256"].as_str().unwrap().len(), 64);

  let resp = send(&state, "GET", &format!("/imports/{batch_id}/rows"), None).await;
  assert_eq!(json_of(resp).await[0]["raw"]["Views"], "1.2k");

  let resp = send(&state, "GET", "/export.csv", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert!(
    resp.headers()[header::CONTENT_TYPE]
      .to_str()
      .unwrap()
      .starts_with("text/csv")
  );
  let exported = text_of(resp).await;
  let mut lines = exported.split("\r\n");
  assert!(lines.next().unwrap().starts_with("videoId,externalId,title,postedAt"));
  let row = lines.next().unwrap();
  assert!(row.contains("\"Budget hacks, part 1\",2024-03-05,,tiktok,1200"));
}

#[tokio::test]
async fn latest_import_before_any_upload_is_404() {
  let state = make_state(&[]).await;
  let resp = send(&state, "GET", "/imports/latest", None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_csv_is_400() {
  let state = make_state(&[]).await;
  let resp = upload_csv(&state, "/imports", "Title\n\"never closed\n").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_of(resp).await["error"].as_str().unwrap().contains("invalid CSV"));
}

#[tokio::test]
async fn sync_merges_by_external_id() {
  let state = make_state(&[]).await;
  let records = json!([{
    "externalId":  "yt-1",
    "title":       "Desk tour",
    "publishedAt": "2024-03-05T17:30:00Z",
    "metrics":     { "views": 100 }
  }]);

  let resp = send(&state, "POST", "/sync", Some(records.clone())).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_of(resp).await["created"], 1);

  let resp = send(&state, "POST", "/sync", Some(records)).await;
  let report = json_of(resp).await;
  assert_eq!(report["created"], 0);
  assert_eq!(report["unchanged"], 1);
}
