//! Plain-text rendering of API responses.

use serde_json::Value;
use vidlog_core::{
  log::{LogEntry, LogStatus},
  video::VideoView,
};

pub fn log_line(entry: &LogEntry) -> String {
  let mut line = format!("{}  {}", entry.log_id, entry.status);
  match entry.status {
    LogStatus::Completed => match entry.video_id {
      Some(id) => line.push_str(&format!("  video {id}")),
      None => line.push_str("  (no video)"),
    },
    LogStatus::NeedsAssociation => {
      line.push_str(&format!("  run `vidlog associate {} <VIDEO_ID>`", entry.log_id))
    }
    LogStatus::Failed => {
      if let Some(error) = &entry.error {
        line.push_str(&format!("  {error}"));
      }
    }
    LogStatus::Processing => {}
  }
  line
}

/// One line per video: id, posted date, title, then `platform:views` pairs.
pub fn videos_table(views: &[VideoView]) -> String {
  let mut out = String::new();
  for view in views {
    let video = &view.video;
    let posted = video
      .published_on
      .map(|d| d.format("%Y-%m-%d").to_string())
      .unwrap_or_else(|| "----------".to_string());
    let platforms: Vec<String> = view
      .metrics
      .iter()
      .map(|m| match m.views {
        Some(v) => format!("{}:{v}", m.platform),
        None => m.platform.to_string(),
      })
      .collect();
    out.push_str(&format!("{}  {posted}  {}", video.video_id, video.title));
    if !platforms.is_empty() {
      out.push_str(&format!("  [{}]", platforms.join(" ")));
    }
    out.push('\n');
  }
  out
}

/// Summarise a merge report (`changes` / `dropped` arrays).
pub fn merge_summary(report: &Value) -> String {
  let changes = report["changes"].as_array().map_or(0, Vec::len);
  let dropped = report["dropped"].as_array().map_or(0, Vec::len);
  let mut out = format!("{changes} field(s) changed, {dropped} dropped");
  for change in report["changes"].as_array().into_iter().flatten() {
    out.push_str(&format!(
      "\n  {}: {} -> {}",
      change["field"].as_str().unwrap_or("?"),
      change["old_value"],
      change["new_value"]
    ));
  }
  out
}

pub fn import_summary(report: &Value) -> String {
  let mut out = format!(
    "batch v{}: {} imported, {} skipped, {} failed; {} video(s) created, {} field(s) applied",
    report["batch"]["version"],
    report["rows_imported"],
    report["rows_skipped"],
    report["rows_failed"],
    report["videos_created"],
    report["fields_applied"],
  );
  if report["duplicate_of_latest"].as_bool() == Some(true) {
    out.push_str("\nidentical to the previous upload");
  }
  if let Some(unmapped) = report["unmapped_columns"].as_array()
    && !unmapped.is_empty()
  {
    let names: Vec<&str> = unmapped.iter().filter_map(Value::as_str).collect();
    out.push_str(&format!("\nunmapped columns: {}", names.join(", ")));
  }
  for error in report["errors"].as_array().into_iter().flatten() {
    out.push_str(&format!("\n  row {}: {}", error["row"], error["message"].as_str().unwrap_or("")));
  }
  for warning in report["warnings"].as_array().into_iter().flatten() {
    out.push_str(&format!(
      "\n  row {} (warning): {}",
      warning["row"],
      warning["message"].as_str().unwrap_or("")
    ));
  }
  out
}
