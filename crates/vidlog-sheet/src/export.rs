//! CSV export of materialised videos.
//!
//! One row per `(video, platform)`; a video with no metrics rows still gets
//! a single row with an empty platform. Header names are the canonical field
//! names, so an exported sheet re-imports without an oracle.

use strum::IntoEnumIterator;
use vidlog_core::{
  field::{FieldValue, ManualField, MetricField, VideoField},
  video::{PlatformMetrics, VideoView},
};

// ─── Layout ──────────────────────────────────────────────────────────────────

/// Column order of [`export`]: identity, video fields, platform, metrics,
/// then manual fields.
pub const EXPORT_HEADERS: &[&str] = &[
  "videoId",
  "externalId",
  "title",
  "postedAt",
  "duration",
  "platform",
  "views",
  "likes",
  "comments",
  "shares",
  "saves",
  "watchTimeSeconds",
  "followersGained",
  "hook",
  "caption",
  "hashtags",
  "topic",
  "format",
  "callToAction",
  "targetAudience",
  "rationale",
  "notes",
];

// ─── Writer ──────────────────────────────────────────────────────────────────

/// Render `views` as CSV with CRLF line endings.
pub fn export(views: &[VideoView]) -> String {
  let mut out = String::new();
  write_record(&mut out, EXPORT_HEADERS.iter().map(|h| h.to_string()));

  for view in views {
    if view.metrics.is_empty() {
      write_record(&mut out, video_row(view, None));
    }
    for metrics in &view.metrics {
      write_record(&mut out, video_row(view, Some(metrics)));
    }
  }
  out
}

fn video_row(view: &VideoView, metrics: Option<&PlatformMetrics>) -> Vec<String> {
  let video = &view.video;
  let mut row = vec![
    video.video_id.to_string(),
    video.external_id.clone().unwrap_or_default(),
  ];
  row.extend(VideoField::iter().map(|f| render(video.field(f))));
  row.push(metrics.map(|m| m.platform.to_string()).unwrap_or_default());
  row.extend(MetricField::iter().map(|f| render(metrics.and_then(|m| m.field(f)))));
  row.extend(
    ManualField::iter().map(|f| render(view.manual.as_ref().and_then(|m| m.field(f)))),
  );
  row
}

fn render(value: Option<FieldValue>) -> String {
  match value {
    None => String::new(),
    Some(FieldValue::Count(n)) => n.to_string(),
    Some(FieldValue::Text(s)) => s,
    Some(FieldValue::List(items)) => items.join(" "),
    Some(FieldValue::Date(d)) => d.format("%Y-%m-%d").to_string(),
  }
}

fn write_record(out: &mut String, fields: impl IntoIterator<Item = String>) {
  for (i, field) in fields.into_iter().enumerate() {
    if i > 0 {
      out.push(',');
    }
    out.push_str(&quote_field(&field));
  }
  out.push_str("\r\n");
}

/// Quote `field` if it contains a comma, quote, CR or LF; embedded quotes
/// are doubled.
pub fn quote_field(field: &str) -> std::borrow::Cow<'_, str> {
  if field.contains([',', '"', '\r', '\n']) {
    format!("\"{}\"", field.replace('"', "\"\"")).into()
  } else {
    field.into()
  }
}
