//! CSV codec for vidlog.
//!
//! Reads uploaded spreadsheets into [`vidlog_core::import::Spreadsheet`]
//! and writes materialised videos back out. Pure synchronous; no HTTP or
//! database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! let sheet = vidlog_sheet::parse("Title,Views\r\n\"Hello, world\",1.2k\r\n").unwrap();
//! assert_eq!(sheet.rows[0][0], "Hello, world");
//! ```

pub mod error;
mod export;
mod parse;

pub use error::{Error, Result};
pub use export::{EXPORT_HEADERS, export, quote_field};
use vidlog_core::import::Spreadsheet;

/// Parse a CSV document: the first non-blank record is the header row.
///
/// Accepts a leading UTF-8 BOM, CRLF or LF line endings, and quoted fields
/// containing commas, doubled quotes and line breaks. Blank lines are
/// skipped; rows may be shorter or longer than the header.
pub fn parse(input: &str) -> Result<Spreadsheet> {
  let mut records = parse::records(input)?.into_iter();
  let headers: Vec<String> = records
    .next()
    .ok_or(Error::MissingHeader)?
    .into_iter()
    .map(|h| h.trim().to_string())
    .collect();
  Ok(Spreadsheet { headers, rows: records.collect() })
}

#[cfg(test)]
mod roundtrip_tests {
  use chrono::{NaiveDate, Utc};
  use uuid::Uuid;
  use vidlog_core::{
    field::{CanonicalField, ManualField, MetricField, Source},
    mapping::alias_mapping,
    video::{ManualFields, Platform, PlatformMetrics, Video, VideoOrigin, VideoView},
  };

  use super::*;

  fn view() -> VideoView {
    let now = Utc::now();
    let video_id = Uuid::new_v4();
    let metrics = |platform, views| PlatformMetrics {
      metrics_id: Uuid::new_v4(),
      video_id,
      platform,
      views: Some(views),
      likes: Some(12),
      comments: None,
      shares: None,
      saves: None,
      watch_time_seconds: Some(95),
      followers_gained: None,
      source: Source::Import,
      log_id: None,
      updated_at: now,
    };
    VideoView {
      video:   Video {
        video_id,
        external_id: Some("yt-1".into()),
        title: "Budget hacks, part \"1\"".into(),
        published_on: NaiveDate::from_ymd_opt(2024, 3, 5),
        duration_seconds: Some(58),
        origin: VideoOrigin::Manual,
        created_at: now,
        updated_at: now,
      },
      manual:  Some(ManualFields {
        video_id,
        hook: Some("Stop wasting\nmoney".into()),
        caption: None,
        hashtags: Some(vec!["#money".into(), "#budget".into()]),
        topic: Some("finance".into()),
        format: None,
        call_to_action: None,
        target_audience: None,
        rationale: None,
        notes: None,
        updated_at: now,
      }),
      metrics: vec![metrics(Platform::Tiktok, 12_000), metrics(Platform::Youtube, 300)],
    }
  }

  fn column(sheet: &Spreadsheet, name: &str) -> usize {
    sheet.headers.iter().position(|h| h == name).unwrap()
  }

  #[test]
  fn exported_sheet_parses_back() {
    let view = view();
    let csv = export(std::slice::from_ref(&view));
    let sheet = parse(&csv).unwrap();

    assert_eq!(sheet.headers, EXPORT_HEADERS);
    assert_eq!(sheet.rows.len(), 2);
    let row = &sheet.rows[0];
    assert_eq!(row[column(&sheet, "videoId")], view.video.video_id.to_string());
    assert_eq!(row[column(&sheet, "title")], "Budget hacks, part \"1\"");
    assert_eq!(row[column(&sheet, "postedAt")], "2024-03-05");
    assert_eq!(row[column(&sheet, "platform")], "tiktok");
    assert_eq!(row[column(&sheet, "views")], "12000");
    assert_eq!(row[column(&sheet, "comments")], "");
    assert_eq!(row[column(&sheet, "hook")], "Stop wasting\nmoney");
    assert_eq!(row[column(&sheet, "hashtags")], "#money #budget");
    assert_eq!(sheet.rows[1][column(&sheet, "platform")], "youtube");
  }

  #[test]
  fn exported_headers_map_without_an_oracle() {
    let sheet = parse(&export(&[view()])).unwrap();
    let mapping = alias_mapping(&sheet.headers);

    let target = |name| mapping.target(column(&sheet, name));
    assert_eq!(target("views"), Some(CanonicalField::Metric(MetricField::Views)));
    assert_eq!(target("hashtags"), Some(CanonicalField::Manual(ManualField::Hashtags)));
    assert_eq!(target("platform"), Some(CanonicalField::Platform));
    assert_eq!(target("externalId"), Some(CanonicalField::ExternalId));
  }

  #[test]
  fn video_without_metrics_gets_one_row() {
    let mut view = view();
    view.metrics.clear();
    view.manual = None;
    let sheet = parse(&export(&[view])).unwrap();
    assert_eq!(sheet.rows.len(), 1);
    assert_eq!(sheet.rows[0][column(&sheet, "platform")], "");
    assert_eq!(sheet.rows[0].len(), EXPORT_HEADERS.len());
  }

  #[test]
  fn header_only_and_empty_input() {
    let sheet = parse("\u{feff} Title , Views \r\n").unwrap();
    assert_eq!(sheet.headers, vec!["Title", "Views"]);
    assert!(sheet.rows.is_empty());
    assert_eq!(parse("\r\n\r\n"), Err(Error::MissingHeader));
  }
}
