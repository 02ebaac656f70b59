//! Spreadsheet import: map columns, resolve each row to a video, merge.
//!
//! Every upload is recorded as a versioned [`ImportBatch`]. Rows are
//! processed sequentially; a failing row is reported and skipped, never
//! aborting the batch. Each processed row keeps its raw cells as an
//! [`ImportRow`] so nothing in the sheet is lost, mapped or not.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  field::{CanonicalField, FieldSet, Source, VideoField},
  audit::{EntityType, NewAuditEntry},
  mapping::{ColumnMapping, infer_mapping, unique_headers},
  oracle::{ExtractionOracle, Extractor},
  reconcile::{MergeRequest, Reconciler},
  settings::PipelineSettings,
  store::TrackerStore,
  video::{NewVideo, Platform, Video, VideoOrigin},
};

/// A parsed sheet: one header row plus data rows. Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spreadsheet {
  pub headers: Vec<String>,
  pub rows:    Vec<Vec<String>>,
}

impl Spreadsheet {
  pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
    self.rows.get(row)?.get(column).map(String::as_str)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
  pub batch_id:       Uuid,
  /// Monotonic across all uploads; the highest is the latest.
  pub version:        u64,
  pub file_name:      Option<String>,
  pub content_sha256: String,
  pub row_count:      u64,
  pub column_count:   u64,
  pub actor_id:       String,
  pub uploaded_at:    DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImportBatch {
  pub file_name:      Option<String>,
  pub content_sha256: String,
  pub row_count:      u64,
  pub column_count:   u64,
  pub actor_id:       String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
  pub row_id:     Uuid,
  pub batch_id:   Uuid,
  /// Zero-based index into the sheet's data rows.
  pub row_index:  u64,
  pub video_id:   Option<Uuid>,
  /// Every cell keyed by its column's distinct name (see
  /// [`crate::mapping::unique_headers`]).
  pub raw:        Value,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImportRow {
  pub batch_id:  Uuid,
  pub row_index: u64,
  pub video_id:  Option<Uuid>,
  pub raw:       Value,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
  pub file_name:        Option<String>,
  /// Hex SHA-256 of the uploaded bytes.
  pub content_sha256:   String,
  /// Used for metrics when the sheet has no platform column (or the cell
  /// is blank). Falls back to [`Platform::Other`].
  pub default_platform: Option<Platform>,
  pub actor_id:         String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
  pub row:     usize,
  pub message: String,
}

/// Something about an imported row that was not applied as given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowWarning {
  pub row:     usize,
  pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
  pub batch:               ImportBatch,
  /// `true` if the content matches the previous batch byte for byte.
  pub duplicate_of_latest: bool,
  pub mapping:             BTreeMap<String, String>,
  pub mapping_fallback:    bool,
  pub unmapped_columns:    Vec<String>,
  pub rows_attempted:      usize,
  pub rows_imported:       usize,
  pub rows_skipped:        usize,
  pub rows_failed:         usize,
  pub videos_created:      usize,
  pub fields_applied:      usize,
  pub fields_dropped:      usize,
  pub errors:              Vec<RowError>,
  pub warnings:            Vec<RowWarning>,
}

/// What one row turned into.
enum RowOutcome {
  Imported {
    created: bool,
    applied: usize,
    dropped: usize,
    warning: Option<String>,
  },
  Skipped,
}

/// The video a row resolved to.
struct Found {
  video:   Video,
  created: bool,
  warning: Option<String>,
}

/// Import `sheet` in full. Only failures to record the batch itself are
/// returned as errors; row-level failures end up in the report.
pub async fn import_spreadsheet<S, O>(
  store: &S,
  extractor: &Extractor<O>,
  settings: &PipelineSettings,
  sheet: &Spreadsheet,
  options: ImportOptions,
) -> Result<ImportReport>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let previous = store.latest_import_batch().await.map_err(Error::store)?;
  let batch = store
    .record_import_batch(NewImportBatch {
      file_name:      options.file_name.clone(),
      content_sha256: options.content_sha256.clone(),
      row_count:      sheet.rows.len() as u64,
      column_count:   sheet.headers.len() as u64,
      actor_id:       options.actor_id.clone(),
    })
    .await
    .map_err(Error::store)?;

  let duplicate_of_latest = previous
    .is_some_and(|p| !p.content_sha256.is_empty() && p.content_sha256 == batch.content_sha256);
  if duplicate_of_latest {
    info!(version = batch.version, "upload matches the previous batch");
  }

  let samples: Vec<Vec<String>> = sheet
    .rows
    .iter()
    .take(settings.import_sample_rows)
    .cloned()
    .collect();
  let width = sheet
    .rows
    .iter()
    .map(Vec::len)
    .chain([sheet.headers.len()])
    .max()
    .unwrap_or(0);
  let columns = unique_headers(&sheet.headers, width);
  let mapping = infer_mapping(extractor, &columns[..sheet.headers.len()], &samples).await?;

  let mut report = ImportReport {
    batch: batch.clone(),
    duplicate_of_latest,
    mapping: mapping.as_pairs(),
    mapping_fallback: mapping.fallback,
    unmapped_columns: mapping.unmapped(),
    rows_attempted: sheet.rows.len(),
    rows_imported: 0,
    rows_skipped: 0,
    rows_failed: 0,
    videos_created: 0,
    fields_applied: 0,
    fields_dropped: 0,
    errors: Vec::new(),
    warnings: Vec::new(),
  };

  let importer = RowImporter {
    store,
    reconciler: Reconciler::new(store, settings.date_order),
    mapping: &mapping,
    default_platform: options.default_platform,
    actor_id: &options.actor_id,
  };

  for (index, cells) in sheet.rows.iter().enumerate() {
    let (video_id, outcome) = importer.import_row(sheet.headers.len(), cells).await;

    let recorded = store
      .record_import_row(NewImportRow {
        batch_id: batch.batch_id,
        row_index: index as u64,
        video_id,
        raw: raw_row(&columns, cells),
      })
      .await
      .map_err(Error::store);

    // Merged fields stay merged even if the raw row could not be kept.
    if let Ok(RowOutcome::Imported { created, applied, dropped, warning }) = &outcome {
      report.videos_created += usize::from(*created);
      report.fields_applied += applied;
      report.fields_dropped += dropped;
      if let Some(message) = warning {
        report.warnings.push(RowWarning { row: index, message: message.clone() });
      }
    }

    let outcome = match (outcome, recorded) {
      (Ok(_), Err(e)) => Err(e),
      (Err(e), Err(raw_err)) => {
        warn!(row = index, error = %raw_err, "could not record raw import row");
        Err(e)
      }
      (outcome, Ok(_)) => outcome,
    };
    match outcome {
      Ok(RowOutcome::Imported { .. }) => report.rows_imported += 1,
      Ok(RowOutcome::Skipped) => report.rows_skipped += 1,
      Err(e) => {
        warn!(row = index, error = %e, "import row failed");
        report.rows_failed += 1;
        report.errors.push(RowError { row: index, message: e.to_string() });
      }
    }
  }

  info!(
    version = batch.version,
    imported = report.rows_imported,
    skipped = report.rows_skipped,
    failed = report.rows_failed,
    "import finished"
  );
  Ok(report)
}

struct RowImporter<'a, S> {
  store:            &'a S,
  reconciler:       Reconciler<'a, S>,
  mapping:          &'a ColumnMapping,
  default_platform: Option<Platform>,
  actor_id:         &'a str,
}

/// The mapped content of one row.
#[derive(Default)]
struct RowFields {
  external_id: Option<String>,
  platform:    Option<Platform>,
  fields:      FieldSet,
}

impl<S: TrackerStore> RowImporter<'_, S> {
  /// Returns the video the row landed on (if any) alongside the outcome.
  async fn import_row(
    &self,
    columns: usize,
    cells: &[String],
  ) -> (Option<Uuid>, Result<RowOutcome>) {
    let row = self.map_row(columns, cells);

    let title = row
      .fields
      .video
      .get(&VideoField::Title)
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(str::to_string);

    if title.is_none() && row.external_id.is_none() {
      return (None, Ok(RowOutcome::Skipped));
    }

    let Found { video, created, warning } = match self.find_or_create(&row, title).await {
      Ok(found) => found,
      Err(e) => return (None, Err(e)),
    };

    let result = self
      .reconciler
      .merge(MergeRequest {
        video_id: video.video_id,
        fields:   &row.fields,
        source:   Source::Import,
        actor_id: self.actor_id,
        log_id:   None,
      })
      .await
      .map(|merge| RowOutcome::Imported {
        created,
        applied: merge.changes.len(),
        dropped: merge.dropped.len(),
        warning,
      });
    (Some(video.video_id), result)
  }

  fn map_row(&self, columns: usize, cells: &[String]) -> RowFields {
    let mut row = RowFields::default();
    let mut metrics = BTreeMap::new();

    for column in 0..columns {
      let Some(target) = self.mapping.target(column) else {
        continue;
      };
      let Some(cell) = cells.get(column).map(|c| c.trim()).filter(|c| !c.is_empty())
      else {
        continue;
      };
      let value = Value::String(cell.to_string());
      match target {
        CanonicalField::Video(f) => {
          row.fields.video.insert(f, value);
        }
        CanonicalField::Manual(f) => {
          row.fields.manual.insert(f, value);
        }
        CanonicalField::Metric(f) => {
          metrics.insert(f, value);
        }
        CanonicalField::Platform => row.platform = Platform::parse_loose(cell),
        CanonicalField::ExternalId => row.external_id = Some(cell.to_string()),
      }
    }

    if !metrics.is_empty() {
      let platform = row
        .platform
        .or(self.default_platform)
        .unwrap_or(Platform::Other);
      row.fields.metrics.insert(platform, metrics);
    }
    row
  }

  /// Match by external id, then by case-insensitive title; otherwise create.
  async fn find_or_create(&self, row: &RowFields, title: Option<String>) -> Result<Found> {
    if let Some(external_id) = &row.external_id
      && let Some(video) = self
        .store
        .find_video_by_external_id(external_id.clone())
        .await
        .map_err(Error::store)?
    {
      return Ok(Found { video, created: false, warning: None });
    }

    if let Some(title) = &title {
      let wanted = title.to_lowercase();
      let existing = self
        .store
        .list_videos()
        .await
        .map_err(Error::store)?
        .into_iter()
        .find(|v| v.title.trim().to_lowercase() == wanted);
      if let Some(video) = existing {
        return self.adopt_external_id(video, row.external_id.as_deref()).await;
      }
    }

    let title = title
      .or_else(|| row.external_id.clone())
      .unwrap_or_default();
    let mut input = NewVideo::new(title, VideoOrigin::Import);
    input.external_id = row.external_id.clone();
    let video = self.store.create_video(input).await.map_err(Error::store)?;
    Ok(Found { video, created: true, warning: None })
  }

  /// A title match whose row carries an unknown external id: record the id
  /// on the video if it has none, otherwise keep the existing one and warn.
  async fn adopt_external_id(&self, video: Video, external_id: Option<&str>) -> Result<Found> {
    let Some(external_id) = external_id else {
      return Ok(Found { video, created: false, warning: None });
    };
    if let Some(current) = &video.external_id {
      let warning = (current != external_id).then(|| {
        format!("external id {external_id:?} ignored; video already has {current:?}")
      });
      return Ok(Found { video, created: false, warning });
    }

    self
      .store
      .append_audit(vec![NewAuditEntry {
        entity_type: EntityType::Video,
        entity_id:   video.video_id,
        field:       CanonicalField::ExternalId.name().to_string(),
        old_value:   None,
        new_value:   Value::String(external_id.to_string()),
        source:      Source::Import,
        actor_id:    self.actor_id.to_string(),
      }])
      .await
      .map_err(Error::store)?;
    let video = self
      .store
      .set_external_id(video.video_id, external_id.to_string())
      .await
      .map_err(Error::store)?;
    info!(video_id = %video.video_id, %external_id, "external id recorded on title match");
    Ok(Found { video, created: false, warning: None })
  }
}

/// Every cell keyed by its column name from [`unique_headers`].
fn raw_row(columns: &[String], cells: &[String]) -> Value {
  let raw: Map<String, Value> = columns
    .iter()
    .zip(cells)
    .map(|(name, cell)| (name.clone(), Value::String(cell.clone())))
    .collect();
  Value::Object(raw)
}
