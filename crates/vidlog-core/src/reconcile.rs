//! The reconciliation engine: field-level merge with an audit trail.
//!
//! For every field in an incoming [`FieldSet`]:
//!
//! 1. read the stored value (absent if the row does not exist yet);
//! 2. parse the raw input; unparsable input is dropped, never written;
//! 3. if the parsed value differs from the stored one, queue an audit entry;
//! 4. append the audit entries for the row, *then* upsert only the changed
//!    fields.
//!
//! Audit entries are always persisted before the value they describe, so a
//! crash in between can leave an orphaned audit entry but never an
//! unaudited change. A row with no changed fields is not written at all,
//! which makes re-applying the same input a no-op.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  audit::{AuditLogEntry, EntityType, NewAuditEntry},
  field::{FieldSet, FieldValue, Patch, Source},
  parse::DateOrder,
  store::{MetricsUpsert, TrackerStore},
  video::Platform,
};

/// One merge operation's inputs.
#[derive(Debug, Clone)]
pub struct MergeRequest<'a> {
  pub video_id: Uuid,
  pub fields:   &'a FieldSet,
  pub source:   Source,
  pub actor_id: &'a str,
  /// The log entry that produced this input, recorded on metrics rows.
  pub log_id:   Option<Uuid>,
}

/// A field whose raw input could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedField {
  pub entity_type: EntityType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub platform:    Option<Platform>,
  pub field:       String,
  pub raw:         Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
  /// One entry per field whose stored value changed.
  pub changes: Vec<AuditLogEntry>,
  pub dropped: Vec<DroppedField>,
}

impl MergeReport {
  pub fn is_noop(&self) -> bool { self.changes.is_empty() }
}

/// Runs merges against a store.
pub struct Reconciler<'a, S> {
  store:      &'a S,
  date_order: DateOrder,
}

/// The diff for one row, before anything is persisted.
struct RowDiff<F> {
  patch:   Patch<F>,
  audit:   Vec<NewAuditEntry>,
  dropped: Vec<DroppedField>,
}

impl<'a, S: TrackerStore> Reconciler<'a, S> {
  pub fn new(store: &'a S, date_order: DateOrder) -> Self {
    Self { store, date_order }
  }

  /// Merge `request.fields` into the video. Fails with
  /// [`Error::VideoNotFound`] before any write if the video is missing.
  pub async fn merge(&self, request: MergeRequest<'_>) -> Result<MergeReport> {
    let MergeRequest { video_id, fields, source, actor_id, log_id } = request;

    let video = self
      .store
      .get_video(video_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::VideoNotFound(video_id))?;

    let mut report = MergeReport::default();

    // ── Video attributes ────────────────────────────────────────────────
    let diff = diff_row(
      &fields.video,
      |f| video.field(*f),
      |f, raw| f.parse_value(raw, self.date_order),
      EntityType::Video,
      video_id,
      None,
      source,
      actor_id,
    );
    report.dropped.extend(diff.dropped);
    if !diff.patch.is_empty() {
      report.changes.extend(self.append(diff.audit).await?);
      self
        .store
        .update_video(video_id, diff.patch)
        .await
        .map_err(Error::store)?;
    }

    // ── Manual fields ───────────────────────────────────────────────────
    if !fields.manual.is_empty() {
      let current = self
        .store
        .get_manual_fields(video_id)
        .await
        .map_err(Error::store)?;
      let diff = diff_row(
        &fields.manual,
        |f| current.as_ref().and_then(|m| m.field(*f)),
        |f, raw| f.parse_value(raw),
        EntityType::ManualFields,
        video_id,
        None,
        source,
        actor_id,
      );
      report.dropped.extend(diff.dropped);
      if !diff.patch.is_empty() {
        report.changes.extend(self.append(diff.audit).await?);
        self
          .store
          .upsert_manual_fields(video_id, diff.patch)
          .await
          .map_err(Error::store)?;
      }
    }

    // ── Platform metrics ────────────────────────────────────────────────
    for (platform, metrics) in &fields.metrics {
      if metrics.is_empty() {
        continue;
      }
      let current = self
        .store
        .get_metrics(video_id, *platform)
        .await
        .map_err(Error::store)?;
      let metrics_id = current
        .as_ref()
        .map(|m| m.metrics_id)
        .unwrap_or_else(Uuid::new_v4);

      let diff = diff_row(
        metrics,
        |f| current.as_ref().and_then(|m| m.field(*f)),
        |f, raw| f.parse_value(raw),
        EntityType::PlatformMetrics,
        metrics_id,
        Some(*platform),
        source,
        actor_id,
      );
      report.dropped.extend(diff.dropped);
      if !diff.patch.is_empty() {
        report.changes.extend(self.append(diff.audit).await?);
        self
          .store
          .upsert_metrics(MetricsUpsert {
            metrics_id,
            video_id,
            platform: *platform,
            patch: diff.patch,
            source,
            log_id,
          })
          .await
          .map_err(Error::store)?;
      }
    }

    for dropped in &report.dropped {
      warn!(
        %video_id,
        entity = %dropped.entity_type,
        field = %dropped.field,
        raw = %dropped.raw,
        "unparsable value dropped"
      );
    }
    if report.is_noop() {
      debug!(%video_id, %source, "merge found no changes");
    } else {
      info!(%video_id, %source, changes = report.changes.len(), "merged fields");
    }

    Ok(report)
  }

  async fn append(&self, audit: Vec<NewAuditEntry>) -> Result<Vec<AuditLogEntry>> {
    self.store.append_audit(audit).await.map_err(Error::store)
  }
}

/// Compare raw input for one row against its stored values.
#[allow(clippy::too_many_arguments)]
fn diff_row<F>(
  input: &BTreeMap<F, Value>,
  current: impl Fn(&F) -> Option<FieldValue>,
  parse: impl Fn(&F, &Value) -> Option<FieldValue>,
  entity_type: EntityType,
  entity_id: Uuid,
  platform: Option<Platform>,
  source: Source,
  actor_id: &str,
) -> RowDiff<F>
where
  F: Ord + Copy + Into<&'static str>,
{
  let mut diff = RowDiff {
    patch:   Patch::new(),
    audit:   Vec::new(),
    dropped: Vec::new(),
  };

  for (field, raw) in input {
    if raw.is_null() {
      continue;
    }
    let name: &'static str = (*field).into();

    let Some(new) = parse(field, raw) else {
      diff.dropped.push(DroppedField {
        entity_type,
        platform,
        field: name.to_string(),
        raw: raw.clone(),
      });
      continue;
    };

    let old = current(field);
    if old.as_ref() == Some(&new) {
      continue;
    }

    diff.audit.push(NewAuditEntry {
      entity_type,
      entity_id,
      field: name.to_string(),
      old_value: old.as_ref().map(FieldValue::to_json),
      new_value: new.to_json(),
      source,
      actor_id: actor_id.to_string(),
    });
    diff.patch.insert(*field, new);
  }

  diff
}
