//! The field-level audit log.
//!
//! Entries are append-only: the store never updates or deletes them. Each
//! entry describes one field of one entity changing from `old_value` to
//! `new_value`. Entities are referenced polymorphically by
//! `(entity_type, entity_id)`, not by foreign key, so entries outlive the
//! rows they describe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::field::Source;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
  /// `entity_id` is the video id.
  Video,
  /// `entity_id` is the owning video id (the relation is 1:1).
  ManualFields,
  /// `entity_id` is the metrics row id.
  PlatformMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
  pub audit_id:    Uuid,
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub field:       String,
  /// `None` when the field had no value before this change.
  pub old_value:   Option<serde_json::Value>,
  pub new_value:   serde_json::Value,
  pub source:      Source,
  pub actor_id:    String,
  /// Server-assigned; never changes after creation.
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::TrackerStore::append_audit`].
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub field:       String,
  pub old_value:   Option<serde_json::Value>,
  pub new_value:   serde_json::Value,
  pub source:      Source,
  pub actor_id:    String,
}

/// Parameters for [`crate::store::TrackerStore::list_audit`]. Results are
/// in insertion order.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
  pub entity_type: Option<EntityType>,
  /// Empty means "any entity".
  pub entity_ids:  Vec<Uuid>,
  pub field:       Option<String>,
  pub limit:       Option<usize>,
}
