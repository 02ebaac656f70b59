//! Handler for `GET /audit`.
//!
//! Query params map directly to [`AuditQuery`] fields. `entity_ids` is
//! accepted as a comma-separated list.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use uuid::Uuid;
use vidlog_core::{
  audit::{AuditLogEntry, AuditQuery, EntityType},
  oracle::ExtractionOracle,
  store::TrackerStore,
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct AuditParams {
  pub entity_type: Option<EntityType>,
  /// Comma-separated entity ids.
  pub entity_ids:  Option<String>,
  pub field:       Option<String>,
  pub limit:       Option<usize>,
}

/// `GET /audit[?entity_type=...][&entity_ids=...][&field=...][&limit=...]`
pub async fn handler<S, O>(
  State(state): State<ApiState<S, O>>,
  Query(params): Query<AuditParams>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError>
where
  S: TrackerStore,
  O: ExtractionOracle,
{
  let entity_ids = params
    .entity_ids
    .as_deref()
    .unwrap_or_default()
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      s.parse::<Uuid>()
        .map_err(|_| ApiError::BadRequest(format!("invalid entity id: {s}")))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let query = AuditQuery {
    entity_type: params.entity_type,
    entity_ids,
    field: params.field,
    limit: params.limit,
  };
  let entries = state.store.list_audit(&query).await.map_err(ApiError::store)?;
  Ok(Json(entries))
}
