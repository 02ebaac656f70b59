//! Tunables for the ingestion pipeline, deserialised from the server's
//! `[pipeline]` config table.

use serde::{Deserialize, Serialize};

use crate::{parse::DateOrder, resolve::ResolverPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  /// How ambiguous numeric dates (`03/05/2024`) are read.
  pub date_order:           DateOrder,
  /// A named video with a lower `videoConfidence` is sent to manual
  /// association instead. `0.0` disables the check.
  pub min_video_confidence: f64,
  /// How many known videos (newest first) are sent to the oracle.
  pub context_videos:       usize,
  /// How many recent completed log texts are sent to the oracle.
  pub context_history:      usize,
  /// Rows sampled for column-mapping inference.
  pub import_sample_rows:   usize,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      date_order:           DateOrder::MonthFirst,
      min_video_confidence: 0.0,
      context_videos:       50,
      context_history:      5,
      import_sample_rows:   5,
    }
  }
}

impl PipelineSettings {
  pub fn resolver_policy(&self) -> ResolverPolicy {
    ResolverPolicy { min_video_confidence: self.min_video_confidence }
  }
}
