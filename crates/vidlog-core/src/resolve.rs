//! Video resolution: which known video does a candidate refer to?

use serde::Serialize;
use uuid::Uuid;

use crate::oracle::ExtractionCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolverPolicy {
  pub min_video_confidence: f64,
}

/// Why a candidate could not be attached automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityReason {
  /// The oracle itself asked for a human choice.
  Flagged,
  /// The oracle named an id that is not one of the user's videos.
  UnknownVideo,
  /// The oracle named a video but with too little confidence.
  LowConfidence,
  /// There is data to attach but no video was named.
  NoVideoNamed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  /// Merge into this video.
  Resolved(Uuid),
  /// Defer to a human; nothing is merged.
  NeedsAssociation(AmbiguityReason),
  /// Nothing to attach; the log completes without a video.
  Unlinked,
}

/// Decide where `candidate` belongs among `known` video ids.
///
/// Rules, in order:
/// 1. An ambiguity flag always defers.
/// 2. A named id is used if it is known and confident enough.
/// 3. With nothing to merge, the entry completes unlinked.
/// 4. With exactly one known video, unnamed content attaches to it.
/// 5. Otherwise the entry waits for association.
pub fn resolve(
  candidate: &ExtractionCandidate,
  known: &[Uuid],
  policy: ResolverPolicy,
) -> Resolution {
  if candidate.needs_video_selection {
    return Resolution::NeedsAssociation(AmbiguityReason::Flagged);
  }

  if let Some(id) = candidate.video_id {
    if !known.contains(&id) {
      return Resolution::NeedsAssociation(AmbiguityReason::UnknownVideo);
    }
    let confidence = candidate.video_confidence.unwrap_or(1.0);
    if confidence < policy.min_video_confidence {
      return Resolution::NeedsAssociation(AmbiguityReason::LowConfidence);
    }
    return Resolution::Resolved(id);
  }

  if !candidate.has_content() {
    return Resolution::Unlinked;
  }

  match known {
    [only] => Resolution::Resolved(*only),
    _ => Resolution::NeedsAssociation(AmbiguityReason::NoVideoNamed),
  }
}
