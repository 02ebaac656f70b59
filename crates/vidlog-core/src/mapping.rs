//! Column mapping for spreadsheet imports.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
  Result,
  field::{CanonicalField, ManualField, MetricField, VideoField},
  oracle::{ExtractionOracle, Extractor},
};

/// Where each column of a sheet goes. `None` means the column is kept only
/// in the raw row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMapping {
  pub headers: Vec<String>,
  pub targets: Vec<Option<CanonicalField>>,
  /// `true` if the mapping came from header aliases rather than the oracle.
  pub fallback: bool,
}

impl ColumnMapping {
  pub fn from_pairs(headers: &[String], pairs: &BTreeMap<String, CanonicalField>) -> Self {
    Self {
      headers:  headers.to_vec(),
      targets:  headers.iter().map(|h| pairs.get(h).copied()).collect(),
      fallback: false,
    }
  }

  pub fn target(&self, column: usize) -> Option<CanonicalField> {
    self.targets.get(column).copied().flatten()
  }

  pub fn mapped_count(&self) -> usize { self.targets.iter().flatten().count() }

  pub fn unmapped(&self) -> Vec<String> {
    self
      .headers
      .iter()
      .zip(&self.targets)
      .filter(|(_, t)| t.is_none())
      .map(|(h, _)| h.clone())
      .collect()
  }

  /// `header → field name` for the mapped columns.
  pub fn as_pairs(&self) -> BTreeMap<String, String> {
    self
      .headers
      .iter()
      .zip(&self.targets)
      .filter_map(|(h, t)| t.map(|t| (h.clone(), t.name().to_string())))
      .collect()
  }
}

/// One distinct name per column, `width` columns wide. Blank headers and
/// cells past the header row become `column_<n>`; repeats get a `_2`, `_3`
/// suffix so no two columns share a key.
pub fn unique_headers(headers: &[String], width: usize) -> Vec<String> {
  let mut seen = HashSet::new();
  let mut names = Vec::with_capacity(width.max(headers.len()));
  for i in 0..width.max(headers.len()) {
    let base = headers
      .get(i)
      .filter(|h| !h.trim().is_empty())
      .cloned()
      .unwrap_or_else(|| format!("column_{}", i + 1));
    let mut name = base.clone();
    let mut n = 2;
    while !seen.insert(name.clone()) {
      name = format!("{base}_{n}");
      n += 1;
    }
    names.push(name);
  }
  names
}

/// Ask the oracle for a mapping; fall back to [`alias_mapping`] if it gives
/// up.
pub async fn infer_mapping<O: ExtractionOracle>(
  extractor: &Extractor<O>,
  headers: &[String],
  samples: &[Vec<String>],
) -> Result<ColumnMapping> {
  match extractor.map_columns(headers, samples).await {
    Ok(pairs) => {
      let mapping = ColumnMapping::from_pairs(headers, &pairs);
      info!(mapped = mapping.mapped_count(), columns = headers.len(), "inferred column mapping");
      Ok(mapping)
    }
    Err(crate::Error::ExtractionFailed(reason)) => {
      warn!(%reason, "column mapping inference failed, using header aliases");
      Ok(alias_mapping(headers))
    }
    Err(e) => Err(e),
  }
}

/// Map headers by their normalised text. Each target is used at most once.
pub fn alias_mapping(headers: &[String]) -> ColumnMapping {
  let mut targets = Vec::with_capacity(headers.len());
  for header in headers {
    let target = header
      .trim()
      .parse()
      .ok()
      .or_else(|| alias(&normalize_header(header)))
      .filter(|t| !targets.contains(&Some(*t)));
    targets.push(target);
  }
  ColumnMapping { headers: headers.to_vec(), targets, fallback: true }
}

/// Lowercase, with everything but letters and digits collapsed to single
/// spaces.
fn normalize_header(header: &str) -> String {
  header
    .to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

fn alias(normalized: &str) -> Option<CanonicalField> {
  use CanonicalField as C;

  let field = match normalized {
    "title" | "video title" | "name" | "video" => C::Video(VideoField::Title),
    "posted at" | "post date" | "posted" | "date" | "published" | "publish date"
    | "upload date" | "posted on" => C::Video(VideoField::PostedAt),
    "duration" | "length" | "video length" | "duration seconds" => {
      C::Video(VideoField::Duration)
    }
    "external id" | "video id" | "id" | "url" | "link" => C::ExternalId,
    "platform" | "network" | "channel" => C::Platform,
    "views" | "plays" | "view count" | "impressions" => C::Metric(MetricField::Views),
    "likes" | "like count" | "hearts" => C::Metric(MetricField::Likes),
    "comments" | "comment count" => C::Metric(MetricField::Comments),
    "shares" | "share count" | "reposts" => C::Metric(MetricField::Shares),
    "saves" | "save count" | "bookmarks" => C::Metric(MetricField::Saves),
    "watch time" | "watch time seconds" | "total watch time" | "watch time s" => {
      C::Metric(MetricField::WatchTimeSeconds)
    }
    "followers gained" | "new followers" | "follows" | "followers" => {
      C::Metric(MetricField::FollowersGained)
    }
    "hook" => C::Manual(ManualField::Hook),
    "caption" | "description" => C::Manual(ManualField::Caption),
    "hashtags" | "tags" => C::Manual(ManualField::Hashtags),
    "topic" | "subject" => C::Manual(ManualField::Topic),
    "format" | "style" => C::Manual(ManualField::Format),
    "call to action" | "cta" => C::Manual(ManualField::CallToAction),
    "target audience" | "audience" => C::Manual(ManualField::TargetAudience),
    "rationale" | "why" => C::Manual(ManualField::Rationale),
    "notes" | "note" | "comments notes" => C::Manual(ManualField::Notes),
    other => return camel(other),
  };
  Some(field)
}

/// `"call to action"` → `callToAction`, then parsed as a field name.
fn camel(normalized: &str) -> Option<CanonicalField> {
  let mut out = String::new();
  for (i, word) in normalized.split(' ').enumerate() {
    let mut chars = word.chars();
    if let Some(first) = chars.next() {
      if i == 0 {
        out.push(first);
      } else {
        out.extend(first.to_uppercase());
      }
      out.extend(chars);
    }
  }
  out.parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::ScriptedOracle;

  fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn aliases_cover_common_headers() {
    let mapping = alias_mapping(&headers(&["Title", "Post Date", "Plays", "Watch Time", "Mood"]));
    assert_eq!(
      mapping.targets,
      vec![
        Some(CanonicalField::Video(VideoField::Title)),
        Some(CanonicalField::Video(VideoField::PostedAt)),
        Some(CanonicalField::Metric(MetricField::Views)),
        Some(CanonicalField::Metric(MetricField::WatchTimeSeconds)),
        None,
      ]
    );
    assert_eq!(mapping.unmapped(), vec!["Mood".to_string()]);
    assert!(mapping.fallback);
  }

  #[test]
  fn canonical_names_map_directly() {
    let mapping = alias_mapping(&headers(&["followersGained", "Target Audience"]));
    assert_eq!(
      mapping.target(0),
      Some(CanonicalField::Metric(MetricField::FollowersGained))
    );
    assert_eq!(
      mapping.target(1),
      Some(CanonicalField::Manual(ManualField::TargetAudience))
    );
  }

  #[test]
  fn duplicate_alias_targets_map_once() {
    let mapping = alias_mapping(&headers(&["Views", "Plays"]));
    assert_eq!(mapping.mapped_count(), 1);
    assert_eq!(mapping.target(1), None);
  }

  #[test]
  fn repeated_and_blank_headers_get_distinct_names() {
    assert_eq!(
      unique_headers(&headers(&["Title", "Notes", "Notes", "", "Notes_2"]), 6),
      headers(&["Title", "Notes", "Notes_2", "column_4", "Notes_2_2", "column_6"])
    );
  }

  #[test]
  fn renamed_duplicates_do_not_share_a_target() {
    let mapping = alias_mapping(&unique_headers(&headers(&["Notes", "Notes"]), 2));
    assert_eq!(mapping.target(0), Some(CanonicalField::Manual(ManualField::Notes)));
    assert_eq!(mapping.target(1), None);
    assert_eq!(mapping.unmapped(), vec!["Notes_2".to_string()]);
  }

  #[tokio::test]
  async fn oracle_mapping_is_used_when_valid() {
    let extractor = Extractor::new(ScriptedOracle::new([
      r#"{"Clip": "title", "Seen by": "views"}"#,
    ]));
    let mapping = infer_mapping(&extractor, &headers(&["Clip", "Seen by", "Extra"]), &[])
      .await
      .unwrap();
    assert!(!mapping.fallback);
    assert_eq!(mapping.target(0), Some(CanonicalField::Video(VideoField::Title)));
    assert_eq!(mapping.target(1), Some(CanonicalField::Metric(MetricField::Views)));
    assert_eq!(mapping.target(2), None);
  }

  #[tokio::test]
  async fn falls_back_to_aliases_when_oracle_fails() {
    let extractor = Extractor::new(ScriptedOracle::new(["nope", "still nope"]));
    let mapping = infer_mapping(&extractor, &headers(&["Title", "Views"]), &[])
      .await
      .unwrap();
    assert!(mapping.fallback);
    assert_eq!(mapping.mapped_count(), 2);
  }
}
