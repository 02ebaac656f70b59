//! Videos and the records that hang off them.
//!
//! A [`Video`] is the identity envelope; narrative metadata lives in exactly
//! one [`ManualFields`] row and performance counters in one
//! [`PlatformMetrics`] row per platform. Both dependent rows are created
//! lazily by upsert the first time a field is written.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::field::{FieldValue, ManualField, MetricField, Source, VideoField};

// ─── Platform ────────────────────────────────────────────────────────────────

/// A platform a video was published on.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
  Tiktok,
  Youtube,
  Instagram,
  Facebook,
  X,
  Linkedin,
  Other,
}

impl Platform {
  /// Lenient lookup for free-form platform names ("TikTok", "YT Shorts",
  /// "Twitter", "IG Reels"). Returns `None` for blank input and
  /// [`Platform::Other`] for anything unrecognised.
  pub fn parse_loose(raw: &str) -> Option<Platform> {
    let key: String = raw
      .trim()
      .to_lowercase()
      .chars()
      .filter(|c| c.is_ascii_alphanumeric())
      .collect();
    if key.is_empty() {
      return None;
    }
    Some(match key.as_str() {
      "tiktok" | "tt" => Self::Tiktok,
      "youtube" | "yt" | "youtubeshorts" | "ytshorts" | "shorts" => {
        Self::Youtube
      }
      "instagram" | "ig" | "insta" | "reels" | "igreels" | "instagramreels" => {
        Self::Instagram
      }
      "facebook" | "fb" | "fbreels" | "facebookreels" => Self::Facebook,
      "x" | "twitter" => Self::X,
      "linkedin" => Self::Linkedin,
      _ => Self::Other,
    })
  }
}

// ─── Video ───────────────────────────────────────────────────────────────────

/// How a video first entered the store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VideoOrigin {
  Manual,
  Sync,
  Import,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
  pub video_id:         Uuid,
  /// The platform's own id for the upload, when synced or imported with one.
  pub external_id:      Option<String>,
  pub title:            String,
  /// Unknown until reconciled from some source.
  pub published_on:     Option<NaiveDate>,
  pub duration_seconds: Option<u64>,
  pub origin:           VideoOrigin,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl Video {
  pub fn field(&self, field: VideoField) -> Option<FieldValue> {
    match field {
      VideoField::Title => Some(FieldValue::Text(self.title.clone())),
      VideoField::PostedAt => self.published_on.map(FieldValue::Date),
      VideoField::Duration => self.duration_seconds.map(FieldValue::Count),
    }
  }
}

/// Input to [`crate::store::TrackerStore::create_video`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewVideo {
  pub title:            String,
  #[serde(default)]
  pub external_id:      Option<String>,
  #[serde(default)]
  pub published_on:     Option<NaiveDate>,
  #[serde(default)]
  pub duration_seconds: Option<u64>,
  #[serde(default = "default_origin")]
  pub origin:           VideoOrigin,
}

fn default_origin() -> VideoOrigin { VideoOrigin::Manual }

impl NewVideo {
  pub fn new(title: impl Into<String>, origin: VideoOrigin) -> Self {
    Self {
      title: title.into(),
      external_id: None,
      published_on: None,
      duration_seconds: None,
      origin,
    }
  }
}

// ─── ManualFields ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualFields {
  pub video_id:        Uuid,
  pub hook:            Option<String>,
  pub caption:         Option<String>,
  pub hashtags:        Option<Vec<String>>,
  pub topic:           Option<String>,
  pub format:          Option<String>,
  pub call_to_action:  Option<String>,
  pub target_audience: Option<String>,
  pub rationale:       Option<String>,
  pub notes:           Option<String>,
  pub updated_at:      DateTime<Utc>,
}

impl ManualFields {
  pub fn field(&self, field: ManualField) -> Option<FieldValue> {
    let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
    match field {
      ManualField::Hook => text(&self.hook),
      ManualField::Caption => text(&self.caption),
      ManualField::Hashtags => self.hashtags.clone().map(FieldValue::List),
      ManualField::Topic => text(&self.topic),
      ManualField::Format => text(&self.format),
      ManualField::CallToAction => text(&self.call_to_action),
      ManualField::TargetAudience => text(&self.target_audience),
      ManualField::Rationale => text(&self.rationale),
      ManualField::Notes => text(&self.notes),
    }
  }
}

// ─── PlatformMetrics ─────────────────────────────────────────────────────────

/// Counters for one `(video, platform)` pair. At most one row exists per
/// pair; writes only touch the fields they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformMetrics {
  pub metrics_id:         Uuid,
  pub video_id:           Uuid,
  pub platform:           Platform,
  pub views:              Option<u64>,
  pub likes:              Option<u64>,
  pub comments:           Option<u64>,
  pub shares:             Option<u64>,
  pub saves:              Option<u64>,
  pub watch_time_seconds: Option<u64>,
  pub followers_gained:   Option<u64>,
  /// Provenance of the latest write.
  pub source:             Source,
  /// The log entry that produced the latest write, if any.
  pub log_id:             Option<Uuid>,
  pub updated_at:         DateTime<Utc>,
}

impl PlatformMetrics {
  pub fn field(&self, field: MetricField) -> Option<FieldValue> {
    let value = match field {
      MetricField::Views => self.views,
      MetricField::Likes => self.likes,
      MetricField::Comments => self.comments,
      MetricField::Shares => self.shares,
      MetricField::Saves => self.saves,
      MetricField::WatchTimeSeconds => self.watch_time_seconds,
      MetricField::FollowersGained => self.followers_gained,
    };
    value.map(FieldValue::Count)
  }
}

// ─── Materialised view ───────────────────────────────────────────────────────

/// A video with everything attached to it. Never stored, always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoView {
  pub video:   Video,
  pub manual:  Option<ManualFields>,
  pub metrics: Vec<PlatformMetrics>,
}
