//! Server configuration: a TOML file layered under `VIDLOG_` environment
//! variables (`VIDLOG_PORT`, `VIDLOG_ORACLE__API_KEY`, ...).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vidlog_core::settings::PipelineSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path:    PathBuf,
  /// Actor recorded for writes that carry no `x-actor-id` header.
  pub default_actor: String,
  pub oracle:        OracleConfig,
  pub pipeline:      PipelineSettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:          "127.0.0.1".to_string(),
      port:          8080,
      store_path:    PathBuf::from("~/.local/share/vidlog/vidlog.db"),
      default_actor: "creator".to_string(),
      oracle:        OracleConfig::default(),
      pipeline:      PipelineSettings::default(),
    }
  }
}

/// An OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
  /// Base URL; `/chat/completions` is appended.
  pub endpoint:     String,
  pub api_key:      Option<String>,
  pub model:        String,
  pub timeout_secs: u64,
}

impl Default for OracleConfig {
  fn default() -> Self {
    Self {
      endpoint:     "https://api.openai.com/v1".to_string(),
      api_key:      None,
      model:        "gpt-4o-mini".to_string(),
      timeout_secs: 60,
    }
  }
}

impl ServerConfig {
  /// Read `path` (optional) and the environment. Keys missing from both
  /// keep their defaults.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("VIDLOG")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
