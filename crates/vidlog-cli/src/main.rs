//! `vidlog`: command-line client for the vidlog server.
//!
//! # Usage
//!
//! ```text
//! vidlog log "my tiktok about stocks got 12k views" --wait
//! vidlog associate <LOG_ID> <VIDEO_ID>
//! vidlog import tiktok-export.csv --platform tiktok
//! vidlog export -o videos.csv
//! ```

mod client;
mod render;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vidlog_core::log::{LogEntry, LogStatus};

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vidlog", about = "Log and query video analytics")]
struct Args {
  /// Path to a TOML config file (url, actor).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the vidlog server (default: http://localhost:8080).
  #[arg(long, env = "VIDLOG_URL")]
  url: Option<String>,

  /// Actor id recorded on writes.
  #[arg(long, env = "VIDLOG_ACTOR")]
  actor: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Submit a free-text log entry.
  Log {
    /// The note; multiple words are joined with spaces.
    #[arg(required = true)]
    text: Vec<String>,
    /// Wait until the entry leaves `processing`.
    #[arg(long)]
    wait: bool,
  },
  /// Show a log entry's status.
  Status {
    log_id: Uuid,
    #[arg(long)]
    wait:   bool,
  },
  /// Attach a `needs_association` entry to a video.
  Associate { log_id: Uuid, video_id: Uuid },
  /// List videos with their per-platform views.
  Videos,
  /// Upload a CSV spreadsheet.
  Import {
    file:     PathBuf,
    /// Platform for rows without a platform column.
    #[arg(long)]
    platform: Option<String>,
  },
  /// Download every video as CSV.
  Export {
    /// Write to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:   String,
  #[serde(default)]
  actor: String,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    actor:    args
      .actor
      .or_else(|| (!file_cfg.actor.is_empty()).then(|| file_cfg.actor.clone()))
      .unwrap_or_default(),
  };
  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::Log { text, wait } => {
      let entry = client.submit_log(&text.join(" ")).await?;
      let entry = if wait { wait_for(&client, entry).await? } else { entry };
      println!("{}", render::log_line(&entry));
    }
    Command::Status { log_id, wait } => {
      let entry = client.get_log(log_id).await?;
      let entry = if wait { wait_for(&client, entry).await? } else { entry };
      println!("{}", render::log_line(&entry));
    }
    Command::Associate { log_id, video_id } => {
      let report = client.associate(log_id, video_id).await?;
      println!("{}", render::merge_summary(&report));
    }
    Command::Videos => {
      let views = client.list_videos().await?;
      print!("{}", render::videos_table(&views));
    }
    Command::Import { file, platform } => {
      let csv = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
      let file_name = file.file_name().and_then(|n| n.to_str());
      let report = client.import_csv(csv, file_name, platform.as_deref()).await?;
      println!("{}", render::import_summary(&report));
    }
    Command::Export { output } => {
      let csv = client.export_csv().await?;
      match output {
        Some(path) => std::fs::write(&path, csv)
          .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{csv}"),
      }
    }
  }
  Ok(())
}

/// Poll every 500 ms, for up to two minutes, until the entry settles.
async fn wait_for(client: &ApiClient, mut entry: LogEntry) -> Result<LogEntry> {
  for _ in 0..240 {
    if entry.status != LogStatus::Processing {
      return Ok(entry);
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    entry = client.get_log(entry.log_id).await?;
  }
  bail!("log entry {} is still processing", entry.log_id)
}
