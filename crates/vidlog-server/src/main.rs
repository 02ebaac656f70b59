//! vidlog server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, resumes any log entries left in `processing`, and serves the JSON
//! API under `/api`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vidlog_api::{ApiState, IngestQueue};
use vidlog_core::oracle::Extractor;
use vidlog_server::{
  config::{ServerConfig, expand_tilde},
  oracle::HttpOracle,
};
use vidlog_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "vidlog analytics server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {}", store_path.display()))?;
  let store = Arc::new(store);

  let oracle = HttpOracle::new(&cfg.oracle).context("failed to build oracle client")?;
  let extractor = Arc::new(Extractor::new(oracle));
  let settings = Arc::new(cfg.pipeline.clone());

  let (queue, worker) = IngestQueue::spawn(store.clone(), extractor.clone(), settings.clone());
  queue
    .resume_pending(&*store)
    .await
    .context("failed to resume pending log entries")?;

  let state = ApiState {
    store,
    extractor,
    settings,
    queue,
    default_actor: Arc::from(cfg.default_actor.as_str()),
  };
  let app = vidlog_server::app(state);

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!(oracle = %cfg.oracle.endpoint, model = %cfg.oracle.model, "listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // The router held the last queue handles; let in-flight work finish.
  worker.await.ok();
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    tracing::info!("shutting down");
  }
}
