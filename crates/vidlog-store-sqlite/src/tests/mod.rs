//! Integration tests for `SqliteStore` against an in-memory database, and
//! for the core engine running on top of it.

use vidlog_core::{
  store::TrackerStore,
  video::{NewVideo, Video, VideoOrigin},
};

use crate::SqliteStore;

mod faults;
mod ingest;
mod reconcile;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn video(s: &SqliteStore, title: &str) -> Video {
  s.create_video(NewVideo::new(title, VideoOrigin::Manual))
    .await
    .unwrap()
}
