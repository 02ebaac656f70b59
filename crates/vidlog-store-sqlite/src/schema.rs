//! SQL schema for the vidlog SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS videos (
    video_id         TEXT PRIMARY KEY,
    external_id      TEXT UNIQUE,
    title            TEXT NOT NULL,
    published_on     TEXT,              -- YYYY-MM-DD
    duration_seconds INTEGER,
    origin           TEXT NOT NULL,     -- 'manual' | 'sync' | 'import'
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

-- At most one row per video, created lazily by upsert.
CREATE TABLE IF NOT EXISTS manual_fields (
    video_id         TEXT PRIMARY KEY REFERENCES videos(video_id) ON DELETE CASCADE,
    hook             TEXT,
    caption          TEXT,
    hashtags         TEXT,              -- JSON array of strings
    topic            TEXT,
    format           TEXT,
    call_to_action   TEXT,
    target_audience  TEXT,
    rationale        TEXT,
    notes            TEXT,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS platform_metrics (
    metrics_id         TEXT PRIMARY KEY,
    video_id           TEXT NOT NULL REFERENCES videos(video_id) ON DELETE CASCADE,
    platform           TEXT NOT NULL,
    views              INTEGER,
    likes              INTEGER,
    comments           INTEGER,
    shares             INTEGER,
    saves              INTEGER,
    watch_time_seconds INTEGER,
    followers_gained   INTEGER,
    source             TEXT NOT NULL,   -- provenance of the latest write
    log_id             TEXT,
    updated_at         TEXT NOT NULL,
    UNIQUE (video_id, platform)
);

CREATE TABLE IF NOT EXISTS log_entries (
    log_id      TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,          -- 'text' | 'voice'
    raw_text    TEXT,
    audio_ref   TEXT,
    status      TEXT NOT NULL,
    video_id    TEXT REFERENCES videos(video_id) ON DELETE SET NULL,
    error       TEXT,
    actor_id    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transcripts (
    transcript_id TEXT PRIMARY KEY,
    log_id        TEXT NOT NULL REFERENCES log_entries(log_id),
    raw_text      TEXT NOT NULL,
    extracted     TEXT NOT NULL,        -- JSON
    confidence    TEXT NOT NULL,        -- JSON
    created_at    TEXT NOT NULL
);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
-- Entities are referenced polymorphically, never by foreign key.
CREATE TABLE IF NOT EXISTS audit_log (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id     TEXT NOT NULL UNIQUE,
    entity_type  TEXT NOT NULL,
    entity_id    TEXT NOT NULL,
    field        TEXT NOT NULL,
    old_value    TEXT,                  -- JSON or NULL
    new_value    TEXT NOT NULL,         -- JSON
    source       TEXT NOT NULL,
    actor_id     TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS import_batches (
    batch_id       TEXT PRIMARY KEY,
    version        INTEGER NOT NULL UNIQUE,
    file_name      TEXT,
    content_sha256 TEXT NOT NULL,
    row_count      INTEGER NOT NULL,
    column_count   INTEGER NOT NULL,
    actor_id       TEXT NOT NULL,
    uploaded_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS import_rows (
    row_id     TEXT PRIMARY KEY,
    batch_id   TEXT NOT NULL REFERENCES import_batches(batch_id),
    row_index  INTEGER NOT NULL,
    video_id   TEXT REFERENCES videos(video_id) ON DELETE SET NULL,
    raw        TEXT NOT NULL,           -- JSON object keyed by header
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS log_entries_status_idx ON log_entries(status);
CREATE INDEX IF NOT EXISTS transcripts_log_idx    ON transcripts(log_id);
CREATE INDEX IF NOT EXISTS audit_entity_idx       ON audit_log(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS import_rows_batch_idx  ON import_rows(batch_id);

PRAGMA user_version = 1;
";
