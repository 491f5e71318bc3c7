//! SQLite schema definition

/// Current on-disk schema version
pub const SCHEMA_VERSION: i64 = 1;

/// SQL schema for the index database
pub const SCHEMA_SQL: &str = r#"
-- Index identity: embedding model, dimension and chunking parameters
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Documents: one row per source file
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    format TEXT NOT NULL,
    label TEXT NOT NULL,
    title TEXT,
    content_hash TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    source_timestamp TEXT NOT NULL,
    body TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);

-- Entries: chunks with their embeddings (little-endian f32 blobs)
CREATE TABLE IF NOT EXISTS entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    char_start INTEGER NOT NULL,
    char_end INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    chunk_hash TEXT NOT NULL,
    embedding BLOB NOT NULL,
    UNIQUE(doc_id, chunk_index)
);

-- Ingestion runs: tracking history
CREATE TABLE IF NOT EXISTS ingestion_runs (
    id TEXT PRIMARY KEY,
    operation TEXT NOT NULL DEFAULT 'ingest',
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    docs_processed INTEGER DEFAULT 0,
    docs_unchanged INTEGER DEFAULT 0,
    docs_skipped INTEGER DEFAULT 0,
    docs_removed INTEGER DEFAULT 0,
    chunks_indexed INTEGER DEFAULT 0,
    chunks_deleted INTEGER DEFAULT 0,
    errors_json TEXT
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);
CREATE INDEX IF NOT EXISTS idx_entries_doc ON entries(doc_id);
CREATE INDEX IF NOT EXISTS idx_runs_started ON ingestion_runs(started_at);
"#;
