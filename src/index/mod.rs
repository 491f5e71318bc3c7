//! Persistent vector index backed by SQLite
//!
//! This module handles all index storage including:
//! - Index metadata (embedding model identity and chunking parameters)
//! - Documents (full text and provenance, kept for reindexing)
//! - Entries (chunks with their embedding vectors)
//! - Ingestion runs (history and stats)
//!
//! Every document replacement is a single transaction, so readers observe
//! either the old or the new set of entries for a document, never a mix.

mod schema;

pub use schema::*;

use crate::chunk::{ChunkParams, TextChunk};
use crate::embed::cosine_similarity;
use crate::error::{Error, Result};
use crate::ingest::IngestReport;
use crate::load::{Document, DocumentFormat};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::FromRow;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Identity of an index: which model produced its vectors and how text was chunked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub model: String,
    pub dimension: usize,
    pub chunk_chars: usize,
    pub overlap_chars: usize,
    pub schema_version: i64,
}

impl IndexMetadata {
    pub fn new(model: &str, dimension: usize, params: &ChunkParams) -> Self {
        Self {
            model: model.to_string(),
            dimension,
            chunk_chars: params.chunk_chars(),
            overlap_chars: params.overlap_chars(),
            schema_version: SCHEMA_VERSION,
        }
    }

    fn model_identity(&self) -> String {
        format!("{} ({}d)", self.model, self.dimension)
    }

    fn chunking(&self) -> String {
        format!(
            "chunk_chars={}, overlap_chars={}",
            self.chunk_chars, self.overlap_chars
        )
    }

    /// Check that vectors produced under `configured` can be mixed with this index
    pub fn check_model(&self, configured: &IndexMetadata) -> Result<()> {
        if self.model != configured.model || self.dimension != configured.dimension {
            return Err(Error::ModelMismatch {
                stored: self.model_identity(),
                configured: configured.model_identity(),
            });
        }
        Ok(())
    }

    /// Check model identity and chunking parameters
    pub fn check_against(&self, configured: &IndexMetadata) -> Result<()> {
        self.check_model(configured)?;
        if self.chunk_chars != configured.chunk_chars
            || self.overlap_chars != configured.overlap_chars
        {
            return Err(Error::ChunkingMismatch {
                stored: self.chunking(),
                configured: configured.chunking(),
            });
        }
        Ok(())
    }
}

/// A stored document row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub path: String,
    pub format: String,
    pub label: String,
    pub title: Option<String>,
    pub content_hash: String,
    pub byte_size: i64,
    pub source_timestamp: String,
    pub body: String,
    pub indexed_at: String,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid stored timestamp '{}': {}", value, e)))
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

impl DocumentRecord {
    /// Rebuild the loaded document from stored text
    pub fn into_document(self) -> Result<Document> {
        Ok(Document {
            timestamp: parse_timestamp(&self.source_timestamp)?,
            format: DocumentFormat::from_str(&self.format)?,
            id: self.id,
            path: self.path.into(),
            text: self.body,
            label: self.label,
            title: self.title,
            content_hash: self.content_hash,
            byte_size: self.byte_size.max(0) as u64,
        })
    }
}

/// Hash and timestamp of a stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// Listing row for ingested files
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub path: String,
    pub format: String,
    pub label: String,
    pub title: Option<String>,
    pub byte_size: i64,
    pub chunk_count: i64,
    pub indexed_at: String,
}

/// A stored entry without its vector
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredEntry {
    pub seq: i64,
    pub chunk_index: i64,
    pub char_start: i64,
    pub char_end: i64,
    pub chunk_text: String,
}

/// A chunk with its embedding, ready to be written
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
}

/// Result of replacing a document's entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced { inserted: usize, deleted: usize },
    /// The stored copy has a newer timestamp; nothing was written
    Stale,
}

/// A search match with provenance
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SearchHit {
    pub seq: i64,
    #[sqlx(skip)]
    pub score: f32,
    pub doc_id: String,
    pub path: String,
    pub title: Option<String>,
    pub format: String,
    pub label: String,
    pub chunk_index: i64,
    pub char_start: i64,
    pub char_end: i64,
    pub chunk_text: String,
}

/// Search hits plus the number of entries compared
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub entries_searched: usize,
}

/// Ingestion run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An ingestion run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: String,
    pub operation: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub docs_processed: i64,
    pub docs_unchanged: i64,
    pub docs_skipped: i64,
    pub docs_removed: i64,
    pub chunks_indexed: i64,
    pub chunks_deleted: i64,
    pub errors_json: Option<String>,
}

/// Encode a vector as little-endian f32 bytes
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian f32 bytes
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Other(format!(
            "Corrupt embedding blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Heap entry ordered so that the worst candidate is the maximum
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    seq: i64,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Index database handle
#[derive(Clone)]
pub struct VectorIndex {
    pool: SqlitePool,
    // SQLite has a single writer
    write_lock: Arc<Mutex<()>>,
}

impl VectorIndex {
    /// Open (creating if needed) the index at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Open a private in-memory index
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Each in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let index = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        if !index.is_initialized().await? {
            index.init_schema().await?;
        }
        Ok(index)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing index schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='entries'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Metadata =====

    /// Read the stored index identity, if any
    pub async fn metadata(&self) -> Result<Option<IndexMetadata>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM index_meta")
            .fetch_all(&self.pool)
            .await?;
        let values: HashMap<String, String> = rows.into_iter().collect();

        let Some(model) = values.get("model") else {
            return Ok(None);
        };

        let number = |key: &str| -> Result<i64> {
            values
                .get(key)
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| Error::Other(format!("Index metadata is missing '{}'", key)))
        };

        Ok(Some(IndexMetadata {
            model: model.clone(),
            dimension: number("dimension")? as usize,
            chunk_chars: number("chunk_chars")? as usize,
            overlap_chars: number("overlap_chars")? as usize,
            schema_version: number("schema_version")?,
        }))
    }

    /// Overwrite the stored index identity
    pub async fn write_metadata(&self, meta: &IndexMetadata) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let pairs = [
            ("model", meta.model.clone()),
            ("dimension", meta.dimension.to_string()),
            ("chunk_chars", meta.chunk_chars.to_string()),
            ("overlap_chars", meta.overlap_chars.to_string()),
            ("schema_version", meta.schema_version.to_string()),
        ];
        for (key, value) in pairs {
            sqlx::query("INSERT OR REPLACE INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Verify the index was built with `configured`, recording it on first use
    pub async fn ensure_compatible(&self, configured: &IndexMetadata) -> Result<()> {
        match self.metadata().await? {
            Some(stored) => stored.check_against(configured),
            None => {
                info!(
                    "Recording index identity: model '{}' ({}d)",
                    configured.model, configured.dimension
                );
                self.write_metadata(configured).await
            }
        }
    }

    // ===== Documents =====

    /// Hash and timestamp of a stored document
    pub async fn document_state(&self, id: &str) -> Result<Option<DocumentState>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT content_hash, source_timestamp FROM documents WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(content_hash, ts)| -> Result<DocumentState> {
            Ok(DocumentState {
                content_hash,
                timestamp: parse_timestamp(&ts)?,
            })
        })
        .transpose()
    }

    /// Get document by path
    pub async fn document_by_path(&self, path: &str) -> Result<Option<DocumentRecord>> {
        let doc = sqlx::query_as::<_, DocumentRecord>("SELECT * FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// All stored documents, including their text
    pub async fn all_documents(&self) -> Result<Vec<DocumentRecord>> {
        let docs = sqlx::query_as::<_, DocumentRecord>("SELECT * FROM documents ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(docs)
    }

    /// Ids and paths of stored documents located under `root`
    pub async fn documents_under(&self, root: &Path) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, path FROM documents")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter(|(_, path)| Path::new(path).starts_with(root))
            .collect())
    }

    /// List ingested files with their chunk counts
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let docs = sqlx::query_as::<_, DocumentSummary>(
            r#"
            SELECT d.id, d.path, d.format, d.label, d.title, d.byte_size, d.indexed_at,
                   COUNT(e.seq) AS chunk_count
            FROM documents d
            LEFT JOIN entries e ON e.doc_id = d.id
            GROUP BY d.id
            ORDER BY d.path
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    /// Entries of one document in chunk order
    pub async fn entries_for_document(&self, doc_id: &str) -> Result<Vec<StoredEntry>> {
        let entries = sqlx::query_as::<_, StoredEntry>(
            r#"
            SELECT seq, chunk_index, char_start, char_end, chunk_text
            FROM entries WHERE doc_id = ? ORDER BY chunk_index
            "#,
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Atomically replace every entry of `doc`
    ///
    /// Returns `Stale` without writing when the stored copy has a newer
    /// source timestamp.
    pub async fn replace_document(
        &self,
        doc: &Document,
        entries: &[NewEntry],
    ) -> Result<ReplaceOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT source_timestamp FROM documents WHERE id = ?")
                .bind(&doc.id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(stored) = stored {
            if parse_timestamp(&stored)? > doc.timestamp {
                tx.rollback().await?;
                return Ok(ReplaceOutcome::Stale);
            }
        }

        let deleted = sqlx::query("DELETE FROM entries WHERE doc_id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, path, format, label, title, content_hash,
                byte_size, source_timestamp, body, indexed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                format = excluded.format,
                label = excluded.label,
                title = excluded.title,
                content_hash = excluded.content_hash,
                byte_size = excluded.byte_size,
                source_timestamp = excluded.source_timestamp,
                body = excluded.body,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&doc.id)
        .bind(doc.path.to_string_lossy().as_ref())
        .bind(doc.format.to_string())
        .bind(&doc.label)
        .bind(&doc.title)
        .bind(&doc.content_hash)
        .bind(doc.byte_size as i64)
        .bind(format_timestamp(&doc.timestamp))
        .bind(&doc.text)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO entries (
                    doc_id, chunk_index, char_start, char_end, chunk_text, chunk_hash, embedding
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&doc.id)
            .bind(entry.chunk.index as i64)
            .bind(entry.chunk.char_start as i64)
            .bind(entry.chunk.char_end as i64)
            .bind(&entry.chunk.text)
            .bind(&entry.chunk.hash)
            .bind(encode_embedding(&entry.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(ReplaceOutcome::Replaced {
            inserted: entries.len(),
            deleted,
        })
    }

    /// Delete a document and its entries, returning the number of entries removed
    pub async fn remove_document(&self, id: &str) -> Result<Option<usize>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM entries WHERE doc_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;

        let removed = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok((removed > 0).then_some(deleted))
    }

    // ===== Search =====

    /// Exhaustive top-k cosine search
    ///
    /// Entries are streamed from one read transaction and ranked in a bounded
    /// heap; ties are broken by insertion order (earlier first).
    pub async fn search(&self, query: &[f32], k: usize) -> Result<SearchOutcome> {
        self.scan_top_k(query, k, false).await
    }

    /// Like [`search`](Self::search), but keeps only the best entry of each
    /// document, so up to `k` distinct documents are returned
    pub async fn search_distinct(&self, query: &[f32], k: usize) -> Result<SearchOutcome> {
        self.scan_top_k(query, k, true).await
    }

    async fn scan_top_k(&self, query: &[f32], k: usize, distinct: bool) -> Result<SearchOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        let mut best_per_doc: HashMap<String, Candidate> = HashMap::new();
        let mut entries_searched = 0usize;

        {
            let mut rows = sqlx::query_as::<_, (i64, String, Vec<u8>)>(
                "SELECT seq, doc_id, embedding FROM entries",
            )
            .fetch(&mut *tx);

            while let Some((seq, doc_id, blob)) = rows.try_next().await? {
                entries_searched += 1;
                if k == 0 {
                    continue;
                }

                let vector = decode_embedding(&blob)?;
                if vector.len() != query.len() {
                    return Err(Error::EmbeddingDimension {
                        model: "stored index".to_string(),
                        expected: query.len(),
                        actual: vector.len(),
                    });
                }

                let candidate = Candidate {
                    score: cosine_similarity(query, &vector),
                    seq,
                };
                if distinct {
                    // Smaller is better under Candidate's ordering
                    best_per_doc
                        .entry(doc_id)
                        .and_modify(|best| {
                            if candidate < *best {
                                *best = candidate;
                            }
                        })
                        .or_insert(candidate);
                    continue;
                }

                heap.push(candidate);
                if heap.len() > k {
                    heap.pop();
                }
            }
        }

        for candidate in best_per_doc.into_values() {
            heap.push(candidate);
            if heap.len() > k {
                heap.pop();
            }
        }

        let winners = heap.into_sorted_vec();
        if winners.is_empty() {
            tx.commit().await?;
            return Ok(SearchOutcome {
                hits: Vec::new(),
                entries_searched,
            });
        }

        let placeholders = vec!["?"; winners.len()].join(",");
        let sql = format!(
            r#"
            SELECT e.seq, e.doc_id, d.path, d.title, d.format, d.label,
                   e.chunk_index, e.char_start, e.char_end, e.chunk_text
            FROM entries e
            JOIN documents d ON d.id = e.doc_id
            WHERE e.seq IN ({})
            "#,
            placeholders
        );
        let mut query_builder = sqlx::query_as::<_, SearchHit>(&sql);
        for candidate in &winners {
            query_builder = query_builder.bind(candidate.seq);
        }
        let rows = query_builder.fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let mut by_seq: HashMap<i64, SearchHit> = rows.into_iter().map(|h| (h.seq, h)).collect();
        let hits = winners
            .into_iter()
            .filter_map(|c| {
                by_seq.remove(&c.seq).map(|mut hit| {
                    hit.score = c.score;
                    hit
                })
            })
            .collect();

        Ok(SearchOutcome {
            hits,
            entries_searched,
        })
    }

    // ===== Ingestion Run Operations =====

    /// Start a new ingestion run
    pub async fn start_run(&self, operation: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO ingestion_runs (id, operation, started_at, status) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(operation)
        .bind(Utc::now().to_rfc3339())
        .bind(RunStatus::Running.to_string())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Complete an ingestion run
    pub async fn complete_run(&self, id: &str, report: &IngestReport) -> Result<()> {
        let status = if report.cancelled {
            RunStatus::Cancelled
        } else if report.errors.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        let errors_json = if report.errors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&report.errors)?)
        };

        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            UPDATE ingestion_runs SET
                completed_at = ?,
                status = ?,
                docs_processed = ?,
                docs_unchanged = ?,
                docs_skipped = ?,
                docs_removed = ?,
                chunks_indexed = ?,
                chunks_deleted = ?,
                errors_json = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(report.documents_processed as i64)
        .bind(report.documents_unchanged as i64)
        .bind(report.documents_skipped as i64)
        .bind(report.documents_removed as i64)
        .bind(report.chunks_indexed as i64)
        .bind(report.chunks_deleted as i64)
        .bind(errors_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent ingestion run
    pub async fn latest_run(&self) -> Result<Option<IngestionRun>> {
        let run = sqlx::query_as::<_, IngestionRun>(
            "SELECT * FROM ingestion_runs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    // ===== Statistics =====

    pub async fn entry_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    pub async fn document_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_text, compute_text_hash};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn doc(path: &str, text: &str, secs: i64) -> Document {
        let path = PathBuf::from(path);
        Document {
            id: Document::id_for_path(&path),
            path,
            text: text.to_string(),
            format: DocumentFormat::Text,
            label: "Text File".to_string(),
            title: None,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            content_hash: compute_text_hash(text),
            byte_size: text.len() as u64,
        }
    }

    fn entries(doc: &Document, vectors: &[Vec<f32>]) -> Vec<NewEntry> {
        let params = ChunkParams::new(1000, 0).unwrap();
        let chunk = chunk_text(&doc.text, &params).remove(0);
        vectors
            .iter()
            .enumerate()
            .map(|(i, v)| NewEntry {
                chunk: TextChunk {
                    index: i,
                    ..chunk.clone()
                },
                embedding: v.clone(),
            })
            .collect()
    }

    #[test]
    fn test_embedding_codec() {
        let v = vec![0.25, -1.5, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)).unwrap(), v);
        assert!(decode_embedding(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_metadata_checks() {
        let params = ChunkParams::new(1000, 200).unwrap();
        let stored = IndexMetadata::new("model-a", 384, &params);

        assert!(stored.check_against(&stored.clone()).is_ok());
        assert!(matches!(
            stored.check_against(&IndexMetadata::new("model-b", 384, &params)),
            Err(Error::ModelMismatch { .. })
        ));
        assert!(matches!(
            stored.check_against(&IndexMetadata::new("model-a", 768, &params)),
            Err(Error::ModelMismatch { .. })
        ));
        let other = ChunkParams::new(500, 50).unwrap();
        assert!(matches!(
            stored.check_against(&IndexMetadata::new("model-a", 384, &other)),
            Err(Error::ChunkingMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_metadata_round_trip_on_disk() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("index.db");
        let params = ChunkParams::new(800, 100).unwrap();
        let meta = IndexMetadata::new("model-a", 8, &params);

        {
            let index = VectorIndex::open(&db_path).await.unwrap();
            assert!(index.metadata().await.unwrap().is_none());
            index.ensure_compatible(&meta).await.unwrap();
        }

        let reopened = VectorIndex::open(&db_path).await.unwrap();
        assert_eq!(reopened.metadata().await.unwrap(), Some(meta.clone()));
        assert!(matches!(
            reopened
                .ensure_compatible(&IndexMetadata::new("model-b", 8, &params))
                .await,
            Err(Error::ModelMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_replace_is_all_or_nothing_per_document() {
        let index = VectorIndex::open_in_memory().await.unwrap();
        let d = doc("/kb/a.txt", "first version of the text", 10);

        let outcome = index
            .replace_document(&d, &entries(&d, &[vec![1.0, 0.0], vec![0.0, 1.0]]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplaceOutcome::Replaced {
                inserted: 2,
                deleted: 0
            }
        );

        let newer = doc("/kb/a.txt", "second version", 20);
        let outcome = index
            .replace_document(&newer, &entries(&newer, &[vec![1.0, 1.0]]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplaceOutcome::Replaced {
                inserted: 1,
                deleted: 2
            }
        );
        assert_eq!(index.entry_count().await.unwrap(), 1);
        assert_eq!(index.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_older_timestamp_is_stale() {
        let index = VectorIndex::open_in_memory().await.unwrap();
        let newer = doc("/kb/a.txt", "newer text", 20);
        index
            .replace_document(&newer, &entries(&newer, &[vec![1.0, 0.0]]))
            .await
            .unwrap();

        let older = doc("/kb/a.txt", "older text", 10);
        let outcome = index
            .replace_document(&older, &entries(&older, &[vec![0.0, 1.0]]))
            .await
            .unwrap();

        assert_eq!(outcome, ReplaceOutcome::Stale);
        let state = index.document_state(&newer.id).await.unwrap().unwrap();
        assert_eq!(state.content_hash, newer.content_hash);
    }

    #[tokio::test]
    async fn test_search_orders_by_score_then_seq() {
        let index = VectorIndex::open_in_memory().await.unwrap();
        let a = doc("/kb/a.txt", "alpha", 1);
        let b = doc("/kb/b.txt", "bravo", 1);

        index
            .replace_document(&a, &entries(&a, &[vec![1.0, 0.0], vec![0.0, 1.0]]))
            .await
            .unwrap();
        index
            .replace_document(&b, &entries(&b, &[vec![2.0, 0.0], vec![1.0, 1.0]]))
            .await
            .unwrap();

        let outcome = index.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(outcome.entries_searched, 4);
        assert_eq!(outcome.hits.len(), 3);

        // Two exact matches tie at 1.0; the earlier insert wins
        assert_eq!(outcome.hits[0].path, "/kb/a.txt");
        assert_eq!(outcome.hits[1].path, "/kb/b.txt");
        assert!(outcome.hits[0].seq < outcome.hits[1].seq);
        assert!((outcome.hits[2].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_search_distinct_keeps_best_entry_per_document() {
        let index = VectorIndex::open_in_memory().await.unwrap();
        let big = doc("/kb/big.txt", "many matching chunks", 1);
        let small = doc("/kb/small.txt", "one weaker chunk", 1);

        let big_vectors: Vec<Vec<f32>> = (0..10).map(|i| vec![1.0, i as f32 * 0.01]).collect();
        index
            .replace_document(&big, &entries(&big, &big_vectors))
            .await
            .unwrap();
        index
            .replace_document(&small, &entries(&small, &[vec![1.0, 1.0]]))
            .await
            .unwrap();

        // Plain top-2 is filled by the big document alone
        let plain = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert!(plain.hits.iter().all(|h| h.path == "/kb/big.txt"));

        let distinct = index.search_distinct(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(distinct.entries_searched, 11);
        assert_eq!(distinct.hits.len(), 2);
        assert_eq!(distinct.hits[0].path, "/kb/big.txt");
        assert_eq!(distinct.hits[0].chunk_index, 0);
        assert!((distinct.hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(distinct.hits[1].path, "/kb/small.txt");
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let index = VectorIndex::open_in_memory().await.unwrap();
        let outcome = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.entries_searched, 0);
    }

    #[tokio::test]
    async fn test_remove_document() {
        let index = VectorIndex::open_in_memory().await.unwrap();
        let d = doc("/kb/a.txt", "some text", 1);
        index
            .replace_document(&d, &entries(&d, &[vec![1.0], vec![0.5]]))
            .await
            .unwrap();

        assert_eq!(index.remove_document(&d.id).await.unwrap(), Some(2));
        assert_eq!(index.remove_document(&d.id).await.unwrap(), None);
        assert_eq!(index.entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_documents_under_and_listing() {
        let index = VectorIndex::open_in_memory().await.unwrap();
        for path in ["/kb/docs/a.txt", "/kb/docs/sub/b.txt", "/kb/other/c.txt"] {
            let d = doc(path, "text body", 1);
            index
                .replace_document(&d, &entries(&d, &[vec![1.0]]))
                .await
                .unwrap();
        }

        let under = index.documents_under(Path::new("/kb/docs")).await.unwrap();
        assert_eq!(under.len(), 2);

        let listed = index.list_documents().await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|d| d.chunk_count == 1));
    }
}
