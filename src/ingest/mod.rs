//! Document indexing pipeline
//!
//! The loader runs on a blocking thread and feeds documents through a
//! bounded channel. Documents are chunked, embedded and written to the
//! index concurrently, bounded by `ingest.concurrency`.

use crate::chunk::{chunk_text, ChunkParams};
use crate::config::Config;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::index::{IndexMetadata, NewEntry, ReplaceOutcome, VectorIndex};
use crate::load::{Document, DocumentLoader};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared between the CLI and a running batch
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of indexing one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed {
        chunks_indexed: usize,
        chunks_deleted: usize,
    },
    /// Same content hash as the stored copy
    Unchanged,
    /// The stored copy is newer
    Stale,
}

/// A per-document failure recorded in a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    pub path: String,
    pub kind: String,
    pub message: String,
}

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents_processed: usize,
    pub documents_unchanged: usize,
    pub documents_stale: usize,
    pub documents_skipped: usize,
    pub documents_removed: usize,
    pub chunks_indexed: usize,
    pub chunks_deleted: usize,
    pub errors: Vec<IngestError>,
    pub cancelled: bool,
}

impl IngestReport {
    fn record(&mut self, outcome: IndexOutcome) {
        match outcome {
            IndexOutcome::Indexed {
                chunks_indexed,
                chunks_deleted,
            } => {
                self.documents_processed += 1;
                self.chunks_indexed += chunks_indexed;
                self.chunks_deleted += chunks_deleted;
            }
            IndexOutcome::Unchanged => self.documents_unchanged += 1,
            IndexOutcome::Stale => self.documents_stale += 1,
        }
    }

    fn record_error(&mut self, path: &Path, error: &Error) {
        warn!("{}: {}", path.display(), error);
        if matches!(error, Error::UnsupportedFormat { .. }) {
            self.documents_skipped += 1;
        }
        self.errors.push(IngestError {
            path: path.display().to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Errors that invalidate the whole batch rather than one document
fn aborts_batch(error: &Error) -> bool {
    matches!(
        error,
        Error::Database(_) | Error::ModelMismatch { .. } | Error::ChunkingMismatch { .. }
    )
}

fn error_path(error: &Error) -> Option<&Path> {
    match error {
        Error::LoaderIo { path, .. } | Error::UnsupportedFormat { path, .. } => Some(path),
        _ => None,
    }
}

/// Messages from the loader thread
enum ScanEvent {
    Document(Document),
    Failed {
        path: PathBuf,
        error: Error,
    },
    Finished {
        root: PathBuf,
        skipped: usize,
        complete: bool,
        seen: HashSet<PathBuf>,
    },
}

/// Result of handling one event
enum Processed {
    Document {
        path: PathBuf,
        result: Result<IndexOutcome>,
    },
    Failed {
        path: PathBuf,
        error: Error,
    },
    Finished {
        root: PathBuf,
        skipped: usize,
        complete: bool,
        seen: HashSet<PathBuf>,
    },
}

fn produce(
    loader: DocumentLoader,
    targets: Vec<PathBuf>,
    tx: mpsc::Sender<ScanEvent>,
    cancel: CancelToken,
) {
    for target in targets {
        if cancel.is_cancelled() {
            return;
        }

        if !target.is_dir() {
            let event = match loader.load_file(&target) {
                Ok(doc) => ScanEvent::Document(doc),
                Err(error) => ScanEvent::Failed {
                    path: target,
                    error,
                },
            };
            if tx.blocking_send(event).is_err() {
                return;
            }
            continue;
        }

        let mut scan = match loader.scan(&target) {
            Ok(scan) => scan,
            Err(error) => {
                if tx
                    .blocking_send(ScanEvent::Failed {
                        path: target,
                        error,
                    })
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };
        info!("Scanning {}", scan.root().display());

        for item in scan.by_ref() {
            if cancel.is_cancelled() {
                return;
            }
            let event = match item {
                Ok(doc) => ScanEvent::Document(doc),
                Err(error) => ScanEvent::Failed {
                    path: error_path(&error)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| target.clone()),
                    error,
                },
            };
            if tx.blocking_send(event).is_err() {
                return;
            }
        }

        let root = scan.root().to_path_buf();
        let skipped = scan.skipped();
        let complete = scan.is_complete();
        let finished = ScanEvent::Finished {
            root,
            skipped,
            complete,
            seen: scan.into_seen_paths(),
        };
        if tx.blocking_send(finished).is_err() {
            return;
        }
    }
}

/// Chunks, embeds and writes documents into a [`VectorIndex`]
pub struct Indexer {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    params: ChunkParams,
    batch_size: usize,
    concurrency: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Indexer {
    pub fn new(index: VectorIndex, embedder: Arc<dyn Embedder>, params: ChunkParams) -> Self {
        Self {
            index,
            embedder,
            params,
            batch_size: 32,
            concurrency: 4,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build an indexer using the batch and concurrency settings of `config`
    pub fn from_config(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self::new(index, embedder, config.chunk.params()?)
            .with_batch_size(config.embedding.batch_size)
            .with_concurrency(config.ingest.concurrency))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Identity this indexer writes into the index metadata
    pub fn metadata(&self) -> IndexMetadata {
        IndexMetadata::new(
            self.embedder.model_name(),
            self.embedder.dimension(),
            &self.params,
        )
    }

    async fn document_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_document_lock(&self, id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map plus ours
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(id);
        }
    }

    /// Chunk, embed and store one document
    ///
    /// Returns `Unchanged` when the stored content hash matches and `Stale`
    /// when the stored copy has a newer timestamp. Nothing is written if
    /// `cancel` fires before the transaction starts.
    pub async fn index_document(
        &self,
        doc: &Document,
        cancel: &CancelToken,
    ) -> Result<IndexOutcome> {
        let lock = self.document_lock(&doc.id).await;
        let result = {
            let _guard = lock.lock().await;
            self.index_locked(doc, cancel, true).await
        };
        self.release_document_lock(&doc.id, lock).await;
        result
    }

    async fn index_locked(
        &self,
        doc: &Document,
        cancel: &CancelToken,
        skip_unchanged: bool,
    ) -> Result<IndexOutcome> {
        if let Some(stored) = self.index.document_state(&doc.id).await? {
            if stored.timestamp > doc.timestamp {
                debug!("Stored copy of {} is newer, skipping", doc.path.display());
                return Ok(IndexOutcome::Stale);
            }
            if skip_unchanged && stored.content_hash == doc.content_hash {
                debug!("File unchanged: {}", doc.path.display());
                return Ok(IndexOutcome::Unchanged);
            }
        }

        let chunks = chunk_text(&doc.text, &self.params);
        debug!(
            "Embedding {} chunks for {}",
            chunks.len(),
            doc.path.display()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_in_batches(self.embedder.as_ref(), texts, self.batch_size).await?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let entries: Vec<NewEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewEntry { chunk, embedding })
            .collect();

        match self.index.replace_document(doc, &entries).await? {
            ReplaceOutcome::Replaced { inserted, deleted } => Ok(IndexOutcome::Indexed {
                chunks_indexed: inserted,
                chunks_deleted: deleted,
            }),
            ReplaceOutcome::Stale => Ok(IndexOutcome::Stale),
        }
    }

    /// Ingest files and directory trees
    ///
    /// Directories are scanned recursively (unless configured otherwise);
    /// documents whose files disappeared from a fully scanned directory are
    /// removed from the index.
    pub async fn ingest(
        &self,
        loader: &DocumentLoader,
        targets: &[PathBuf],
        cancel: &CancelToken,
        progress: Option<&ProgressBar>,
    ) -> Result<IngestReport> {
        let run_id = self.index.start_run("ingest").await?;
        let mut report = IngestReport::default();

        let result = self
            .run_ingest(loader, targets, cancel, progress, &mut report)
            .await;

        report.cancelled = cancel.is_cancelled();
        if let Err(error) = &result {
            report.errors.push(IngestError {
                path: String::new(),
                kind: error.kind().to_string(),
                message: error.to_string(),
            });
        }
        self.index.complete_run(&run_id, &report).await?;
        result?;

        info!(
            "Ingestion complete: {} docs indexed, {} unchanged, {} chunks indexed, {} removed",
            report.documents_processed,
            report.documents_unchanged,
            report.chunks_indexed,
            report.documents_removed
        );

        Ok(report)
    }

    async fn run_ingest(
        &self,
        loader: &DocumentLoader,
        targets: &[PathBuf],
        cancel: &CancelToken,
        progress: Option<&ProgressBar>,
        report: &mut IngestReport,
    ) -> Result<()> {
        let (tx, rx) = mpsc::channel(self.concurrency * 2);
        let producer = {
            let loader = loader.clone();
            let targets = targets.to_vec();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || produce(loader, targets, tx, cancel))
        };

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        let indexer = self;
        let processed = events
            .map(move |event| async move {
                match event {
                    ScanEvent::Document(doc) => {
                        let result = if cancel.is_cancelled() {
                            Err(Error::Cancelled)
                        } else {
                            indexer.index_document(&doc, cancel).await
                        };
                        Processed::Document {
                            path: doc.path,
                            result,
                        }
                    }
                    ScanEvent::Failed { path, error } => Processed::Failed { path, error },
                    ScanEvent::Finished {
                        root,
                        skipped,
                        complete,
                        seen,
                    } => Processed::Finished {
                        root,
                        skipped,
                        complete,
                        seen,
                    },
                }
            })
            .buffer_unordered(self.concurrency);
        let mut processed = Box::pin(processed);

        let mut finished_roots = Vec::new();

        while let Some(item) = processed.next().await {
            match item {
                Processed::Document { path, result } => {
                    if let Some(pb) = progress {
                        pb.inc(1);
                        pb.set_message(path.display().to_string());
                    }
                    match result {
                        Ok(outcome) => report.record(outcome),
                        Err(Error::Cancelled) => {}
                        Err(error) if aborts_batch(&error) => return Err(error),
                        Err(error) => report.record_error(&path, &error),
                    }
                }
                Processed::Failed { path, error } => report.record_error(&path, &error),
                Processed::Finished {
                    root,
                    skipped,
                    complete,
                    seen,
                } => {
                    report.documents_skipped += skipped;
                    if complete {
                        finished_roots.push((root, seen));
                    } else {
                        warn!(
                            "Scan of {} did not complete; keeping its stored documents",
                            root.display()
                        );
                    }
                }
            }
        }
        drop(processed);

        producer
            .await
            .map_err(|e| Error::Other(format!("Loader task failed: {}", e)))?;

        if cancel.is_cancelled() {
            info!("Ingestion cancelled");
            return Ok(());
        }

        for (root, seen) in finished_roots {
            self.prune_missing(&root, &seen, loader.options().recursive, report)
                .await?;
        }

        Ok(())
    }

    /// Remove stored documents under `root` that the last scan did not see
    async fn prune_missing(
        &self,
        root: &Path,
        seen: &HashSet<PathBuf>,
        recursive: bool,
        report: &mut IngestReport,
    ) -> Result<()> {
        for (id, path) in self.index.documents_under(root).await? {
            let path = PathBuf::from(path);
            if !recursive && path.parent() != Some(root) {
                continue;
            }
            if seen.contains(&path) {
                continue;
            }
            if let Some(deleted) = self.remove_by_id(&id).await? {
                debug!("Removed missing document {}", path.display());
                report.documents_removed += 1;
                report.chunks_deleted += deleted;
            }
        }
        Ok(())
    }

    async fn remove_by_id(&self, id: &str) -> Result<Option<usize>> {
        let lock = self.document_lock(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.index.remove_document(id).await
        };
        self.release_document_lock(id, lock).await;
        result
    }

    /// Remove one document, returning the number of entries deleted
    pub async fn remove_document(&self, path: &Path) -> Result<usize> {
        let path_str = path.to_string_lossy();
        let record = self
            .index
            .document_by_path(&path_str)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(path.display().to_string()))?;

        self.remove_by_id(&record.id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(path.display().to_string()))
    }

    /// Re-chunk and re-embed every stored document, then record the
    /// current model and chunking parameters as the index identity
    pub async fn reindex(
        &self,
        cancel: &CancelToken,
        progress: Option<&ProgressBar>,
    ) -> Result<IngestReport> {
        let run_id = self.index.start_run("reindex").await?;
        let records = self.index.all_documents().await?;
        info!("Reindexing {} documents", records.len());

        if let Some(pb) = progress {
            pb.set_length(records.len() as u64);
        }

        let indexer = self;
        let mut results = stream::iter(records)
            .map(move |record| async move {
                let path = PathBuf::from(&record.path);
                if cancel.is_cancelled() {
                    return (path, Err(Error::Cancelled));
                }
                let result = match record.into_document() {
                    Ok(doc) => {
                        let lock = indexer.document_lock(&doc.id).await;
                        let result = {
                            let _guard = lock.lock().await;
                            indexer.index_locked(&doc, cancel, false).await
                        };
                        indexer.release_document_lock(&doc.id, lock).await;
                        result
                    }
                    Err(error) => Err(error),
                };
                (path, result)
            })
            .buffer_unordered(self.concurrency);

        let mut report = IngestReport::default();
        let mut fatal = None;
        while let Some((path, result)) = results.next().await {
            if let Some(pb) = progress {
                pb.inc(1);
            }
            match result {
                Ok(outcome) => report.record(outcome),
                Err(Error::Cancelled) => {}
                Err(error) if aborts_batch(&error) => {
                    fatal = Some(error);
                    break;
                }
                Err(error) => report.record_error(&path, &error),
            }
        }
        drop(results);

        report.cancelled = cancel.is_cancelled();
        if let Some(error) = fatal {
            report.errors.push(IngestError {
                path: String::new(),
                kind: error.kind().to_string(),
                message: error.to_string(),
            });
            self.index.complete_run(&run_id, &report).await?;
            return Err(error);
        }

        if !report.cancelled && !report.has_errors() {
            self.index.write_metadata(&self.metadata()).await?;
        } else {
            warn!("Reindex incomplete; index metadata left unchanged");
        }

        self.index.complete_run(&run_id, &report).await?;
        Ok(report)
    }
}
