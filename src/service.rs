//! Knowledge base facade
//!
//! Wires the loader, indexer and retriever to one persisted index. The CLI
//! and library users go through [`KnowledgeBase`]; the stages underneath
//! share nothing beyond the index itself.

use crate::config::Config;
use crate::embed::{create_embedder, Embedder};
use crate::error::Result;
use crate::index::{DocumentSummary, IngestionRun, VectorIndex};
use crate::ingest::{CancelToken, IngestReport, Indexer};
use crate::load::{DocumentLoader, LoaderOptions, ScanSummary};
use crate::retrieve::{QueryOptions, QueryResponse, Retriever};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of index state
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub db_path: PathBuf,
    pub entry_count: usize,
    pub document_count: usize,
    /// Model recorded in the index (None until first write)
    pub model_version: Option<String>,
    pub dimension: Option<usize>,
    pub chunk_chars: Option<usize>,
    pub overlap_chars: Option<usize>,
    pub schema_version: Option<i64>,
    pub configured_model: String,
    pub configured_dimension: usize,
    /// False when the configuration no longer matches the stored index
    pub compatible: bool,
    pub last_run: Option<IngestionRun>,
}

pub struct KnowledgeBase {
    config: Config,
    index: VectorIndex,
    loader: DocumentLoader,
    indexer: Indexer,
    retriever: Retriever,
}

impl KnowledgeBase {
    /// Open the configured index, failing on a model or chunking mismatch
    pub async fn open(config: Config) -> Result<Self> {
        let kb = Self::open_unchecked(config).await?;
        kb.index.ensure_compatible(&kb.indexer.metadata()).await?;
        Ok(kb)
    }

    /// Open the configured index without checking its recorded identity
    ///
    /// For [`KnowledgeBase::reindex`] and for read-only reporting, which must
    /// work on a mismatched index. Queries and ingests should go through
    /// [`KnowledgeBase::open`].
    pub async fn open_unchecked(config: Config) -> Result<Self> {
        debug!("Opening index at {:?}", config.paths.db_file);
        let index = VectorIndex::open(&config.paths.db_file).await?;
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        Self::with_components(config, index, embedder)
    }

    /// Assemble from an existing index and embedder
    pub fn with_components(
        config: Config,
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        config.validate()?;
        let loader = DocumentLoader::new(LoaderOptions::from(&config.ingest));
        let indexer = Indexer::from_config(index.clone(), embedder.clone(), &config)?;
        let retriever = Retriever::from_config(index.clone(), embedder, &config.query);
        Ok(Self {
            config,
            index,
            loader,
            indexer,
            retriever,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Ingest files and directories
    pub async fn ingest(&self, targets: &[PathBuf]) -> Result<IngestReport> {
        self.ingest_with(targets, &CancelToken::new(), None).await
    }

    pub async fn ingest_with(
        &self,
        targets: &[PathBuf],
        cancel: &CancelToken,
        progress: Option<&ProgressBar>,
    ) -> Result<IngestReport> {
        self.indexer
            .ingest(&self.loader, targets, cancel, progress)
            .await
    }

    /// Top-`k` chunks for `text`
    pub async fn query(&self, text: &str, k: usize) -> Result<QueryResponse> {
        self.retriever.query(text, k).await
    }

    pub async fn query_with(
        &self,
        text: &str,
        k: usize,
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        self.retriever.query_with(text, k, options).await
    }

    pub async fn status(&self) -> Result<IndexStatus> {
        let configured = self.indexer.metadata();
        let stored = self.index.metadata().await?;
        let compatible = stored
            .as_ref()
            .map(|s| s.check_against(&configured).is_ok())
            .unwrap_or(true);

        Ok(IndexStatus {
            db_path: self.config.paths.db_file.clone(),
            entry_count: self.index.entry_count().await?,
            document_count: self.index.document_count().await?,
            model_version: stored.as_ref().map(|s| s.model.clone()),
            dimension: stored.as_ref().map(|s| s.dimension),
            chunk_chars: stored.as_ref().map(|s| s.chunk_chars),
            overlap_chars: stored.as_ref().map(|s| s.overlap_chars),
            schema_version: stored.as_ref().map(|s| s.schema_version),
            configured_model: configured.model,
            configured_dimension: configured.dimension,
            compatible,
            last_run: self.index.latest_run().await?,
        })
    }

    /// Ingested files with their chunk counts
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        self.index.list_documents().await
    }

    /// Remove a file's document and entries, returning the entries deleted
    pub async fn remove(&self, path: &Path) -> Result<usize> {
        // Deleted files can no longer be canonicalised
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.indexer.remove_document(&path).await
    }

    /// Rebuild every entry under the current model and chunking settings
    pub async fn reindex(
        &self,
        cancel: &CancelToken,
        progress: Option<&ProgressBar>,
    ) -> Result<IngestReport> {
        self.indexer.reindex(cancel, progress).await
    }

    /// Dry-run summary of a directory
    pub fn scan(&self, root: &Path) -> Result<ScanSummary> {
        self.loader.scan_summary(root)
    }
}
