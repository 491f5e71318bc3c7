//! Ingest command implementation

use crate::error::Result;
use crate::ingest::{CancelToken, IngestReport};
use crate::progress::{finish_progress, start_counter};
use crate::service::KnowledgeBase;
use std::path::PathBuf;
use tracing::info;

/// Ingest files and directories into the knowledge base
pub async fn cmd_ingest(
    kb: &KnowledgeBase,
    paths: &[PathBuf],
    cancel: &CancelToken,
    show_progress: bool,
) -> Result<IngestReport> {
    info!("Ingesting {} path(s)", paths.len());

    let progress = show_progress.then(|| start_counter("Indexing documents"));
    let result = kb.ingest_with(paths, cancel, progress.as_ref()).await;
    finish_progress(
        progress,
        if cancel.is_cancelled() {
            "Cancelled"
        } else {
            "Documents processed"
        },
    );

    result
}

/// Print ingest statistics to console
pub fn print_ingest_report(report: &IngestReport) {
    if report.cancelled {
        println!("\n⚠ Ingestion cancelled; documents already committed were kept");
    } else {
        println!("\n✓ Ingestion complete");
    }
    println!("  Documents indexed: {}", report.documents_processed);
    println!("  Documents unchanged: {}", report.documents_unchanged);
    if report.documents_stale > 0 {
        println!("  Documents stale: {}", report.documents_stale);
    }
    println!("  Files skipped: {}", report.documents_skipped);
    println!("  Documents removed: {}", report.documents_removed);
    println!("  Chunks indexed: {}", report.chunks_indexed);
    println!("  Chunks deleted: {}", report.chunks_deleted);

    if !report.errors.is_empty() {
        println!("\n✗ {} error(s):", report.errors.len());
        for error in &report.errors {
            println!("  • [{}] {}", error.kind, error.message);
        }
    }
}
