//! Reindex command implementation

use crate::error::Result;
use crate::ingest::{CancelToken, IngestReport};
use crate::progress::{finish_progress, start_progress_bar};
use crate::service::KnowledgeBase;
use tracing::info;

/// Rebuild every entry from stored document text
pub async fn cmd_reindex(
    kb: &KnowledgeBase,
    cancel: &CancelToken,
    show_progress: bool,
) -> Result<IngestReport> {
    let status = kb.status().await?;
    info!(
        "Reindexing {} documents with {} ({}d)",
        status.document_count, status.configured_model, status.configured_dimension
    );

    let progress =
        show_progress.then(|| start_progress_bar(status.document_count as u64, "Reindexing"));
    let result = kb.reindex(cancel, progress.as_ref()).await;
    finish_progress(progress, "Reindex finished");

    result
}

/// Print reindex statistics to console
pub fn print_reindex_report(report: &IngestReport) {
    if report.cancelled {
        println!("\n⚠ Reindex cancelled; index metadata was not updated");
    } else if report.errors.is_empty() {
        println!("\n✓ Reindex complete");
    } else {
        println!("\n⚠ Reindex finished with errors; index metadata was not updated");
    }
    println!("  Documents reindexed: {}", report.documents_processed);
    println!("  Chunks indexed: {}", report.chunks_indexed);
    println!("  Chunks replaced: {}", report.chunks_deleted);

    for error in &report.errors {
        println!("  ✗ {}: {}", error.path, error.message);
    }
}
