//! Status and file listing commands

use crate::error::Result;
use crate::index::DocumentSummary;
use crate::service::{IndexStatus, KnowledgeBase};
use tracing::info;

/// Get index status
pub async fn cmd_status(kb: &KnowledgeBase) -> Result<IndexStatus> {
    info!("Getting status");
    kb.status().await
}

/// List ingested files
pub async fn cmd_files(kb: &KnowledgeBase) -> Result<Vec<DocumentSummary>> {
    kb.documents().await
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Warning shown when the configuration no longer matches the index
pub fn compatibility_notice(status: &IndexStatus) -> Option<String> {
    if status.compatible {
        return None;
    }
    let indexed = match (&status.model_version, status.dimension) {
        (Some(model), Some(dimension)) => format!("{} ({}d)", model, dimension),
        _ => "unknown model".to_string(),
    };
    let chunking = match (status.chunk_chars, status.overlap_chars) {
        (Some(chunk), Some(overlap)) => format!(", {} chars/{} overlap", chunk, overlap),
        _ => String::new(),
    };
    Some(format!(
        "Index was built with {}{} but config uses {} ({}d). Run 'kbase reindex'.",
        indexed, chunking, status.configured_model, status.configured_dimension
    ))
}

/// Print status to console
pub fn print_status(status: &IndexStatus) {
    println!("\n📊 kbase Status\n");
    println!("Index: {}", status.db_path.display());
    println!("  Documents: {}", status.document_count);
    println!("  Chunks: {}", status.entry_count);

    match (&status.model_version, status.dimension) {
        (Some(model), Some(dimension)) => {
            println!("\nIndexed with: {} ({}d)", model, dimension);
            if let (Some(chunk), Some(overlap)) = (status.chunk_chars, status.overlap_chars) {
                println!("  Chunking: {} chars, {} overlap", chunk, overlap);
            }
        }
        _ => println!("\nIndexed with: (nothing indexed yet)"),
    }

    println!(
        "Configured model: {} ({}d)",
        status.configured_model, status.configured_dimension
    );
    if let Some(notice) = compatibility_notice(status) {
        println!("  ⚠ {}", notice);
    }

    if let Some(run) = &status.last_run {
        println!("\nLast {}: {} ({})", run.operation, run.status, run.started_at);
        println!(
            "  Documents: {} indexed, {} unchanged, {} removed",
            run.docs_processed, run.docs_unchanged, run.docs_removed
        );
    }
}

/// Print ingested files to console
pub fn print_files(files: &[DocumentSummary]) {
    println!("\n📚 Ingested Files\n");

    if files.is_empty() {
        println!("No files ingested. Use 'kbase ingest <path>' to add some.");
        return;
    }

    for file in files {
        println!("• {}", file.path);
        println!(
            "  {} · {} chunks · {}",
            file.label,
            file.chunk_count,
            format_bytes(file.byte_size.max(0) as u64)
        );
        if let Some(title) = &file.title {
            println!("  Title: {}", title);
        }
    }

    let total: i64 = files.iter().map(|f| f.chunk_count).sum();
    println!("\n{} files, {} chunks", files.len(), total);
}
