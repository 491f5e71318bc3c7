//! Remove command implementation

use crate::error::Result;
use crate::service::KnowledgeBase;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct RemoveResult {
    pub path: PathBuf,
    pub chunks_deleted: usize,
}

/// Remove one ingested file from the index
pub async fn cmd_remove(kb: &KnowledgeBase, path: &Path) -> Result<RemoveResult> {
    let chunks_deleted = kb.remove(path).await?;
    Ok(RemoveResult {
        path: path.to_path_buf(),
        chunks_deleted,
    })
}

pub fn print_remove_result(result: &RemoveResult) {
    println!(
        "✓ Removed {} ({} chunks deleted)",
        result.path.display(),
        result.chunks_deleted
    );
}
