//! Scan command: dry-run of what an ingest would pick up

use crate::error::Result;
use crate::load::ScanSummary;
use crate::service::KnowledgeBase;
use std::path::Path;

pub fn cmd_scan(kb: &KnowledgeBase, dir: &Path) -> Result<ScanSummary> {
    kb.scan(dir)
}

pub fn print_scan_summary(summary: &ScanSummary) {
    println!("\n🗂  Scan of {}\n", summary.root.display());
    println!("Files found: {}", summary.total_files);
    println!(
        "  Supported: {} ({:.1} KB)",
        summary.supported_files,
        summary.supported_bytes as f64 / 1024.0
    );
    println!("  Binary (skipped): {}", summary.binary_files);
    println!("  Unsupported (skipped): {}", summary.unsupported_files);

    if !summary.by_type.is_empty() {
        println!("\nBy type:");
        for (label, stats) in &summary.by_type {
            println!(
                "  {:<20} {:>5} files  {:>10.1} KB",
                label,
                stats.files,
                stats.bytes as f64 / 1024.0
            );
        }
    }
}
