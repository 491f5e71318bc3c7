//! Query command implementation

use crate::error::Result;
use crate::retrieve::{QueryOptions, QueryResponse};
use crate::service::KnowledgeBase;

const PREVIEW_CHARS: usize = 200;

/// Execute a query, falling back to `query.default_k`
pub async fn cmd_query(
    kb: &KnowledgeBase,
    query: &str,
    k: Option<usize>,
    options: &QueryOptions,
) -> Result<QueryResponse> {
    let k = k.unwrap_or(kb.config().query.default_k);
    kb.query_with(query, k, options).await
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    let mut preview: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    if trimmed.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview.replace('\n', " ")
}

/// Print query results to console
pub fn print_query_results(response: &QueryResponse) {
    println!("\n🔍 Query: {}\n", response.query);

    if response.is_index_empty() {
        println!("The knowledge base is empty. Run 'kbase ingest <path>' first.");
        return;
    }

    println!(
        "Found {} results ({} chunks searched):\n",
        response.results.len(),
        response.entries_searched
    );

    for r in &response.results {
        println!(
            "{}. [{:.1}% relevant, score {:.3}] {}",
            r.rank, r.relevance_pct, r.score, r.path
        );
        if let Some(title) = &r.title {
            println!("   Title: {}", title);
        }
        println!(
            "   {} · chunk {} · chars {}-{}",
            r.label, r.chunk_index, r.char_start, r.char_end
        );
        println!("   {}\n", preview(&r.text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "é".repeat(300);
        let p = preview(&text);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_preview_flattens_newlines() {
        assert_eq!(preview("  line one\nline two  "), "line one line two");
    }
}
