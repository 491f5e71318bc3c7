//! Post-search scoring of ranked hits

use crate::index::SearchHit;

/// Relevance of a cosine score as a percentage (negative scores map to 0)
pub fn relevance_pct(score: f32) -> f32 {
    score.clamp(0.0, 1.0) * 100.0
}

/// Drop hits scoring below `min_score`
pub fn filter_by_score(hits: Vec<SearchHit>, min_score: f32) -> Vec<SearchHit> {
    hits.into_iter().filter(|h| h.score >= min_score).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc: &str, seq: i64, score: f32) -> SearchHit {
        SearchHit {
            seq,
            score,
            doc_id: doc.to_string(),
            path: format!("/kb/{}.txt", doc),
            title: None,
            format: "text".to_string(),
            label: "Text File".to_string(),
            chunk_index: 0,
            char_start: 0,
            char_end: 10,
            chunk_text: "chunk".to_string(),
        }
    }

    #[test]
    fn test_filter_by_score() {
        let hits = vec![hit("a", 1, 0.9), hit("b", 2, 0.4), hit("c", 3, -0.2)];
        let kept = filter_by_score(hits, 0.4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].doc_id, "b");
    }

    #[test]
    fn test_relevance_pct() {
        assert_eq!(relevance_pct(0.5), 50.0);
        assert_eq!(relevance_pct(-0.3), 0.0);
        assert_eq!(relevance_pct(1.2), 100.0);
    }
}
