//! Default values for configuration

/// Default embedding backend kind
pub fn default_embedding_backend() -> String {
    "hash".to_string()
}

/// Default embedding model identifier
pub fn default_embedding_model() -> String {
    "kbase/feature-hash-v1".to_string()
}

/// Default embedding dimension
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding backend URL
pub fn default_embedding_url() -> String {
    std::env::var("KBASE_EMBEDDING_URL").unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default retry count for remote embedding calls
pub fn default_embedding_retries() -> usize {
    2
}

/// Default request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default characters per chunk
pub fn default_chunk_chars() -> usize {
    1000
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    200
}

/// Default number of documents embedded concurrently
pub fn default_ingest_concurrency() -> usize {
    4
}

/// Default: descend into subdirectories
pub fn default_ingest_recursive() -> bool {
    true
}

/// Default: honour .gitignore files
pub fn default_follow_gitignore() -> bool {
    true
}

/// Default minimum trimmed content length for a file to be ingested
pub fn default_min_content_chars() -> usize {
    10
}

/// Default number of query results
pub fn default_query_k() -> usize {
    3
}

/// Default maximum query results
pub fn default_query_max_results() -> usize {
    100
}

/// Default minimum similarity score (the cosine floor: nothing is filtered)
pub fn default_query_min_score() -> f32 {
    -1.0
}
