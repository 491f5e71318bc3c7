//! kbase - a local knowledge-base indexer
//!
//! Documents are loaded from directory trees, split into overlapping
//! fixed-size chunks, embedded, and stored in a SQLite-backed vector index
//! that can be queried by similarity.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod index;
pub mod ingest;
pub mod load;
pub mod progress;
pub mod retrieve;
pub mod service;

pub use service::{IndexStatus, KnowledgeBase};
