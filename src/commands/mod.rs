//! CLI commands implementation

pub mod ingest;
pub mod init;
pub mod query;
pub mod reindex;
pub mod remove;
pub mod scan;
pub mod status;

pub use ingest::*;
pub use init::*;
pub use query::*;
pub use reindex::*;
pub use remove::*;
pub use scan::*;
pub use status::*;
