//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::service::KnowledgeBase;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

impl InitOptions {
    /// Resolve `--config`, which may name a `.toml` file or a directory
    pub fn from_config_arg(path: Option<PathBuf>, force: bool) -> Self {
        let (base_dir, config_path) = match path {
            Some(path) if path.extension().is_some_and(|e| e == "toml") => {
                let base = path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(Config::default_base_dir);
                (base, path)
            }
            Some(dir) => (dir.clone(), dir.join("config.toml")),
            None => {
                let base = Config::default_base_dir();
                (base.clone(), base.join("config.toml"))
            }
        };
        Self {
            base_dir,
            config_path,
            force,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitSummary {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub embedding_backend: String,
    pub embedding_model: String,
    pub dimension: usize,
}

/// Write a default configuration and create an empty index
pub async fn cmd_init(options: InitOptions) -> Result<InitSummary> {
    if options.config_path.exists() && !options.force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            options.config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(options.base_dir));
    config.paths.config_file = options.config_path;
    config.validate()?;
    config.save()?;

    let kb = KnowledgeBase::open(config.clone()).await?;
    info!("Created index at {:?}", config.paths.db_file);
    let status = kb.status().await?;

    Ok(InitSummary {
        config_path: config.paths.config_file.clone(),
        db_path: status.db_path,
        embedding_backend: config.embedding.backend.clone(),
        embedding_model: status.configured_model,
        dimension: status.configured_dimension,
    })
}

pub fn print_init_summary(summary: &InitSummary) {
    println!("✓ kbase initialized successfully");
    println!("  Config: {}", summary.config_path.display());
    println!("  Index: {}", summary.db_path.display());
    println!(
        "  Embedding: {} backend, {} ({}d)",
        summary.embedding_backend, summary.embedding_model, summary.dimension
    );
    println!("\nNext steps:");
    println!("  1. Edit the config file to customize settings");
    println!("  2. Ingest docs: kbase ingest /path/to/docs");
    println!("  3. Ask a question: kbase query \"how do I wire a servo?\"");
}
