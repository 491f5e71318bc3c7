//! kbase CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use kbase::{
    commands::{
        cmd_files, cmd_ingest, cmd_init, cmd_query, cmd_reindex, cmd_remove, cmd_scan,
        cmd_status, print_files, print_ingest_report, print_init_summary, print_query_results,
        print_reindex_report, print_remove_result, print_scan_summary, print_status, InitOptions,
    },
    config::Config,
    error::{Error, Result},
    ingest::CancelToken,
    progress::LogWriterFactory,
    retrieve::QueryOptions,
    KnowledgeBase,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kbase")]
#[command(version, about = "Local knowledge-base indexer and similarity search", long_about = None)]
struct Cli {
    /// Path to config file (or its directory)
    #[arg(short, long, global = true, env = "KBASE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize kbase configuration and index
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest files or directories into the index
    Ingest {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Do not show a progress indicator
        #[arg(long)]
        no_progress: bool,
    },

    /// Query the index
    Query {
        /// The search query
        query: String,

        /// Number of results (defaults to query.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Minimum similarity score (-1 to 1)
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Keep only the best chunk per document
        #[arg(long)]
        dedupe: bool,
    },

    /// Show index status
    Status,

    /// List ingested files
    Files,

    /// Show what an ingest of a directory would pick up
    Scan {
        /// Directory to scan
        dir: PathBuf,
    },

    /// Remove an ingested file from the index
    Remove {
        /// Path of the ingested file
        path: PathBuf,
    },

    /// Re-chunk and re-embed every document with the current configuration
    Reindex {
        /// Do not show a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel token that fires on Ctrl-C
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight documents");
            token.cancel();
        }
    });
    cancel
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let summary = cmd_init(InitOptions::from_config_arg(cli.config, force)).await?;
            if cli.json {
                print_json(&summary)?;
            } else {
                print_init_summary(&summary);
            }
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "kbase", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;

    // Reindex repairs a mismatched index and status/files report on one
    let unchecked = matches!(
        cli.command,
        Commands::Reindex { .. } | Commands::Status | Commands::Files
    );
    let kb = if unchecked {
        KnowledgeBase::open_unchecked(config).await?
    } else {
        KnowledgeBase::open(config).await?
    };

    match cli.command {
        Commands::Ingest { paths, no_progress } => {
            let cancel = cancel_on_ctrl_c();
            let report = cmd_ingest(&kb, &paths, &cancel, !no_progress && !cli.json).await?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_ingest_report(&report);
            }
        }

        Commands::Query {
            query,
            k,
            min_score,
            dedupe,
        } => {
            let options = QueryOptions { min_score, dedupe };
            let response = cmd_query(&kb, &query, k, &options).await?;
            if cli.json {
                print_json(&response)?;
            } else {
                print_query_results(&response);
            }
        }

        Commands::Status => {
            let status = cmd_status(&kb).await?;
            if cli.json {
                print_json(&status)?;
            } else {
                print_status(&status);
            }
        }

        Commands::Files => {
            let files = cmd_files(&kb).await?;
            if cli.json {
                print_json(&files)?;
            } else {
                print_files(&files);
            }
        }

        Commands::Scan { dir } => {
            let summary = cmd_scan(&kb, &dir)?;
            if cli.json {
                print_json(&summary)?;
            } else {
                print_scan_summary(&summary);
            }
        }

        Commands::Remove { path } => {
            let result = cmd_remove(&kb, &path).await?;
            if cli.json {
                print_json(&result)?;
            } else {
                print_remove_result(&result);
            }
        }

        Commands::Reindex { no_progress } => {
            let cancel = cancel_on_ctrl_c();
            let report = cmd_reindex(&kb, &cancel, !no_progress && !cli.json).await?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_reindex_report(&report);
            }
        }

        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.is_dir() => p.join("config.toml"),
        Some(p) => p.to_path_buf(),
        None => Config::default_config_path(),
    };

    if !config_path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}. Run 'kbase init' first.",
            config_path.display()
        )));
    }

    Config::load(&config_path)
}
