use anyhow::Result;
use clap::{Parser, Subcommand};
use pdet_geodb::commands::{
    check_documents, init_database, load_config, run_report, show_status, verify_schema,
};
use pdet_geodb::config::{get_config_dir, run_interactive_config, show_config};
use pdet_geodb::report::OutputFormat;
use pdet_geodb::schema::{CollectionKind, CreationPolicy};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdet-geodb")]
#[command(about = "MongoDB schema setup and exploration queries for the PDET solar rooftop dataset")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the MongoDB connection and defaults
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Create the validated collections and their indexes
    Init {
        /// Fail when a collection or index already exists
        #[arg(long)]
        strict: bool,
    },
    /// Run the exploration report
    Report {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show server and collection status
    Status,
    /// Compare the live schema with the declared collections and indexes
    Verify,
    /// Validate JSON documents offline against a collection's rules
    Check {
        /// Target collection, e.g. pdet_municipalities or buildings_google
        collection: CollectionKind,
        /// JSON file holding one document or an array of documents
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&load_config(config_dir)?);
            } else {
                let dir = match config_dir {
                    Some(dir) => dir.to_path_buf(),
                    None => get_config_dir()?,
                };
                run_interactive_config(&dir).await?;
            }
        }
        Commands::Init { strict } => {
            let config = load_config(config_dir)?;
            let policy = if strict {
                CreationPolicy::Strict
            } else {
                config.schema.policy
            };
            init_database(&config, policy).await?;
        }
        Commands::Report { format } => {
            run_report(&load_config(config_dir)?, format).await?;
        }
        Commands::Status => {
            show_status(&load_config(config_dir)?).await?;
        }
        Commands::Verify => {
            verify_schema(&load_config(config_dir)?).await?;
        }
        Commands::Check { collection, file } => {
            check_documents(collection, &file)?;
        }
    }

    Ok(())
}
