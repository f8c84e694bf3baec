use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use session_rag::commands::{ask_once, chat, serve_mcp};
use session_rag::config::{Config, resolve_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "session-rag")]
#[command(about = "Ask questions about a document through per-session retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model provider and pipeline settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start MCP server on stdio
    Serve,
    /// Upload a document and answer one question about it
    Ask {
        /// Plain text or PDF document
        file: PathBuf,
        /// Question to answer from the document
        question: String,
    },
    /// Upload a document and ask questions about it interactively
    Chat {
        /// Plain text or PDF document
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries MCP traffic, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Serve => {
            let config = Config::load(&config_dir).context("Failed to load configuration")?;
            serve_mcp(&config).await?;
        }
        Commands::Ask { file, question } => {
            let config = Config::load(&config_dir).context("Failed to load configuration")?;
            ask_once(&config, &file, &question).await?;
        }
        Commands::Chat { file } => {
            let config = Config::load(&config_dir).context("Failed to load configuration")?;
            chat(&config, &file).await?;
        }
    }

    Ok(())
}
