use anyhow::Result;
use clap::{Parser, Subcommand};
use doc_chat::commands::{ask, chat, suggest};
use doc_chat::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doc-chat")]
#[command(about = "Chat with a document using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.doc-chat)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model provider and vector index
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load a document and chat about it
    Chat {
        /// Plain text or Markdown file
        file: PathBuf,
    },
    /// Load a document and answer one question about it
    Ask {
        /// Plain text or Markdown file
        file: PathBuf,
        /// The question to answer
        question: String,
    },
    /// Print a starter question
    Suggest,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Chat { file } => {
            chat(&config_dir, &file).await?;
        }
        Commands::Ask { file, question } => {
            ask(&config_dir, &file, &question).await?;
        }
        Commands::Suggest => {
            suggest();
        }
    }

    Ok(())
}
