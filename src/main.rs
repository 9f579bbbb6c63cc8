mod cli;

use agentic_gateway::{config, server};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agentic-gateway",
    version,
    about = "Streaming chat gateway with tool execution and durable user memory"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// List the tools offered to the model
    Tools,
    /// Inspect or edit stored memories
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Store a memory (deduplicated per user)
    Add {
        text: String,
        #[arg(long)]
        user: Option<String>,
        /// fact, preference, anchor, todo or profile
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Substring search, newest first
    Search {
        query: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List every memory for a user, newest first
    List {
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::GatewayConfig::load()?;

    // stderr keeps stdout clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Tools => cli::tools::list(),
        Command::Memory { action } => match action {
            MemoryAction::Add {
                text,
                user,
                kind,
                category,
                date,
            } => cli::memory::add(&config, &text, user, kind, category, date).await?,
            MemoryAction::Search { query, user, limit } => {
                cli::memory::search(&config, &query, user, limit).await?
            }
            MemoryAction::List { user } => cli::memory::list(&config, user).await?,
        },
    }

    Ok(())
}
