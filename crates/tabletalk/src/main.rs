//! tabletalk - ask questions about tabular data

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ask_command, init_command, query_command, serve_command, status_command};

/// tabletalk - natural-language questions over CSV data
#[derive(Parser)]
#[command(name = "tabletalk")]
#[command(about = "Ask questions about tabular data with a tool-calling LLM")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Answer one question
    Ask {
        /// The question to answer
        question: String,
        /// Generate one SQL query instead of letting the model call tools
        #[arg(long)]
        single_shot: bool,
    },
    /// Run SQL against the loaded data
    Query {
        /// SQL statement
        sql: String,
    },
    /// Write the default config file
    Init,
    /// Show configuration status
    Status,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(matches!(cli.command, Commands::Serve { verbose: true }));

    let result = match cli.command {
        Commands::Serve { .. } => serve_command().await,
        Commands::Ask {
            question,
            single_shot,
        } => ask_command(question, single_shot).await,
        Commands::Query { sql } => query_command(sql).await,
        Commands::Init => init_command().await,
        Commands::Status => status_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
