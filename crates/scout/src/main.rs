//! scout - a sandboxed filesystem agent

use clap::{Parser, Subcommand};
use tracing::error;

mod commands;

use commands::{chat_command, init_command, run_command, serve_command, RunOptions};

/// scout - let a model work on your files, inside a sandbox
#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "A sandboxed filesystem agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a one-shot query
    Run {
        /// The task or question for the agent
        query: String,
        /// Sandbox root (defaults to the configured root)
        #[arg(long)]
        root: Option<String>,
        /// Model identifier
        #[arg(long)]
        model: Option<String>,
        /// Maximum model round-trips before giving up
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Wall-clock limit for the whole run, in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Run tools through a stdio tool server instead of in-process,
        /// e.g. --mcp "scout serve --root ."
        #[arg(long)]
        mcp: Option<String>,
        /// Verbose step logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Single model round-trip, no tools
    Chat {
        /// Message to send
        message: String,
        /// Model identifier
        #[arg(long)]
        model: Option<String>,
    },
    /// Serve the filesystem tools over stdio (the child-process side of
    /// the protocol transport)
    Serve {
        /// Sandbox root to expose
        #[arg(long, default_value = ".")]
        root: String,
    },
    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr unconditionally: `serve` owns stdout for the
    // protocol stream.
    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "info" })
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            query,
            root,
            model,
            max_iterations,
            timeout_secs,
            mcp,
            verbose,
        } => {
            let options = RunOptions {
                root,
                model,
                max_iterations,
                timeout_secs,
                mcp,
                verbose,
            };
            if let Err(e) = run_command(&query, options).await {
                error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Chat { message, model } => {
            if let Err(e) = chat_command(&message, model).await {
                error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Serve { root } => {
            if let Err(e) = serve_command(&root).await {
                error!("Serve failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Init => {
            if let Err(e) = init_command().await {
                error!("Init failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
