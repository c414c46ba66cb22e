//! scout command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use scout_agent::tools::filesystem_registry;
use scout_agent::{
    AgentLoop, DirectTransport, McpTransport, MeteredProvider, MeteredTransport, RunOutcome,
    ToolTransport, UsageMeter,
};
use scout_config::Config;
use scout_mcp::McpServer;
use scout_provider::{ChatParams, Message, OpenAiProvider, Provider};

pub struct RunOptions {
    pub root: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub mcp: Option<String>,
    pub verbose: bool,
}

/// Load config and fold CLI flag overrides on top.
async fn effective_config(options: &RunOptions) -> Result<Config> {
    let mut config = Config::load().await?;
    if let Some(root) = &options.root {
        config.agent.root = root.clone();
    }
    if let Some(model) = &options.model {
        config.agent.model = model.clone();
    }
    if let Some(max) = options.max_iterations {
        config.agent.max_iterations = max;
    }
    if options.verbose {
        config.agent.verbose = true;
    }
    Ok(config)
}

fn build_provider(config: &Config) -> Result<OpenAiProvider> {
    let api_key = config
        .api_key()
        .context("no API key configured; set OPENAI_API_KEY or edit ~/.scout/config.json")?;
    Ok(OpenAiProvider::new(
        api_key,
        config.api_base(),
        Some(config.agent.model.clone()),
    ))
}

/// One-shot agent run.
pub async fn run_command(query: &str, options: RunOptions) -> Result<()> {
    let config = effective_config(&options).await?;
    let meter = UsageMeter::new();
    let provider = MeteredProvider::new(build_provider(&config)?, meter.clone());

    let transport: Arc<dyn ToolTransport> = match &options.mcp {
        Some(server_command) => {
            let mut parts = server_command.split_whitespace();
            let program = parts
                .next()
                .context("--mcp needs a server command, e.g. \"scout serve --root .\"")?;
            let args: Vec<String> = parts.map(str::to_string).collect();
            debug!("starting tool server: {} {:?}", program, args);
            Arc::new(MeteredTransport::new(
                McpTransport::connect(program, &args)
                    .await
                    .map_err(|e| anyhow::anyhow!("agent could not complete: {}", e))?,
                meter.clone(),
            ))
        }
        None => {
            let sandbox_root = config.sandbox_root()?;
            info!("sandbox root: {}", sandbox_root.display());
            Arc::new(MeteredTransport::new(
                DirectTransport::new(filesystem_registry(&sandbox_root)),
                meter.clone(),
            ))
        }
    };

    let cancel = CancellationToken::new();
    let agent = AgentLoop::new(
        provider,
        transport,
        config.agent.model.clone(),
        config.agent.max_iterations,
    )
    .with_cancellation(cancel.clone())
    .with_sampling(config.agent.max_tokens, config.agent.temperature);

    let report = match options.timeout_secs {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), agent.run(query)).await {
                Ok(report) => report,
                Err(_) => {
                    cancel.cancel();
                    anyhow::bail!("agent could not complete: timed out after {}s", secs);
                }
            }
        }
        None => agent.run(query).await,
    };

    let report = report.map_err(|e| anyhow::anyhow!("agent could not complete: {}", e))?;

    if config.agent.verbose {
        let stats = meter.snapshot();
        eprintln!(
            "[{} iterations, {} tool calls, {} tokens]",
            report.iterations, stats.tool_calls, stats.total_tokens
        );
    }

    match report.outcome {
        RunOutcome::Completed(text) => {
            println!("{}", text);
            Ok(())
        }
        RunOutcome::MaxIterationsReached { last_content } => {
            if let Some(partial) = last_content {
                println!("{}", partial);
            }
            anyhow::bail!("task incomplete after {} iterations", report.iterations)
        }
    }
}

/// Single round-trip chat, no tools.
pub async fn chat_command(message: &str, model: Option<String>) -> Result<()> {
    let mut config = Config::load().await?;
    if let Some(model) = model {
        config.agent.model = model;
    }

    let provider = build_provider(&config)?;
    let params = ChatParams {
        model: config.agent.model.clone(),
        messages: vec![
            Message::system("You are a helpful assistant."),
            Message::user(message),
        ],
        max_tokens: config.agent.max_tokens,
        temperature: config.agent.temperature,
        ..Default::default()
    };

    let response = provider.chat(params).await?;
    println!("{}", response.content.unwrap_or_default());
    Ok(())
}

/// Serve the filesystem tools over stdin/stdout.
///
/// Nothing but protocol frames may touch stdout here; all logging goes
/// to stderr (set up in main).
pub async fn serve_command(root: &str) -> Result<()> {
    let root = if std::path::Path::new(root).is_absolute() {
        std::path::PathBuf::from(root)
    } else {
        std::env::current_dir()?.join(root)
    };
    anyhow::ensure!(root.is_dir(), "sandbox root {} is not a directory", root.display());

    info!("serving filesystem tools for {}", root.display());
    let registry = filesystem_registry(&root);
    let server = McpServer::new(registry, "scout-fs-server");
    server.serve_stdio().await?;
    Ok(())
}

/// Write a default config file if none exists.
pub async fn init_command() -> Result<()> {
    let path = scout_config::config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    let config = Config::default();
    config.save_to(&path).await?;
    println!("Wrote default config to {}", path.display());
    println!("Set provider.api_key (or the OPENAI_API_KEY environment variable) to get started.");
    Ok(())
}
