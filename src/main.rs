// IDE Agent Gateway - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI and HTTP server. All tool calls route through the gateway.
// Usage:
//   ide-agent-gate serve                                # Run HTTP server
//   ide-agent-gate run --session <id> <query>           # One agent run, JSON to stdout
//   ide-agent-gate check-command <cmd>                  # Command safety verdict
//   ide-agent-gate check-path <path>                    # Path safety verdict
//   ide-agent-gate tools                                # Print the tool catalog
//   ide-agent-gate errors                               # Dump the error journal
//   ide-agent-gate register-session <id> <codebase>     # Map a session to a project root
//   ide-agent-gate unregister-session <id>              # Drop a session registration
//   ide-agent-gate sessions                             # List registered sessions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ide_agent_gate::{
    agent::Agent,
    command_safety::CommandValidator,
    config::AgentConfig,
    gateway::Gateway,
    http::{self, AppState},
    model::AnthropicClient,
    path_safety, paths,
    storage::GatewayStorage,
    tools,
};
use std::path::PathBuf;
use std::sync::Arc;

fn default_config_path() -> PathBuf {
    paths::gate_root().join("ide-agent-gate.json")
}

#[derive(Parser)]
#[command(name = "ide-agent-gate")]
#[command(author = "Joseph Stone")]
#[command(version = "0.3.0")]
#[command(about = "IDE Agent Gateway - bounded tool-use agent with safety-gated tools")]
struct Cli {
    /// JSON config file (missing file = defaults)
    #[arg(short, long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the agent once against a session and print the response
    Run {
        #[arg(short, long)]
        session: String,

        /// The request for the agent
        query: String,
    },

    /// Classify a shell command without running it
    CheckCommand {
        command: String,
    },

    /// Classify a path against the protected scope
    CheckPath {
        path: PathBuf,
    },

    /// Print the tool catalog offered to the model
    Tools,

    /// Dump the tool error journal
    Errors,

    /// Register a session whose codebase lives outside the artifacts layout
    RegisterSession {
        id: String,
        codebase: PathBuf,
    },

    /// Remove a session registration
    UnregisterSession {
        id: String,
    },

    /// List registered sessions
    Sessions,
}

fn open_storage(config: &AgentConfig) -> Result<Option<Arc<GatewayStorage>>> {
    match &config.storage_path {
        Some(path) => {
            let storage = GatewayStorage::open(path)
                .with_context(|| format!("Failed to open storage at {:?}", path))?;
            log::info!("Storage open at {:?} ({} entries)", path, storage.entry_count()?);
            Ok(Some(Arc::new(storage)))
        }
        None => Ok(None),
    }
}

fn require_storage(storage: Option<Arc<GatewayStorage>>) -> Result<Arc<GatewayStorage>> {
    storage.context("storage_path is not set in the config")
}

fn build_agent(config: &AgentConfig, storage: Option<Arc<GatewayStorage>>) -> Result<Arc<Agent>> {
    let gateway = Gateway::from_config(config, storage)?;
    let model = AnthropicClient::new(&config.model).context("Failed to create model client")?;
    let budget = config.limits.max_tool_calls as usize;
    Ok(Arc::new(Agent::new(Arc::new(model), Arc::new(gateway), budget)))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn main() -> Result<()> {
    // Initialize logging (safe if already init)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let cli = Cli::parse();

    let mut config = AgentConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    config.apply_env();

    let storage = open_storage(&config)?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let agent = build_agent(&config, storage)?;
            let state = AppState::new(agent, config.paths.artifacts_root.clone());
            runtime()?.block_on(http::serve(state, &bind))?;
        }

        Commands::Run { session, query } => {
            let agent = build_agent(&config, storage)?;
            let response = runtime()?.block_on(agent.handle(&query, &session, &config.paths.artifacts_root));
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }

        Commands::CheckCommand { command } => {
            let validator = CommandValidator::new().context("compiling command safety rules")?;
            let verdict = validator.check(&command);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            if verdict.dangerous {
                std::process::exit(1);
            }
        }

        Commands::CheckPath { path } => {
            let scope = config.path_scope();
            let verdict = path_safety::verdict(&paths::absolutize(&path), &scope);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            if verdict.dangerous {
                std::process::exit(1);
            }
        }

        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tools::catalog())?);
        }

        Commands::Errors => {
            let storage = require_storage(storage)?;
            let errors = storage.errors()?;
            println!("{}", serde_json::to_string_pretty(&errors)?);
            eprintln!("{} recorded errors", errors.len());
        }

        Commands::RegisterSession { id, codebase } => {
            let storage = require_storage(storage)?;
            let codebase = paths::absolutize(&codebase);
            if !codebase.is_dir() {
                anyhow::bail!("Codebase {:?} is not a directory", codebase);
            }
            let record = storage.register_session(&id, &codebase)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::UnregisterSession { id } => {
            let storage = require_storage(storage)?;
            if storage.unregister_session(&id)? {
                println!("Session {} unregistered.", id);
            } else {
                println!("Session {} was not registered.", id);
            }
        }

        Commands::Sessions => {
            let storage = require_storage(storage)?;
            for record in storage.list_sessions()? {
                println!("{}\t{}", record.id, record.codebase.display());
            }
        }
    }

    Ok(())
}
