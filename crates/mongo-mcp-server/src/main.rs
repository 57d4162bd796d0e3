//! mongo-mcp - MongoDB tools over the Model Context Protocol
//!
//! Usage:
//!   mongo-mcp [serve]            Run the stdio MCP server (default)
//!   mongo-mcp check              Connect once and print a connection report
//!   mongo-mcp config             Print an MCP client configuration snippet
//!   mongo-mcp tools              Print the tool catalogue
//!
//! Configuration comes from MONGODB_* / ENABLE_* environment variables;
//! the global flags below override them.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use mongo_mcp_mongodb::config::env;
use mongo_mcp_mongodb::{
    ConfigOverrides, ConfigSources, ConnectionDescriptor, ConnectionResolver, Operations,
};
use mongo_mcp_server::{client_config, McpServer, MongoTools};

#[derive(Parser)]
#[command(name = "mongo-mcp")]
#[command(about = "MongoDB MCP server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve,
    /// Resolve configuration, connect, and print a connection report
    Check,
    /// Print an MCP client configuration snippet
    Config,
    /// Print the tool catalogue as JSON
    Tools,
}

#[derive(Args, Debug, Default)]
struct OverrideArgs {
    /// MongoDB connection string
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Database used when a tool call omits database_name
    #[arg(long, global = true)]
    default_db: Option<String>,

    /// primary, primaryPreferred, secondary, secondaryPreferred or nearest
    #[arg(long, global = true)]
    read_preference: Option<String>,

    /// Write acknowledgement: a node count, "majority" or a tag
    #[arg(long, global = true)]
    write_concern: Option<String>,

    /// Require journal acknowledgement for writes (`--journal=false` to turn it off)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    journal: Option<bool>,

    /// local, majority, linearizable, available or snapshot
    #[arg(long, global = true)]
    read_concern: Option<String>,

    /// Per-operation timeout in milliseconds
    #[arg(long, global = true)]
    operation_timeout_ms: Option<u64>,

    /// Upper bound on documents returned by find_documents
    #[arg(long, global = true)]
    max_documents: Option<u64>,

    /// Allow drop_database, drop_collection and delete_many
    #[arg(long, global = true)]
    enable_dangerous_operations: bool,

    /// Refuse create_database, create_collection and rename_collection
    #[arg(long, global = true)]
    disable_admin_operations: bool,

    /// Refuse index creation, deletion and rebuilds
    #[arg(long, global = true)]
    disable_index_operations: bool,

    /// Log level when RUST_LOG is unset (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

impl OverrideArgs {
    fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            uri: self.uri.clone(),
            default_database: self.default_db.clone(),
            read_preference: self.read_preference.clone(),
            write_concern_w: self.write_concern.clone(),
            journal: self.journal,
            read_concern_level: self.read_concern.clone(),
            operation_timeout_ms: self.operation_timeout_ms,
            max_documents: self.max_documents,
            enable_dangerous_operations: self.enable_dangerous_operations.then_some(true),
            enable_admin_operations: self.disable_admin_operations.then_some(false),
            enable_index_operations: self.disable_index_operations.then_some(false),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let sources = ConfigSources::from_process_env().with_overrides(cli.overrides.to_overrides());

    let level = cli
        .overrides
        .log_level
        .clone()
        .or_else(|| sources.env.get(env::LOG_LEVEL).cloned())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&sources).await,
        Commands::Check => check(&sources).await,
        Commands::Config => print_json(&client_config()),
        Commands::Tools => print_json(&serde_json::to_value(MongoTools::list())?),
    }
}

fn operations(sources: &ConfigSources) -> Result<Operations> {
    let descriptor =
        ConnectionDescriptor::resolve(sources).context("Invalid MongoDB configuration")?;
    Ok(Operations::new(Arc::new(ConnectionResolver::from_descriptor(descriptor))))
}

/// Run MCP server (stdio mode)
async fn serve(sources: &ConfigSources) -> Result<()> {
    let ops = operations(sources)?;
    let resolver = ops.resolver().clone();
    let server = McpServer::new(ops);

    tokio::select! {
        served = server.run() => {
            served.context("MCP server I/O failed")?;
            info!("Input closed, shutting down");
        }
        signal = shutdown_signal() => {
            signal?;
            info!("Shutdown signal received");
        }
    }

    resolver.close().await;
    Ok(())
}

async fn check(sources: &ConfigSources) -> Result<()> {
    let ops = operations(sources)?;
    let report = ops.test_connection().await?;
    print_json(&report)?;
    ops.resolver().close().await;

    if report["connection_status"] != "healthy" {
        anyhow::bail!("MongoDB connection test failed");
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        ctrl_c = tokio::signal::ctrl_c() => ctrl_c.context("Failed to listen for SIGINT")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize logging on stderr; stdout carries the protocol
fn init_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized

    if level.parse::<tracing::Level>().is_err() {
        warn!(filter = level, "Log level is not a plain level; treating it as a filter directive");
    }
    Ok(())
}
