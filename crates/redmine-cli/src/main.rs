//! redmine-mcp CLI - serve Redmine over MCP, or call its tools directly.

use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use redmine_core::{
    Config, Error, JsonMap, RedmineApi, RedmineConfig, ServerConfig, SharedApi, Transport,
};
use redmine_mcp::tools::redmine_tools;
use redmine_mcp::McpServer;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redmine-mcp")]
#[command(author, version, about = "MCP server exposing the Redmine REST API as tools", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server (default)
    Serve(ServeArgs),

    /// List the available tools
    Tools,

    /// Call a single tool and print its JSON result
    Call {
        /// Tool name, e.g. list_issues
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long)]
        args: Option<String>,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Default)]
struct ConnectionArgs {
    /// Redmine base URL (overrides REDMINE_URL)
    #[arg(long)]
    url: Option<String>,

    /// Redmine API key (overrides REDMINE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Transport: stdio or sse (overrides MCP_TRANSPORT)
    #[arg(long)]
    transport: Option<Transport>,

    /// Bind host for sse (overrides MCP_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port for sse (overrides MCP_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the config file (API key masked)
    Show,

    /// Print the config file location
    Path,

    /// Print one value, e.g. `redmine.url`
    Get { key: String },

    /// Set one value, e.g. `server.port 9000`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or_else(|| Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(args).await,
        Commands::Tools => list_tools(),
        Commands::Call {
            tool,
            args,
            connection,
        } => call(&tool, args.as_deref(), connection).await,
        Commands::Config { command } => config(command),
    }
}

/// Logs always go to stderr: stdout carries the stdio transport.
fn init_logging(verbose: bool) {
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

fn redmine_config(connection: ConnectionArgs, file: &Config) -> anyhow::Result<RedmineConfig> {
    Ok(RedmineConfig::resolve(connection.url, connection.api_key, file)?)
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let file = Config::load()?;
    let server_config = ServerConfig::resolve(args.transport, args.host, args.port, &file)?;
    let redmine = redmine_config(args.connection, &file)?;

    tracing::info!(
        url = %redmine.url,
        transport = %server_config.transport,
        "Starting Redmine MCP server"
    );
    let server = McpServer::from_config(&redmine)?;

    match server_config.transport {
        Transport::Stdio => server.serve_stdio().await?,
        Transport::Sse => redmine_mcp::sse::serve(server, &server_config.bind_address()).await?,
    }
    Ok(())
}

/// Stands in for the client when only tool metadata is needed.
struct Unconfigured;

#[async_trait]
impl RedmineApi for Unconfigured {
    async fn get(&self, _path: &str, _params: Option<&JsonMap>) -> redmine_core::Result<Value> {
        Err(not_configured())
    }

    async fn post(&self, _path: &str, _body: Option<&Value>) -> redmine_core::Result<Value> {
        Err(not_configured())
    }

    async fn put(&self, _path: &str, _body: Option<&Value>) -> redmine_core::Result<Value> {
        Err(not_configured())
    }

    async fn delete(&self, _path: &str) -> redmine_core::Result<Value> {
        Err(not_configured())
    }
}

fn not_configured() -> Error {
    Error::Config("No Redmine connection configured".to_string())
}

fn list_tools() -> anyhow::Result<()> {
    let api: SharedApi = Arc::new(Unconfigured);
    let registry = redmine_tools(api)?;

    for tool in registry.tools() {
        println!("{:<20} {}", tool.name(), tool.description());
    }
    Ok(())
}

/// Parse `--args`; absent means no arguments.
fn parse_arguments(raw: Option<&str>) -> anyhow::Result<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw).context("--args is not valid JSON")?;
    if !value.is_object() {
        bail!("--args must be a JSON object");
    }
    Ok(Some(value))
}

async fn call(tool: &str, args: Option<&str>, connection: ConnectionArgs) -> anyhow::Result<()> {
    let arguments = parse_arguments(args)?;
    let redmine = redmine_config(connection, &Config::load()?)?;
    let server = McpServer::from_config(&redmine)?;

    let result = server.registry().call(tool, arguments).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn config(command: ConfigCommands) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = Config::load()?.masked();
            let rendered = toml::to_string_pretty(&config)?;
            if rendered.trim().is_empty() {
                println!("# no configuration set ({})", Config::config_path()?.display());
            } else {
                print!("{}", rendered);
            }
        }
        ConfigCommands::Path => {
            println!("{}", Config::config_path()?.display());
        }
        ConfigCommands::Get { key } => match Config::load()?.get(&key)? {
            Some(value) => println!("{}", value),
            None => bail!("{} is not set", key),
        },
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            tracing::info!("Set {}", key);
        }
    }
    Ok(())
}
