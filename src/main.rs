// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Whistle gateway command line: chat with the assistant, inspect and call
//! MCP tools, and run the tool catalogue sync loop.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use whistle_gateway::config::{self, CliOptions, EnvOverrides, GatewayConfig};
use whistle_gateway::mcp::SyncOutcome;
use whistle_gateway::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};
use whistle_gateway::{AuthContext, ChatContext, ExecutionResult, Gateway, TurnOutcome, VERSION};

/// Whistle assistant gateway.
#[derive(Parser)]
#[command(name = "whistle-gateway")]
#[command(author, version, about = "Assistant gateway for the Whistle MCP tools", long_about = None)]
struct Cli {
    /// Explicit config file (JSON or YAML); replaces workspace discovery
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace directory to search for config files
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// MCP endpoint URL
    #[arg(long, global = true)]
    mcp_url: Option<String>,

    /// Language model provider
    #[arg(short, long, global = true)]
    provider: Option<Provider>,

    /// Model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Base URL for the model API
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Show info-level logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show debug logs with span timings
    #[arg(long, global = true)]
    debug: bool,

    /// Logging preset; takes precedence over --verbose and --debug
    #[arg(long, global = true, value_enum)]
    log_profile: Option<LogProfile>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    Openai,
    Ollama,
    OpenaiCompatible,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Openai => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
            Provider::OpenaiCompatible => write!(f, "openai-compatible"),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogProfile {
    /// Debug level, span timings and source locations
    Development,
    /// Info level without colours
    Production,
    /// Everything this crate emits, without colours
    Trace,
}

impl LogProfile {
    fn telemetry(self) -> TelemetryConfig {
        match self {
            LogProfile::Development => TelemetryConfig::development(),
            LogProfile::Production => TelemetryConfig::production(),
            LogProfile::Trace => TelemetryConfig::testing(),
        }
    }
}

/// Caller identity forwarded to the MCP endpoint.
#[derive(Args, Clone, Default)]
struct AuthArgs {
    /// Bearer token for the Whistle API
    #[arg(long, env = "WHISTLE_TOKEN")]
    token: Option<String>,

    /// User id sent as X-User-Id
    #[arg(long)]
    user_id: Option<String>,
}

impl AuthArgs {
    fn context(&self) -> AuthContext {
        AuthContext::new(self.token.clone(), self.user_id.clone())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message, or start an interactive chat when none is given
    Chat {
        message: Option<String>,

        /// Last known location as "lat,lng"
        #[arg(long)]
        location: Option<String>,

        /// Extra chat context as a JSON object
        #[arg(long)]
        context: Option<String>,

        /// Print the full turn outcome as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        auth: AuthArgs,
    },

    /// List the tools the MCP endpoint offers
    Tools {
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Call a tool directly
    Call {
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Connect and report connection state and metrics
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Sync the tool catalogue, once or until interrupted
    Sync {
        #[arg(long)]
        once: bool,
    },

    /// Show the merged configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = match cli.log_profile {
        Some(profile) => profile.telemetry(),
        None => TelemetryConfig::for_cli(cli.verbose, cli.debug),
    };
    let _telemetry = init_telemetry(&telemetry)?;

    let config = load_config(&cli)?;

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Err(e) = config.validate() {
        eprintln!("{} {}", "Configuration error:".red().bold(), e);
        eprintln!("Set it in whistle-gateway.json, the environment or on the command line.");
        std::process::exit(2);
    }

    let gateway = Gateway::from_config(&config)?;
    let result = run(&gateway, cli.command).await;
    gateway.shutdown().await;
    result
}

fn load_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let options = CliOptions {
        mcp_url: cli.mcp_url.clone(),
        provider: cli.provider.map(|p| p.to_string()),
        model: cli.model.clone(),
        base_url: cli.base_url.clone(),
        sync_interval_secs: None,
    };

    if let Some(path) = &cli.config {
        let file = config::load_config_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let global = config::load_global_config()?;
        return Ok(config::merge_config(global, Some(file), EnvOverrides::from_env(), options));
    }

    let root = match &cli.workspace {
        Some(dir) => dir.clone(),
        None => {
            let cwd = std::env::current_dir()?;
            config::find_workspace_root(&cwd).unwrap_or(cwd)
        }
    };
    Ok(config::load_config(&root, options)?)
}

async fn run(gateway: &Gateway, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Chat {
            message,
            location,
            context,
            json,
            auth,
        } => {
            let context = build_context(location, context.as_deref())?;
            let auth = auth.context();
            match message {
                Some(message) => chat_once(gateway, &message, context, &auth, json).await,
                None => chat_repl(gateway, context, &auth).await,
            }
        }
        Commands::Tools { json, auth } => {
            gateway.set_auth(&auth.context());
            let tools = gateway.list_tools().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tools)?);
                return Ok(());
            }
            println!("{}", format!("{} tools", tools.len()).bright_blue().bold());
            for tool in tools {
                println!("  {} {}", tool.name.bright_white(), tool.description.dimmed());
                for name in tool.input_schema.properties.keys() {
                    let marker = if tool.input_schema.is_required(name) { "*" } else { " " };
                    println!("      {}{}", marker.yellow(), name);
                }
            }
            Ok(())
        }
        Commands::Call { name, args, auth } => {
            let arguments = parse_object(&args, "--args")?;
            let result = gateway.execute_named_tool(&name, arguments, &auth.context()).await;
            print_result(&name, result)
        }
        Commands::Status { json } => {
            let connected = gateway.connect().await;
            let status = gateway.connection_status().await;
            let refreshed = gateway.schemas_refreshed_at();
            if json {
                let report = serde_json::json!({
                    "connection": status,
                    "schemasRefreshedAt": refreshed,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            println!("whistle-gateway {}", VERSION);
            match connected {
                Ok(()) => println!("{} connected", "●".green()),
                Err(e) => println!("{} {} ({} failed attempts)", "●".red(), e, status.attempts),
            }
            match refreshed {
                Some(at) => println!("Tool schemas refreshed {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("{}", "Tool schemas never fetched".dimmed()),
            }
            print!("{}", GLOBAL_METRICS.snapshot().format_report());
            Ok(())
        }
        Commands::Sync { once } => {
            if once {
                print_sync(&gateway.sync_now().await);
                return Ok(());
            }
            gateway.start_sync().await;
            println!("{}", "Syncing tool catalogue; Ctrl-C to stop".cyan());
            tokio::signal::ctrl_c().await?;
            gateway.stop_sync().await;
            println!("{} tools in catalogue", gateway.catalogue().len());
            Ok(())
        }
        Commands::Config => Ok(()),
    }
}

fn build_context(location: Option<String>, extra: Option<&str>) -> anyhow::Result<ChatContext> {
    let mut context = match extra {
        Some(text) => ChatContext::new(parse_object(text, "--context")?),
        None => ChatContext::default(),
    };
    if let Some(location) = location {
        context.insert("location", Value::String(location));
    }
    Ok(context)
}

fn parse_object(text: &str, flag: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).with_context(|| format!("{} is not valid JSON", flag))? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must be a JSON object", flag),
    }
}

async fn chat_once(
    gateway: &Gateway,
    message: &str,
    context: ChatContext,
    auth: &AuthContext,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = gateway.process_turn(message, context, auth).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

async fn chat_repl(gateway: &Gateway, context: ChatContext, auth: &AuthContext) -> anyhow::Result<()> {
    println!("{}", "Whistle assistant. Empty line or Ctrl-D to quit.".bright_blue());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", ">".bright_green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        match gateway.process_turn(line, context.clone(), auth).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) if e.is_retryable() => {
                eprintln!("{} {} (temporary, try again)", "Error:".red().bold(), e)
            }
            Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
        }
    }
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    let response = &outcome.response;
    if let Some((tool, _)) = response.tool_call() {
        let mark = match &outcome.tool_result {
            Some(result) if result.success => "✓".green(),
            _ => "✗".red(),
        };
        println!("{} {}", mark, tool.dimmed());
    }
    println!("{}", response.message);
    if response.has_booking_intent() {
        println!("{}", "(booking intent)".yellow());
    }
    if !response.suggestions.is_empty() {
        println!("{}", response.suggestions.join(" | ").cyan());
    }
}

fn print_result(tool: &str, result: ExecutionResult) -> anyhow::Result<()> {
    if !result.success {
        bail!(
            "Tool '{}' failed: {}",
            tool,
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    match result.data {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("{}", "Tool returned no data".dimmed()),
    }
    Ok(())
}

fn print_sync(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Published(count) => println!("{} published {} tools", "✓".green(), count),
        SyncOutcome::Unchanged => println!("{} catalogue unchanged", "✓".green()),
        SyncOutcome::Failed(e) => println!("{} sync failed: {}", "✗".red(), e),
    }
}
