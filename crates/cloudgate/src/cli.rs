//! Clap derive structures for the `cloudgate` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cloudgate -- device-control gateway for Tuya-style cloud IoT platforms
#[derive(Debug, Parser)]
#[command(
    name = "cloudgate",
    version,
    about = "Device-control gateway for Tuya-style cloud IoT platforms",
    long_about = "Serves a small HTTP facade (device details, commands, logs) over a\n\
        cloud IoT OpenAPI, or performs one signed call from the command line.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "CLOUDGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, env = "CLOUDGATE_LOG_JSON", global = true)]
    pub log_json: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway
    Serve(ServeArgs),

    /// Perform one signed call against the platform and print the answer
    Call(CallArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address, e.g. 0.0.0.0:8000 (overrides `listen` from config)
    #[arg(long, short = 'l')]
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// HTTP method
    pub method: HttpMethod,

    /// Platform path, e.g. /v1.0/devices/{id}
    pub path: String,

    /// Query parameter (repeatable, GET only)
    #[arg(long = "query", short = 'q', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,

    /// JSON request body (POST only)
    #[arg(long, short = 'd', conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the JSON request body from a file (POST only)
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "json")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (secret masked)
    Show,
    /// Print the default config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}
