use std::time::Duration;

use clap::{Args, Subcommand};
use lurk_session::{connect_with_config, Session, SessionConfig};

use crate::exit::{session_error, CliError, CliResult, USAGE};
use crate::logging::LogLevel;
use crate::output::OutputFormat;

pub mod commands;
pub mod play;
pub mod query;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a server and play interactively from stdin.
    Play(PlayArgs),
    /// Run the setup query and print the game description and extensions.
    Query(QueryArgs),
    /// List the built-in commands.
    Commands(CommandsArgs),
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    /// Interactive play keeps stderr quiet unless asked.
    pub fn default_log_level(&self) -> LogLevel {
        match self {
            Command::Play(_) => LogLevel::Warn,
            _ => LogLevel::Info,
        }
    }
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Play(args) => play::run(args, format),
        Command::Query(args) => query::run(args, format),
        Command::Commands(args) => commands::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Server hostname or address.
    #[arg(env = "LURK_HOST")]
    pub host: String,
    /// Server TCP port.
    #[arg(env = "LURK_PORT")]
    pub port: u16,
    /// Give up connecting after this long (e.g. 5s, 500ms). Blocks by default.
    #[arg(long, value_name = "DURATION", env = "LURK_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<String>,
}

impl ServerArgs {
    /// Build the session config and open the connection.
    pub fn connect(&self) -> CliResult<Session> {
        let connect_timeout = self
            .connect_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()?;
        let config = SessionConfig {
            connect_timeout,
            ..SessionConfig::default()
        };
        connect_with_config(&self.host, self.port, config)
            .map_err(|err| session_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    #[command(flatten)]
    pub server: ServerArgs,
    /// How often pending game text is written to stdout (e.g. 50ms).
    #[arg(long, value_name = "DURATION", default_value = "50ms")]
    pub poll_interval: String,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Args, Debug, Default)]
pub struct CommandsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
