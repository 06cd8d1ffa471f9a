mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "lurk", version, about = "Terminal client for Lurk text game servers")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Defaults to warn for play, info otherwise;
    /// LURK_LOG filter directives take precedence.
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let level = cli
        .log_level
        .unwrap_or_else(|| cli.command.default_log_level());
    init_logging(cli.log_format, level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_subcommand() {
        let cli = Cli::try_parse_from([
            "lurk",
            "play",
            "localhost",
            "5050",
            "--poll-interval",
            "100ms",
        ])
        .expect("play args should parse");

        match cli.command {
            Command::Play(args) => {
                assert_eq!(args.server.host, "localhost");
                assert_eq!(args.server.port, 5050);
                assert_eq!(args.poll_interval, "100ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn log_level_defaults_by_command() {
        let play = Cli::try_parse_from(["lurk", "play", "localhost", "5050"]).unwrap();
        assert_eq!(play.log_level, None);
        assert_eq!(play.command.default_log_level(), LogLevel::Warn);

        let query = Cli::try_parse_from(["lurk", "query", "localhost", "5050"]).unwrap();
        assert_eq!(query.command.default_log_level(), LogLevel::Info);

        let explicit =
            Cli::try_parse_from(["lurk", "play", "localhost", "5050", "--log-level", "debug"])
                .unwrap();
        assert_eq!(explicit.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = Cli::try_parse_from(["lurk", "query", "localhost", "abc"])
            .expect_err("bad port should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["lurk", "commands", "--format", "json"])
            .expect("commands args should parse");
        assert!(matches!(cli.command, Command::Commands(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn parses_query_with_connect_timeout() {
        let cli = Cli::try_parse_from([
            "lurk",
            "query",
            "127.0.0.1",
            "4000",
            "--connect-timeout",
            "2s",
        ])
        .expect("query args should parse");
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.server.connect_timeout.as_deref(), Some("2s"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
