use std::io::{IsTerminal, Stdout, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use lurk_session::{CommandSpec, CommandTable, DisplaySink, GameInfo, SessionStats};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct LineOutput<'a> {
    line: &'a str,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    peer: &'a str,
    stats: SessionStats,
}

/// Writes game text to stdout as it is drained from the session.
///
/// JSON output emits one `{"line": ...}` object per display line; every other
/// format prints the text as is.
pub struct TerminalSink {
    format: OutputFormat,
    out: Stdout,
}

impl TerminalSink {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            out: std::io::stdout(),
        }
    }
}

impl DisplaySink for TerminalSink {
    fn push_line(&mut self, line: &str) {
        let mut out = self.out.lock();
        let _ = match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string(&LineOutput { line })
                    .unwrap_or_else(|_| "{}".to_string());
                writeln!(out, "{json}")
            }
            _ => writeln!(out, "{}", line.trim_end_matches('\n')),
        };
        let _ = out.flush();
    }
}

pub fn print_game_info(info: &GameInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(info).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            println!("{}", info.description);
            if info.extensions.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "HEADER", "DESCRIPTION"]);
            for ext in &info.extensions {
                table.add_row(vec![
                    ext.name.clone(),
                    ext.header.clone(),
                    ext.description.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("description={}", info.description);
            for ext in &info.extensions {
                println!(
                    "extension name={} header={:?} description={}",
                    ext.name, ext.header, ext.description
                );
            }
        }
        OutputFormat::Raw => {
            println!("{}", info.description);
            for ext in &info.extensions {
                print!("{}:\n\t{}\n", ext.name, ext.description);
            }
        }
    }
}

pub fn print_commands(table: &CommandTable, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let specs: Vec<&CommandSpec> = table.iter().collect();
            println!(
                "{}",
                serde_json::to_string(&specs).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut out = Table::new();
            out.load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "HEADER", "ARGS", "DESCRIPTION"]);
            for spec in table.iter() {
                out.add_row(vec![
                    spec.name.clone(),
                    spec.header.clone(),
                    spec.params.to_string(),
                    spec.description.clone(),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            for spec in table.iter() {
                println!(
                    "{} args={} header={:?} {}",
                    spec.name, spec.params, spec.header, spec.description
                );
            }
        }
        OutputFormat::Raw => print!("{}", table.describe()),
    }
}

/// Session counters go to stderr so they never mix with game text.
pub fn print_summary(peer: &str, stats: SessionStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            eprintln!(
                "{}",
                serde_json::to_string(&SummaryOutput { peer, stats })
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Raw => {}
        _ => {
            eprintln!(
                "session with {peer} ended: received={} discarded={} skipped_bytes={} sent={} rejected={}",
                stats.frames_received,
                stats.frames_discarded,
                stats.bytes_skipped,
                stats.commands_sent,
                stats.commands_rejected
            );
        }
    }
}
