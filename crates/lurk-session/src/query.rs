//! Setup query: ask the server for its game description and extensions.
//!
//! The client sends `QUERY`; the server answers with one frame (normally
//! `INFOM`) whose payload is a line-oriented `Key: value` listing:
//!
//! ```text
//! GameDescription:A test game
//! Extension: EXT1
//! NiceName: ext
//! Type: ACTON
//! Description: test
//! ```
//!
//! Each `Extension` group becomes a one-argument command once its
//! `Description` line arrives.

use lurk_frame::{Block, FrameParser, Header, ParseOutcome};
use lurk_transport::LurkStream;
use serde::Serialize;
use tracing::{debug, warn};

use crate::commands::CommandTable;
use crate::error::{Result, SessionError};

/// Setup query frame sent right after connecting.
pub const QUERY_FRAME: &str = "QUERY";

/// `Type` value marking an extension as an in-game action.
pub const ACTION_TYPE: &str = "ACTON";

/// Argument count every advertised extension is registered with.
pub const EXTENSION_PARAMS: usize = 1;

/// A server-advertised command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extension {
    /// Command name the user types.
    pub name: String,
    /// Protocol header, already prefixed with `ACTON ` for action extensions.
    pub header: String,
    pub description: String,
}

/// What the server told us about itself during setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameInfo {
    pub description: String,
    pub extensions: Vec<Extension>,
}

#[derive(Default)]
struct PendingExtension {
    protocol: String,
    name: String,
    action: bool,
}

impl GameInfo {
    /// Parse a QUERY response payload.
    ///
    /// Lines without a `:` and unknown keys are ignored. A group missing its
    /// `Extension` or `NiceName` line is dropped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut info = GameInfo::default();
        let mut group = PendingExtension::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "GameDescription" => info.description = value.to_string(),
                "Extension" => group.protocol = value.to_string(),
                "NiceName" => group.name = value.to_string(),
                "Type" => group.action = value == ACTION_TYPE,
                "Description" => {
                    let done = std::mem::take(&mut group);
                    if done.protocol.is_empty() || done.name.is_empty() {
                        warn!(
                            protocol = %done.protocol,
                            name = %done.name,
                            "ignoring incomplete extension"
                        );
                        continue;
                    }
                    let header = if done.action {
                        format!("{ACTION_TYPE} {}", done.protocol)
                    } else {
                        done.protocol
                    };
                    info.extensions.push(Extension {
                        name: done.name,
                        header,
                        description: value.to_string(),
                    });
                }
                other => debug!(key = other, "ignoring unknown query key"),
            }
        }

        info
    }

    /// Register every extension with `table`, skipping names already taken.
    ///
    /// Returns the number of extensions registered.
    pub fn register(&self, table: &mut CommandTable) -> usize {
        let mut added = 0;
        for ext in &self.extensions {
            match table.add_command(&ext.name, &ext.header, EXTENSION_PARAMS, &ext.description) {
                Ok(()) => {
                    debug!(name = %ext.name, header = %ext.header, "registered extension");
                    added += 1;
                }
                Err(err) => warn!(error = %err, "skipping server extension"),
            }
        }
        added
    }
}

/// Parse one delivery unit, receiving more bytes until no frame is pending.
///
/// Follow-up receives ask for exactly the missing byte count, capped at
/// `max_receive`, or for up to `max_receive` bytes while the pending frame's
/// length is still unknown.
pub(crate) fn read_delivery(
    stream: &mut LurkStream,
    parser: &mut FrameParser,
    chunk: &[u8],
    max_receive: usize,
) -> Result<ParseOutcome> {
    let mut outcome = parser.parse_data(chunk)?;
    let mut skipped = outcome.skipped;
    while !outcome.is_complete() {
        let want = if outcome.length_pending {
            max_receive
        } else {
            outcome.still_needed.min(max_receive)
        };
        let more = stream.receive(want)?;
        outcome = parser.continue_parse(&more)?;
        skipped += outcome.skipped;
    }
    outcome.skipped = skipped;
    Ok(outcome)
}

/// Send the query frame and collect the complete response.
///
/// Returns the block carrying the game listing (the first `INFOM`, or the
/// first block if there is none) and every other block of the response.
pub(crate) fn run_query(
    stream: &mut LurkStream,
    query_frame: &str,
    max_receive: usize,
) -> Result<(Block, Vec<Block>)> {
    stream.send(query_frame)?;
    let chunk = stream.receive(max_receive)?;

    let mut parser = FrameParser::new();
    let outcome = read_delivery(stream, &mut parser, &chunk, max_receive)?;
    let mut blocks = outcome.blocks;
    if blocks.is_empty() {
        return Err(SessionError::EmptyQueryResponse);
    }

    let at = blocks
        .iter()
        .position(|b| b.header == Header::Infom)
        .unwrap_or(0);
    let listing = blocks.remove(at);
    debug!(header = %listing.header, size = listing.payload.len(), "query response received");
    Ok((listing, blocks))
}
