//! Incremental header-driven frame parser for the Lurk text protocol.
//!
//! The Lurk wire format has no transport-level length envelope. Every frame
//! starts with a fixed 5-byte header tag and its extent is decided by the tag:
//! - `INFOM <len><payload>` carries an explicit decimal byte count
//! - `MESSG <payload>` runs to the end of the delivery unit
//! - every other tag runs until the next embedded header tag or end of input
//!
//! A single socket read may end anywhere inside an `INFOM` frame, even in its
//! tag or length digits, so the parser keeps its state across calls and
//! reports how many bytes it still needs.

pub mod block;
pub mod error;
pub mod header;
pub mod parser;

pub use block::Block;
pub use error::{FrameError, Result};
pub use header::{Header, HEADERS, HEADER_LEN};
pub use parser::{FrameParser, ParseOutcome};
