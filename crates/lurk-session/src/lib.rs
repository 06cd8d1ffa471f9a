//! Lurk protocol session engine.
//!
//! Opens a connection, runs the `QUERY` setup exchange, translates user
//! commands to protocol frames and moves server text to the display side.
//! A running session has two loops: the dispatch loop on the caller's thread
//! and a receive loop on a background thread. They share one lock-protected
//! state bundle reached through [`SessionHandle`].

pub mod commands;
pub mod connector;
pub mod error;
pub mod query;
mod receiver;
pub mod session;
pub mod state;

pub use commands::{CommandSpec, CommandTable, BUILTIN_COMMANDS};
pub use connector::{connect, connect_with_config};
pub use error::{CommandError, Result, SessionError};
pub use query::{Extension, GameInfo, ACTION_TYPE, EXTENSION_PARAMS, QUERY_FRAME};
pub use session::{Session, SessionConfig, HELP_HINT, LIST_COMMANDS, SETUP_COMMANDS};
pub use state::{DisplaySink, SessionHandle, SessionState, SessionStats};
