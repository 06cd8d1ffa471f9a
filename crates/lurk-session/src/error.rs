use crate::state::SessionState;

/// Errors from command table maintenance and command translation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A command with this name is already registered.
    #[error("command '{0}' is already registered")]
    DuplicateCommand(String),

    /// Command names must be a single non-empty word.
    #[error("invalid command name '{0}'")]
    InvalidName(String),

    /// The protocol header of a command must not be empty.
    #[error("command '{0}' has an empty protocol header")]
    EmptyHeader(String),

    /// The input line contained no command.
    #[error("empty command")]
    Empty,

    /// The first word of the input line is not a registered command.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The command was given fewer arguments than it requires.
    #[error("command '{name}' needs {required} argument(s), got {given}")]
    MissingArguments {
        name: String,
        required: usize,
        given: usize,
    },
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] lurk_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] lurk_frame::FrameError),

    /// Command table error.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// The server answered the setup query with no frames.
    #[error("server sent an empty QUERY response")]
    EmptyQueryResponse,

    /// The operation is not valid in the current session state.
    #[error("invalid session state: expected {expected}, found {found}")]
    InvalidState {
        expected: SessionState,
        found: SessionState,
    },

    /// The receive loop could not be started.
    #[error("failed to start receive loop: {0}")]
    Spawn(std::io::Error),

    /// The receive loop panicked.
    #[error("receive loop panicked")]
    ReceiverPanicked,
}

pub type Result<T> = std::result::Result<T, SessionError>;
