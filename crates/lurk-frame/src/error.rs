/// Errors that can occur while parsing Lurk frames.
///
/// Unknown header bytes are not errors; the parser skips them and reports the
/// count in [`ParseOutcome::skipped`](crate::ParseOutcome::skipped).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// An `INFOM` header was not followed by a decimal length.
    #[error("INFOM frame at offset {offset} has no length field")]
    MissingLength { offset: usize },

    /// The `INFOM` length field does not fit in a `usize`.
    #[error("INFOM frame at offset {offset} has an invalid length field: {digits}")]
    InvalidLength { offset: usize, digits: String },

    /// `continue_parse` was called with no partial frame pending.
    #[error("no partial frame pending")]
    ContinueWithoutPending,
}

pub type Result<T> = std::result::Result<T, FrameError>;
