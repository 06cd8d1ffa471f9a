/// Errors that can occur in Lurk transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host/port pair was rejected before any connection attempt.
    #[error("invalid address {host}:{port}: {reason}")]
    InvalidAddress {
        host: String,
        port: u16,
        reason: &'static str,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// The transport has been shut down locally.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
