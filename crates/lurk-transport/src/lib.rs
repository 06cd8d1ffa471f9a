//! Blocking TCP transport for the Lurk text protocol.
//!
//! This is the lowest layer of the client. It owns the socket and exposes
//! byte-level send/receive; it knows nothing about frame boundaries. A
//! receive returns whatever the kernel has buffered, so callers must never
//! assume one receive equals one frame.

pub mod error;
pub mod stream;

pub use error::{Result, TransportError};
pub use stream::{LurkStream, DEFAULT_MAX_RECEIVE};
