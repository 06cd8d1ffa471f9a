//! Client for Lurk text game servers.
//!
//! # Crate Structure
//!
//! - [`transport`]: Blocking TCP transport
//! - [`frame`]: Incremental header-driven frame parser
//! - [`session`]: Setup query, command translation and the session loops
//!
//! The `lurk` terminal client is built with the `cli` feature.

/// Re-export transport types.
pub mod transport {
    pub use lurk_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use lurk_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use lurk_session::*;
}
