use lurk_transport::LurkStream;

use crate::error::Result;
use crate::session::{Session, SessionConfig};

/// Connect to a Lurk server with default configuration.
pub fn connect(host: &str, port: u16) -> Result<Session> {
    connect_with_config(host, port, SessionConfig::default())
}

/// Connect with explicit configuration.
///
/// The returned session has not sent its setup query yet.
pub fn connect_with_config(host: &str, port: u16, config: SessionConfig) -> Result<Session> {
    let stream = LurkStream::connect_with_timeout(host, port, config.connect_timeout)?;
    Ok(Session::new(stream, config))
}
