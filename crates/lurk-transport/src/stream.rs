use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Default upper bound for a single receive call: 1 MiB.
pub const DEFAULT_MAX_RECEIVE: usize = 1024 * 1024;

/// A connected Lurk stream over TCP.
///
/// Clones made with [`LurkStream::try_clone`] share the same socket and the
/// same shutdown flag, so a receive loop can own one half while the
/// foreground keeps the other.
pub struct LurkStream {
    inner: TcpStream,
    peer: String,
    shut_down: Arc<AtomicBool>,
    scratch: Vec<u8>,
}

impl LurkStream {
    /// Connect to a Lurk server (blocking).
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_timeout(host, port, None)
    }

    /// Connect to a Lurk server, bounding each address attempt by `timeout`.
    ///
    /// Every resolved address is tried in order; the last failure is reported.
    pub fn connect_with_timeout(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(TransportError::InvalidAddress {
                host: host.to_string(),
                port,
                reason: "hostname must not be empty",
            });
        }
        if port == 0 {
            return Err(TransportError::InvalidAddress {
                host: host.to_string(),
                port,
                reason: "port must be non-zero",
            });
        }

        let addr = format!("{host}:{port}");
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let mut last_err = None;
        for candidate in candidates {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, resolved = %candidate, "connected to lurk server");
                    return Ok(Self::from_tcp(stream, addr));
                }
                Err(err) => {
                    debug!(%addr, resolved = %candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(ErrorKind::NotFound, "hostname resolved to no addresses")
            }),
        })
    }

    /// Wrap an already-connected TCP stream.
    pub fn from_tcp(stream: TcpStream, peer: impl Into<String>) -> Self {
        Self {
            inner: stream,
            peer: peer.into(),
            shut_down: Arc::new(AtomicBool::new(false)),
            scratch: Vec::new(),
        }
    }

    /// Send protocol text, returning the number of bytes written.
    pub fn send(&mut self, text: &str) -> Result<usize> {
        self.ensure_open()?;
        let bytes = text.as_bytes();

        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.classify(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.classify(err)),
            }
        }

        debug!(peer = %self.peer, bytes = offset, "sent");
        Ok(offset)
    }

    /// Receive whatever is currently available, up to `max` bytes (blocking).
    ///
    /// Returns `Err(TransportError::Closed)` when the peer closed the
    /// connection and `Err(TransportError::Shutdown)` once [`shutdown`] was
    /// called on this stream or any of its clones.
    ///
    /// [`shutdown`]: LurkStream::shutdown
    pub fn receive(&mut self, max: usize) -> Result<Bytes> {
        self.ensure_open()?;
        if max == 0 {
            return Ok(Bytes::new());
        }
        if self.scratch.len() < max {
            self.scratch.resize(max, 0);
        }

        loop {
            match self.inner.read(&mut self.scratch[..max]) {
                Ok(0) => {
                    return Err(if self.is_shut_down() {
                        TransportError::Shutdown
                    } else {
                        TransportError::Closed
                    });
                }
                Ok(n) => {
                    debug!(peer = %self.peer, bytes = n, "received");
                    return Ok(Bytes::copy_from_slice(&self.scratch[..n]));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.classify(err)),
            }
        }
    }

    /// Shut down both directions of the connection. Idempotent.
    ///
    /// A receive blocked on another clone returns promptly afterwards.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotConnected => {}
            Err(err) => return Err(TransportError::Io(err)),
        }
        debug!(peer = %self.peer, "transport shut down");
        Ok(())
    }

    /// Whether [`LurkStream::shutdown`] has been called on this stream or a clone.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Try to clone this stream (creates a new socket handle).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_clone()?,
            peer: self.peer.clone(),
            shut_down: Arc::clone(&self.shut_down),
            scratch: Vec::new(),
        })
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// The `host:port` this stream was connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(TransportError::Shutdown);
        }
        Ok(())
    }

    fn classify(&self, err: std::io::Error) -> TransportError {
        if self.is_shut_down() {
            return TransportError::Shutdown;
        }
        match err.kind() {
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                TransportError::Closed
            }
            _ => TransportError::Io(err),
        }
    }
}

impl std::fmt::Debug for LurkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LurkStream")
            .field("peer", &self.peer)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn send_and_receive_over_loopback() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"QUERY");
            stream.write_all(b"ACEPT ok").unwrap();
        });

        let mut client = LurkStream::connect("127.0.0.1", port).unwrap();
        assert_eq!(client.send("QUERY").unwrap(), 5);

        let mut got = Vec::new();
        while got.len() < 8 {
            got.extend_from_slice(&client.receive(DEFAULT_MAX_RECEIVE).unwrap());
        }
        assert_eq!(got, b"ACEPT ok");

        server.join().unwrap();
    }

    #[test]
    fn receive_respects_upper_bound() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"INFOM 10abcdefghij").unwrap();
        });

        let mut client = LurkStream::connect("127.0.0.1", port).unwrap();
        server.join().unwrap();

        let first = client.receive(4).unwrap();
        assert!(first.len() <= 4);
        assert!(!first.is_empty());
    }

    #[test]
    fn empty_host_is_rejected() {
        let err = LurkStream::connect("  ", 5000).unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { .. }));
    }

    #[test]
    fn zero_port_is_rejected() {
        let err = LurkStream::connect("127.0.0.1", 0).unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { port: 0, .. }));
    }

    #[test]
    fn refused_connection_reports_connect_error() {
        let (listener, port) = listener();
        drop(listener);

        let err = LurkStream::connect("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn peer_close_is_reported() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = LurkStream::connect("127.0.0.1", port).unwrap();
        server.join().unwrap();

        let err = client.receive(64).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn shutdown_is_idempotent_and_unblocks_clone() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink);
        });

        let client = LurkStream::connect("127.0.0.1", port).unwrap();
        let mut reader = client.try_clone().unwrap();
        let blocked = thread::spawn(move || reader.receive(64));

        client.shutdown().unwrap();
        client.shutdown().unwrap();
        assert!(client.is_shut_down());

        let result = blocked.join().unwrap();
        assert!(matches!(result, Err(TransportError::Shutdown)));
        server.join().unwrap();
    }

    #[test]
    fn send_after_shutdown_fails() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let _ = listener.accept().unwrap();
        });

        let mut client = LurkStream::connect("127.0.0.1", port).unwrap();
        server.join().unwrap();
        client.shutdown().unwrap();

        assert!(matches!(
            client.send("LEAVE"),
            Err(TransportError::Shutdown)
        ));
    }
}
