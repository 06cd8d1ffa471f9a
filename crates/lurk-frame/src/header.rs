//! Server-to-client header tags.
//!
//! Every server frame begins with one of six fixed 5-byte ASCII tags.

use std::fmt;

/// Length of every header tag in bytes.
pub const HEADER_LEN: usize = 5;

/// A server header tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Header {
    /// Chat or game text; the payload runs to the end of the delivery unit.
    Messg,
    /// The last client command was accepted.
    Acept,
    /// The last client command was rejected.
    Rejec,
    /// Result of a game action.
    Reslt,
    /// Length-prefixed information block.
    Infom,
    /// Server notification.
    Notif,
}

/// All header tags in wire order.
pub const HEADERS: [Header; 6] = [
    Header::Messg,
    Header::Acept,
    Header::Rejec,
    Header::Reslt,
    Header::Infom,
    Header::Notif,
];

impl Header {
    /// The 5-byte wire tag.
    pub const fn tag(self) -> &'static [u8; HEADER_LEN] {
        match self {
            Header::Messg => b"MESSG",
            Header::Acept => b"ACEPT",
            Header::Rejec => b"REJEC",
            Header::Reslt => b"RESLT",
            Header::Infom => b"INFOM",
            Header::Notif => b"NOTIF",
        }
    }

    /// The wire tag as a string slice.
    pub const fn as_str(self) -> &'static str {
        match self {
            Header::Messg => "MESSG",
            Header::Acept => "ACEPT",
            Header::Rejec => "REJEC",
            Header::Reslt => "RESLT",
            Header::Infom => "INFOM",
            Header::Notif => "NOTIF",
        }
    }

    /// Match exactly [`HEADER_LEN`] bytes against the known tags.
    pub fn from_tag(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HEADER_LEN {
            return None;
        }
        HEADERS.into_iter().find(|header| header.tag() == bytes)
    }

    /// Returns true if `run` starts with a known tag.
    pub fn starts(run: &[u8]) -> bool {
        run.len() >= HEADER_LEN && Self::from_tag(&run[..HEADER_LEN]).is_some()
    }

    /// Returns true if `run` ends with a known tag.
    pub fn ends(run: &[u8]) -> bool {
        run.len() >= HEADER_LEN && Self::from_tag(&run[run.len() - HEADER_LEN..]).is_some()
    }

    /// Returns true if `bytes` is a non-empty proper prefix of this tag.
    pub fn is_cut(self, bytes: &[u8]) -> bool {
        !bytes.is_empty() && bytes.len() < HEADER_LEN && self.tag().starts_with(bytes)
    }

    /// Returns true if `bytes` is a non-empty proper prefix of any known tag.
    pub fn any_cut(bytes: &[u8]) -> bool {
        HEADERS.into_iter().any(|header| header.is_cut(bytes))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
