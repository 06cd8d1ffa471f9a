use std::borrow::Cow;

use bytes::Bytes;

use crate::header::Header;

/// One decoded server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The frame's header tag.
    pub header: Header,
    /// The frame body, without the tag and separator.
    pub payload: Bytes,
}

impl Block {
    /// Create a new block.
    pub fn new(header: Header, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// The payload as display text. Invalid UTF-8 is replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
