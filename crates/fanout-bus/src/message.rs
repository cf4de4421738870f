//! # Message
//!
//! Immutable payload wrapper. Cloning a [`Message`] shares the payload;
//! two messages are the "same" only if they share it.

use std::fmt;
use std::sync::Arc;

/// An opaque, immutable byte payload.
#[derive(Clone)]
pub struct Message {
    data: Arc<[u8]>,
}

impl Message {
    /// Create a message from raw bytes.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Arc::from(data.into()),
        }
    }

    /// Create a message from text.
    #[must_use]
    pub fn text(data: &str) -> Self {
        Self::new(data.as_bytes())
    }

    /// The payload, unchanged.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The payload as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether both handles refer to the same published message.
    #[must_use]
    pub fn same_as(&self, other: &Message) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("len", &self.data.len())
            .field("data", &String::from_utf8_lossy(&self.data))
            .finish()
    }
}

impl From<&str> for Message {
    fn from(data: &str) -> Self {
        Self::text(data)
    }
}

impl From<String> for Message {
    fn from(data: String) -> Self {
        Self::new(data.into_bytes())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Message {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}
