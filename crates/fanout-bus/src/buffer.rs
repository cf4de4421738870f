//! # Elastic Buffer
//!
//! Unbounded FIFO store backing an [`ElasticChannel`](crate::ElasticChannel).
//! Owned and mutated by exactly one adapter loop, so it carries no locking.

use crate::message::Message;
use std::collections::VecDeque;

/// Unbounded FIFO of messages with O(1) push-back and pop-front.
#[derive(Debug, Default)]
pub struct ElasticBuffer {
    items: VecDeque<Message>,
}

impl ElasticBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail.
    pub fn push_back(&mut self, msg: Message) {
        self.items.push_back(msg);
    }

    /// Remove and return the head.
    pub fn pop_front(&mut self) -> Option<Message> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
