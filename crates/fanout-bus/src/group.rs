//! # Client Handler Group
//!
//! Ordered rotation of handlers for one (client, channel) pair.
//!
//! ## Rotation Rules
//!
//! - Delivery starts at the cursor.
//! - On success the cursor moves past the handler that was used, so
//!   consecutive messages round-robin across live handlers.
//! - On failure the handler is evicted for good and the same message is
//!   tried against the next one.
//! - If the list runs empty, delivery fails with
//!   [`HandlerError::NoHandlers`].
//!
//! The list only grows (new subscription) or shrinks (eviction); it is
//! never reordered.

use crate::error::HandlerError;
use crate::handler::{Handler, HandlerId};
use crate::message::Message;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

struct Rotation {
    handlers: Vec<(HandlerId, Arc<dyn Handler>)>,
    cursor: usize,
}

impl Rotation {
    fn current(&self) -> Option<(HandlerId, Arc<dyn Handler>)> {
        if self.handlers.is_empty() {
            return None;
        }
        let (id, handler) = &self.handlers[self.cursor % self.handlers.len()];
        Some((*id, Arc::clone(handler)))
    }

    fn position(&self, id: HandlerId) -> Option<usize> {
        self.handlers.iter().position(|(candidate, _)| *candidate == id)
    }
}

/// Load-balancing, self-healing set of handlers for one client on one channel.
pub struct ClientHandlerGroup {
    client: String,
    channel: String,
    rotation: Mutex<Rotation>,
}

impl ClientHandlerGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new(client: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            channel: channel.into(),
            rotation: Mutex::new(Rotation {
                handlers: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Append a handler at the end of the rotation.
    pub fn push(&self, handler: Arc<dyn Handler>) -> HandlerId {
        let id = HandlerId::next();
        let mut rotation = self.rotation.lock();
        rotation.handlers.push((id, handler));
        debug!(
            client = %self.client,
            channel = %self.channel,
            handler_id = %id,
            handlers = rotation.handlers.len(),
            "Handler added to group"
        );
        id
    }

    /// Number of live handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rotation.lock().handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is still part of the rotation.
    #[must_use]
    pub fn contains(&self, id: HandlerId) -> bool {
        self.rotation.lock().position(id).is_some()
    }

    #[must_use]
    pub fn client(&self) -> &str {
        &self.client
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Deliver `msg` to the next live handler, evicting failures on the way.
    ///
    /// The lock is released while a handler runs, so `push` never waits on a
    /// slow delivery.
    pub async fn handle(&self, msg: &Message) -> Result<(), HandlerError> {
        loop {
            let current = self.rotation.lock().current();
            let Some((id, handler)) = current else {
                warn!(
                    client = %self.client,
                    channel = %self.channel,
                    "No handlers left in group"
                );
                return Err(HandlerError::NoHandlers {
                    client: self.client.clone(),
                    channel: self.channel.clone(),
                });
            };

            match handler.deliver(msg).await {
                Ok(()) => {
                    let mut rotation = self.rotation.lock();
                    if let Some(pos) = rotation.position(id) {
                        rotation.cursor = pos + 1;
                    }
                    return Ok(());
                }
                Err(error) => {
                    let mut rotation = self.rotation.lock();
                    if let Some(pos) = rotation.position(id) {
                        rotation.handlers.remove(pos);
                        // The next handler slid into `pos`; reads wrap with `%`.
                        rotation.cursor = pos;
                    }
                    warn!(
                        client = %self.client,
                        channel = %self.channel,
                        handler_id = %id,
                        remaining = rotation.handlers.len(),
                        error = %error,
                        "Handler failed, evicted from group"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl Handler for ClientHandlerGroup {
    async fn deliver(&self, msg: &Message) -> Result<(), HandlerError> {
        self.handle(msg).await
    }
}
