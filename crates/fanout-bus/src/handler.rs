//! # Handlers
//!
//! A handler is a single capability: attempt delivery of one message and
//! report success or failure. Everything that consumes messages, from a
//! socket writer to a client handler group to the channel fan-out, plugs
//! into a dispatch queue through this trait.

use crate::error::HandlerError;
use crate::message::Message;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Attempt delivery of a message.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Deliver `msg`. An error means the message was not delivered.
    async fn deliver(&self, msg: &Message) -> Result<(), HandlerError>;
}

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Handler backed by a synchronous closure.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync,
{
    async fn deliver(&self, msg: &Message) -> Result<(), HandlerError> {
        (self.0)(msg)
    }
}

/// Handler backed by an async closure that takes the message by value.
pub struct AsyncFnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for AsyncFnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn deliver(&self, msg: &Message) -> Result<(), HandlerError> {
        (self.0)(msg.clone()).await
    }
}

/// Wrap a synchronous closure as a shareable handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Wrap an async closure as a shareable handler.
pub fn async_handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(AsyncFnHandler(f))
}
