//! # Fanout Bus - In-Process Publish/Subscribe Broker
//!
//! Publishers push messages onto named channels; subscribers register
//! per-client handlers. The bus fans every message out to each subscriber
//! while isolating slow or failing subscribers from each other.
//!
//! ## Delivery Path
//!
//! ```text
//! publish(channel, msg)
//!        │
//!        ▼
//! ┌────────────────────┐   enqueue    ┌──────────────────────┐
//! │ Bus (registry)     │ ───────────→ │ channel DispatchQueue│
//! └────────────────────┘              │  (ElasticChannel)    │
//!                                     └──────────┬───────────┘
//!                                                │ fan-out
//!                  ┌─────────────────────────────┼─────────────────────┐
//!                  ▼                             ▼                     ▼
//!        ┌──────────────────┐          ┌──────────────────┐          ...
//!        │ client A queue   │          │ client B queue   │
//!        │ (pause / retry)  │          │ (pause / retry)  │
//!        └────────┬─────────┘          └────────┬─────────┘
//!                 ▼                             ▼
//!        ClientHandlerGroup             ClientHandlerGroup
//!        (rotation + eviction)          (rotation + eviction)
//! ```
//!
//! ## Guarantees
//!
//! - **Producers never stall on backlog:** every queue sits behind an
//!   [`ElasticChannel`] that accepts messages regardless of consumer speed.
//! - **Per-subscriber FIFO:** each client sees messages in publish order,
//!   replayed failures always first.
//! - **No silent loss:** a failed message is retained and the subscriber's
//!   queue pauses until a new handler arrives.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod buffer;
pub mod bus;
pub mod config;
pub mod elastic;
pub mod error;
pub mod group;
pub mod handler;
pub mod message;
pub mod queue;

// Re-export main types
pub use buffer::ElasticBuffer;
pub use bus::{Bus, ShutdownReport};
pub use config::BusConfig;
pub use elastic::{ElasticChannel, ElasticReceiver, ElasticSender};
pub use error::{BusError, HandlerError};
pub use group::ClientHandlerGroup;
pub use handler::{async_handler_fn, handler_fn, Handler, HandlerId};
pub use message::Message;
pub use queue::{DispatchQueue, QueueHandle, QueueReport};

/// Default number of producer-side handoff slots per elastic channel.
///
/// The adapter loop accepts every offered message immediately, so one slot
/// is enough to keep `enqueue` latency independent of backlog depth.
pub const DEFAULT_PRODUCER_CAPACITY: usize = 1;

/// Default number of consumer-side handoff slots per elastic channel.
pub const DEFAULT_CONSUMER_CAPACITY: usize = 1;
