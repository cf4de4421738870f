//! Error types for the fanout bus.

use thiserror::Error;

/// Why a delivery attempt failed.
///
/// Any variant returned from a [`Handler`](crate::Handler) makes the owning
/// dispatch queue retain the message and pause.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Writing to the handler's sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The handler's peer is gone.
    #[error("Handler disconnected")]
    Disconnected,

    /// The handler refused the message.
    #[error("Handler rejected message: {0}")]
    Rejected(String),

    /// Every handler of a client handler group has been evicted.
    #[error("No handlers available for client {client} on channel {channel}")]
    NoHandlers { client: String, channel: String },
}

/// Errors surfaced by the bus and its queues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus or queue no longer accepts messages.
    #[error("Bus closed")]
    Closed,

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
