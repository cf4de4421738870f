//! # Elastic Channel
//!
//! Bridges a producer handle to a consumer handle through an
//! [`ElasticBuffer`], so producers never wait on how fast the consumer
//! drains.
//!
//! ```text
//! ElasticSender ──(bounded, tiny)──→ bridge loop ──(reserve → send)──→ ElasticReceiver
//!                                        │
//!                                  ElasticBuffer
//! ```
//!
//! The bridge loop multiplexes over two events:
//!
//! 1. a message offered by a producer, which is always accepted and
//!    appended to the buffer tail;
//! 2. a free consumer slot, awaited only while the buffer is non-empty,
//!    which receives the buffer head.
//!
//! When every sender is dropped and the buffer is drained, the loop drops its
//! consumer-side sender, so [`ElasticReceiver::recv`] returns `None`.

use crate::buffer::ElasticBuffer;
use crate::config::BusConfig;
use crate::error::BusError;
use crate::message::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Factory for elastic producer/consumer pairs.
pub struct ElasticChannel;

impl ElasticChannel {
    /// Spawn a bridge loop and return both ends.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: &BusConfig) -> (ElasticSender, ElasticReceiver) {
        let (input_tx, input_rx) = mpsc::channel(config.producer_capacity.max(1));
        let (output_tx, output_rx) = mpsc::channel(config.consumer_capacity.max(1));
        let backlog = Arc::new(AtomicUsize::new(0));

        tokio::spawn(bridge(input_rx, output_tx, Arc::clone(&backlog)));

        (
            ElasticSender {
                tx: input_tx,
                backlog: Arc::clone(&backlog),
            },
            ElasticReceiver { rx: output_rx },
        )
    }
}

/// Producer-facing end. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ElasticSender {
    tx: mpsc::Sender<Message>,
    backlog: Arc<AtomicUsize>,
}

impl ElasticSender {
    /// Hand a message to the bridge loop.
    ///
    /// Returns as soon as the loop has accepted the message; the wait does
    /// not grow with the number of buffered messages.
    pub async fn send(&self, msg: Message) -> Result<(), BusError> {
        self.tx.send(msg).await.map_err(|_| BusError::Closed)
    }

    /// Messages accepted by the bridge loop but not yet handed to the consumer.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Relaxed)
    }

    /// Whether the bridge loop has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer-facing end.
#[derive(Debug)]
pub struct ElasticReceiver {
    rx: mpsc::Receiver<Message>,
}

impl ElasticReceiver {
    /// Receive the next message in FIFO order.
    ///
    /// Returns `None` once all senders are gone and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

async fn bridge(
    mut input: mpsc::Receiver<Message>,
    output: mpsc::Sender<Message>,
    backlog: Arc<AtomicUsize>,
) {
    let mut buffer = ElasticBuffer::new();
    let mut input_open = true;

    loop {
        if !input_open && buffer.is_empty() {
            break;
        }

        tokio::select! {
            received = input.recv(), if input_open => match received {
                Some(msg) => buffer.push_back(msg),
                None => input_open = false,
            },
            permit = output.reserve(), if !buffer.is_empty() => match permit {
                Ok(permit) => {
                    if let Some(msg) = buffer.pop_front() {
                        permit.send(msg);
                    }
                }
                Err(_) => {
                    debug!(dropped = buffer.len(), "Elastic consumer gone, bridge stopping");
                    break;
                }
            },
        }

        backlog.store(buffer.len(), Ordering::Relaxed);
    }

    backlog.store(0, Ordering::Relaxed);
}
