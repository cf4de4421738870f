//! # Bus
//!
//! Channel registry. Routes published messages through a channel-level
//! dispatch queue whose handler fans each message out to every subscriber's
//! own dispatch queue.
//!
//! ## Locking
//!
//! One mutex serializes structural changes (creating a channel or a
//! subscriber). It is never held while enqueueing or while a handler runs;
//! queue-internal state belongs to each queue's dispatch loop.
//!
//! ## Ordering
//!
//! Fan-out runs on the channel's own dispatch loop, so every subscriber
//! receives messages in the order the channel accepted them. Each
//! subscriber's pause/retry state delays only that subscriber.

use crate::config::BusConfig;
use crate::error::{BusError, HandlerError};
use crate::group::ClientHandlerGroup;
use crate::handler::{Handler, HandlerId};
use crate::message::Message;
use crate::queue::{DispatchQueue, QueueHandle, QueueReport};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Channel-level handler: forward each message to every subscriber queue.
struct Fanout {
    channel: String,
    targets: Arc<RwLock<Vec<QueueHandle>>>,
}

#[async_trait]
impl Handler for Fanout {
    async fn deliver(&self, msg: &Message) -> Result<(), HandlerError> {
        let targets = self.targets.read().clone();

        for target in &targets {
            if target.enqueue(msg.clone()).await.is_err() {
                // Only happens while the bus shuts down.
                debug!(
                    channel = %self.channel,
                    queue = %target.label(),
                    "Subscriber queue closed, skipping"
                );
            }
        }

        Ok(())
    }
}

struct Subscriber {
    queue: DispatchQueue,
    group: Arc<ClientHandlerGroup>,
}

struct Channel {
    queue: DispatchQueue,
    targets: Arc<RwLock<Vec<QueueHandle>>>,
    subscribers: HashMap<String, Subscriber>,
}

impl Channel {
    fn open(name: &str, config: &BusConfig) -> Self {
        let targets = Arc::new(RwLock::new(Vec::new()));
        let fanout = Fanout {
            channel: name.to_string(),
            targets: Arc::clone(&targets),
        };
        let queue = DispatchQueue::spawn(format!("{}:{name}", config.name), Arc::new(fanout), config);

        Self {
            queue,
            targets,
            subscribers: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct Registry {
    closed: bool,
    channels: HashMap<String, Channel>,
}

impl Registry {
    fn channel(&mut self, name: &str, config: &BusConfig) -> Result<&mut Channel, BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }

        Ok(self.channels.entry(name.to_string()).or_insert_with(|| {
            debug!(bus = %config.name, channel = %name, "Channel created");
            Channel::open(name, config)
        }))
    }
}

/// Totals gathered by [`Bus::shutdown`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub channels: usize,
    pub subscribers: usize,
    /// Deliveries made by subscriber queues.
    pub delivered: u64,
    /// Messages left in subscriber retry-lists.
    pub retained: usize,
    /// Messages still queued for paused subscribers.
    pub unread: usize,
}

impl ShutdownReport {
    fn absorb(&mut self, report: QueueReport) {
        self.subscribers += 1;
        self.delivered += report.delivered;
        self.retained += report.retained;
        self.unread += report.unread;
    }
}

/// In-process publish/subscribe broker.
///
/// Constructed explicitly; there is no process-wide instance. All methods
/// that may create a channel or subscriber must run inside a tokio runtime.
pub struct Bus {
    config: BusConfig,
    registry: Mutex<Registry>,
}

impl Bus {
    /// Create a bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BusConfig::default(),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Create a bus with a validated configuration.
    pub fn with_config(config: BusConfig) -> Result<Self, BusError> {
        config.validate()?;
        Ok(Self {
            config,
            registry: Mutex::new(Registry::default()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Publish `msg` on `channel`, creating the channel if needed.
    ///
    /// Returns once the channel queue has accepted the message; fan-out
    /// happens asynchronously on the channel's dispatch loop.
    pub async fn publish(&self, channel: &str, msg: Message) -> Result<(), BusError> {
        let queue = {
            let mut registry = self.registry.lock();
            registry.channel(channel, &self.config)?.queue.handle()
        };

        queue.enqueue(msg).await
    }

    /// Register `handler` for `client` on `channel`.
    ///
    /// The first subscription of a (client, channel) pair creates its
    /// handler group and dispatch queue. Later ones append to the group and
    /// resume the queue, which un-sticks a client whose previous handlers
    /// all failed.
    pub fn subscribe(
        &self,
        client: &str,
        channel: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<HandlerId, BusError> {
        let (id, existing) = {
            let mut registry = self.registry.lock();
            let entry = registry.channel(channel, &self.config)?;

            if let Some(subscriber) = entry.subscribers.get(client) {
                (subscriber.group.push(handler), Some(subscriber.queue.handle()))
            } else {
                let group = Arc::new(ClientHandlerGroup::new(client, channel));
                let id = group.push(handler);
                let queue = DispatchQueue::spawn(
                    format!("{}:{channel}/{client}", self.config.name),
                    Arc::clone(&group) as Arc<dyn Handler>,
                    &self.config,
                );

                entry.targets.write().push(queue.handle());
                entry
                    .subscribers
                    .insert(client.to_string(), Subscriber { queue, group });

                debug!(bus = %self.config.name, client, channel, "Subscriber created");
                (id, None)
            }
        };

        if let Some(queue) = existing {
            queue.resume();
        }

        Ok(id)
    }

    /// Whether the (client, channel) queue is paused. `false` if unknown.
    #[must_use]
    pub fn is_paused(&self, client: &str, channel: &str) -> bool {
        self.registry
            .lock()
            .channels
            .get(channel)
            .and_then(|entry| entry.subscribers.get(client))
            .is_some_and(|subscriber| subscriber.queue.is_paused())
    }

    /// Live handlers for (client, channel); 0 if unknown.
    #[must_use]
    pub fn handler_count(&self, client: &str, channel: &str) -> usize {
        self.registry
            .lock()
            .channels
            .get(channel)
            .and_then(|entry| entry.subscribers.get(client))
            .map_or(0, |subscriber| subscriber.group.len())
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.registry.lock().channels.len()
    }

    /// Subscribed clients on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.registry
            .lock()
            .channels
            .get(channel)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Stop accepting work and drain.
    ///
    /// Each channel queue is drained first so every accepted publish reaches
    /// the subscriber queues; then each subscriber queue is closed. Running
    /// subscribers finish their backlog, paused ones stop immediately and
    /// their leftovers are counted in the report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let channels = {
            let mut registry = self.registry.lock();
            registry.closed = true;
            std::mem::take(&mut registry.channels)
        };

        let mut report = ShutdownReport::default();

        for (name, channel) in channels {
            let Channel {
                queue,
                targets,
                subscribers,
            } = channel;
            drop(targets);
            queue.shutdown().await;
            report.channels += 1;

            for (client, subscriber) in subscribers {
                let queue_report = subscriber.queue.shutdown().await;
                if queue_report.undelivered() > 0 {
                    warn!(
                        channel = %name,
                        client = %client,
                        retained = queue_report.retained,
                        unread = queue_report.unread,
                        "Subscriber shut down with undelivered messages"
                    );
                }
                report.absorb(queue_report);
            }
        }

        info!(
            bus = %self.config.name,
            channels = report.channels,
            subscribers = report.subscribers,
            delivered = report.delivered,
            undelivered = report.retained + report.unread,
            "Bus shut down"
        );

        report
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
