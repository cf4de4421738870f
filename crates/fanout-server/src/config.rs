//! Server configuration from command-line arguments and environment.

use crate::protocol::MAX_LINE_LENGTH;
use clap::Parser;
use fanout_bus::{BusConfig, DEFAULT_CONSUMER_CAPACITY, DEFAULT_PRODUCER_CAPACITY};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 7070;

/// Fanout Server: publish/subscribe over newline-delimited TCP commands
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "fanout-server")]
#[command(about = "In-process pub/sub broker with a line-oriented TCP front end")]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(env = "FANOUT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "FANOUT_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Name used in bus log fields
    #[arg(long, env = "FANOUT_BUS_NAME", default_value = "fanout")]
    pub bus_name: String,

    /// Producer-side handoff slots per queue
    #[arg(long, env = "FANOUT_PRODUCER_CAPACITY", default_value_t = DEFAULT_PRODUCER_CAPACITY)]
    pub producer_capacity: usize,

    /// Consumer-side handoff slots per queue
    #[arg(long, env = "FANOUT_CONSUMER_CAPACITY", default_value_t = DEFAULT_CONSUMER_CAPACITY)]
    pub consumer_capacity: usize,

    /// Seconds to wait for subscriber queues to drain on shutdown
    #[arg(long, env = "FANOUT_SHUTDOWN_GRACE", default_value_t = 5)]
    pub shutdown_grace: u64,

    /// Longest accepted command line in bytes
    #[arg(long, env = "FANOUT_MAX_LINE_LENGTH", default_value_t = MAX_LINE_LENGTH)]
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bus_name: "fanout".to_string(),
            producer_capacity: DEFAULT_PRODUCER_CAPACITY,
            consumer_capacity: DEFAULT_CONSUMER_CAPACITY,
            shutdown_grace: 5,
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    #[must_use]
    pub fn bus_config(&self) -> BusConfig {
        BusConfig::default()
            .with_name(self.bus_name.clone())
            .with_producer_capacity(self.producer_capacity)
            .with_consumer_capacity(self.consumer_capacity)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}
