//! Bus configuration and validation.
//!
//! # Example
//!
//! ```
//! use fanout_bus::BusConfig;
//!
//! let config = BusConfig::default()
//!     .with_name("orders")
//!     .with_producer_capacity(4);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::BusError;
use crate::{DEFAULT_CONSUMER_CAPACITY, DEFAULT_PRODUCER_CAPACITY};
use serde::{Deserialize, Serialize};

/// Tuning knobs shared by every queue a [`Bus`](crate::Bus) spawns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Name used as a log field.
    pub name: String,
    /// Producer-side handoff slots of each elastic channel.
    pub producer_capacity: usize,
    /// Consumer-side handoff slots of each elastic channel.
    pub consumer_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "fanout".to_string(),
            producer_capacity: DEFAULT_PRODUCER_CAPACITY,
            consumer_capacity: DEFAULT_CONSUMER_CAPACITY,
        }
    }
}

impl BusConfig {
    /// Reject values tokio channels cannot be built with.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.producer_capacity == 0 {
            return Err(BusError::InvalidConfig(
                "producer_capacity cannot be 0".to_string(),
            ));
        }

        if self.consumer_capacity == 0 {
            return Err(BusError::InvalidConfig(
                "consumer_capacity cannot be 0".to_string(),
            ));
        }

        if self.name.trim().is_empty() {
            return Err(BusError::InvalidConfig("name cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Builder-style method to set the bus name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder-style method to set producer-side capacity
    pub fn with_producer_capacity(mut self, capacity: usize) -> Self {
        self.producer_capacity = capacity;
        self
    }

    /// Builder-style method to set consumer-side capacity
    pub fn with_consumer_capacity(mut self, capacity: usize) -> Self {
        self.consumer_capacity = capacity;
        self
    }
}
