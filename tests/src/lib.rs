//! # Fanout Test Suite
//!
//! Cross-crate tests for the fanout broker.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── support.rs            # Recording/failing handlers, polling helpers
//! │   └── integration/
//! │       ├── delivery.rs       # Fan-out, rotation, eviction, recovery
//! │       ├── properties.rs     # FIFO, isolation, randomized failure storms
//! │       └── transport.rs      # Same scenarios over the TCP line protocol
//! └── benches/
//!     └── bus_benchmarks.rs     # Enqueue latency under backlog, fan-out cost
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fanout-tests
//! cargo test -p fanout-tests integration::properties::
//! cargo bench -p fanout-tests
//! ```

#![allow(dead_code)]

pub mod support;
