//! # Fanout Server
//!
//! Line-oriented TCP front end for [`fanout_bus::Bus`].
//!
//! ## Protocol
//!
//! ```text
//! client → server   PUB <channel> <payload>
//! client → server   SUB <client> <channel>
//! server → client   DATA <payload>
//! server → client   ERROR <reason>
//! ```
//!
//! Several connections may `SUB` with the same client id; the bus then
//! round-robins that client's messages across them and drops connections
//! whose writes fail.

pub mod config;
pub mod protocol;
pub mod server;

pub use config::ServerConfig;
pub use protocol::{parse_line, Command, CommandError};
pub use server::{Connection, Server};
