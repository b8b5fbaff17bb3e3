//! # Radish - An In-Memory Key-Value Server with Key Expiration
//!
//! Radish speaks a subset of the Redis wire protocol (RESP2) over TCP and
//! keeps string keys and values in memory. Keys can be given a time-to-live;
//! a single background task deletes them when it runs out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Radish                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (serve)     │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──┬───────┬──┘                  │
//! │                            │              │       │                     │
//! │                            ▼              ▼       ▼                     │
//! │                     ┌─────────────┐  ┌───────┐ ┌──────────────────────┐ │
//! │                     │ RESP codec  │  │ Store │ │ TtlScheduler         │ │
//! │                     └─────────────┘  └───▲───┘ │  min-heap + worker   │ │
//! │                                          │     └──────────┬───────────┘ │
//! │                                          └── delete(key) ─┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use radish::commands::CommandHandler;
//! use radish::connection::ConnectionStats;
//! use radish::storage::{ExpiryConfig, Store, TtlScheduler};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let cancel = CancellationToken::new();
//!     let store = Arc::new(Store::new());
//!
//!     let ttl = TtlScheduler::start(&cancel, ExpiryConfig::default(), {
//!         let store = Arc::clone(&store);
//!         move |key: String| {
//!             store.delete(&key);
//!         }
//!     });
//!
//!     let handler = CommandHandler::new(store, Arc::new(ttl));
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6380").await?;
//!
//!     radish::server::serve(listener, handler, stats, cancel).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value`, `GET key`, `DEL key`, `KEYS pattern`
//! - `EXPIRE key seconds`, `TTL key`
//! - `FLUSHALL`, `PING`, `COMMAND`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP request decoder and reply encoders
//! - [`storage`]: the key-value store and the TTL scheduler
//! - [`commands`]: the command dispatcher
//! - [`connection`]: per-client read/execute/reply loop
//! - [`server`]: the accept loop
//! - [`config`]: command-line configuration
//!
//! ## Expiration
//!
//! Expiration is active only: there is no check on access. Pending TTLs sit
//! in a min-heap ordered by deadline; the worker sleeps until the earliest
//! one and is woken early whenever a new TTL is set. Deleting the key from
//! the store happens on a separate task after its TTL entry is removed, so
//! for a brief moment an expired key can still be read.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, CommandParser, ParseError, RespValue};
pub use storage::{ExpiryConfig, Store, TtlError, TtlScheduler};

/// The default port Radish listens on
pub const DEFAULT_PORT: u16 = 6380;

/// The default host Radish binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of Radish
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
