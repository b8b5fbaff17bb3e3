//! Command Handler Module
//!
//! The command processing layer: receives decoded commands, executes them
//! against the store and the TTL scheduler, and returns replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandParser   │  (protocol module)
//! └────────┬────────┘
//!          │ Command
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └───┬─────────┬───┘
//!     │         │
//!     ▼         ▼
//!  Store    TtlScheduler   (storage module)
//! ```
//!
//! ## Supported Commands
//!
//! - Keys: `SET`, `GET`, `DEL`, `KEYS`
//! - Expiration: `EXPIRE`, `TTL`
//! - Server: `FLUSHALL`, `PING`, `COMMAND`

pub mod handler;

pub use handler::CommandHandler;
