//! Storage Module
//!
//! The key-value table and the expiration machinery that sits beside it.
//!
//! ## Architecture
//!
//! ```text
//!   SET/GET/DEL/KEYS ──────────────► ┌───────────────────────┐
//!                                    │ Store                 │
//!                                    │ RwLock<HashMap>       │
//!                                    └───────────────────────┘
//!                                               ▲
//!                                               │ delete(key)
//!                                               │ (callback task)
//!   EXPIRE/TTL ─────► ┌─────────────────────────┴─────────────┐
//!                     │ TtlScheduler                          │
//!                     │  Mutex<TtlIndex>   (min-heap + map)   │
//!                     │  Notify            (wake signal)      │
//!                     │  worker task       (sleep_until)      │
//!                     └───────────────────────────────────────┘
//! ```
//!
//! The store and the scheduler are independent: the store knows nothing
//! about time, the scheduler knows nothing about values. The command layer
//! wires them together, and the deletion callback given to the scheduler
//! is what removes expired keys from the store.
//!
//! ## Example
//!
//! ```
//! use radish::storage::{TtlIndex, Store};
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let store = Store::new();
//! store.set("name", "Ariz");
//! assert_eq!(store.get("name").as_deref(), Some("Ariz"));
//!
//! let mut index = TtlIndex::new();
//! let now = Instant::now();
//! index.insert("b".to_string(), now + Duration::from_secs(2));
//! index.insert("a".to_string(), now + Duration::from_secs(1));
//! assert_eq!(index.peek().map(|e| e.key.as_str()), Some("a"));
//! ```

pub mod expiry;
pub mod index;
pub mod store;

pub use expiry::{ExpireCallback, ExpiryConfig, TtlError, TtlScheduler};
pub use index::{TimerEntry, TtlIndex};
pub use store::Store;
