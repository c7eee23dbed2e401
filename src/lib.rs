//! # FerroCache
//!
//! In-memory key-value cache served over a line-oriented TCP protocol.
//!
//! ## Features
//!
//! - Text protocol: SET (with `EX`), GET, MSET, MGET, DEL, EXISTS, TTL,
//!   INCR, DECR, KEYS (glob patterns), SAVE, INFO, FLUSHALL, QUIT
//! - Optional key limit with least-recently-used eviction
//! - Lazy expiry on access plus a background sweeper driven by a min-heap
//!   of expiry deadlines
//! - Crash-safe snapshots (temp file, fsync, rename) loaded at startup
//! - Prometheus metrics endpoint
//! - Health check endpoints for load balancer integration
//!
//! ## Example
//!
//! ```ignore
//! use ferrocache::storage::CacheEngine;
//! use std::time::Duration;
//!
//! let engine = CacheEngine::new();
//! engine.set("session", "abc", Some(Duration::from_secs(30)));
//! assert_eq!(engine.get("session").as_deref(), Some("abc"));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌──────────────────────────────────────────────┐
//! │  client  │───▶│ server ─▶ protocol ─▶ CacheEngine            │
//! │ (telnet, │    │                        ├─ entries (LRU map)  │
//! │  nc, …)  │    │                        ├─ expiry min-heap    │
//! └──────────┘    │   ExpirySweeper ──────▶│                     │
//!                 │   SAVE / startup ─────▶└─ snapshot file      │
//!                 └──────────────────────────────────────────────┘
//! ```

// Modules
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod prelude;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-exports for convenience
pub use error::{CacheError, ProtocolError, Result, StorageError};

/// Default address the server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port the server listens on
pub const DEFAULT_PORT: u16 = 6379;

/// Default snapshot file name
pub const DEFAULT_SNAPSHOT_FILE: &str = "dump.rdb";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
