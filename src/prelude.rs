//! Prelude module for common imports.
//!
//! ```ignore
//! use ferrocache::prelude::*;
//! ```

// Error types
pub use crate::error::{CacheError, ProtocolError, Result, StorageError};

// Configuration
pub use crate::config::{Config, MetricsConfig, ServerConfig, StorageConfig};

// Storage
pub use crate::storage::{CacheEngine, CacheInfo, Entry, ExpirySweeper, SweeperConfig};

// Protocol
pub use crate::protocol::{Command, ParseResult, ResponseWriter};

// Metrics
pub use crate::metrics::Metrics;

// Server
pub use crate::server::Server;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
