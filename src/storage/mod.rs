//! Cache engine, expiry and snapshot persistence

mod engine;
mod entry;
mod pattern;
mod schedule;
mod snapshot;
mod sweeper;

pub use engine::{CacheEngine, CacheInfo, SweepOutcome, TTL_MISSING, TTL_PERSISTENT};
pub use entry::{Entry, current_millis};
pub use pattern::GlobPattern;
pub use schedule::{ExpiryRecord, ExpirySchedule};
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};
pub use sweeper::{ExpirySweeper, SweeperConfig, SweeperThread};
