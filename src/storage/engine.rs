//! In-memory cache engine
//!
//! All state lives behind a single mutex: the entry map and the expiration
//! schedule change together, so every command, the background sweeper and
//! SAVE/LOAD serialize on the same lock. The lock is never held across I/O
//! waits on a connection, which keeps it usable from plain OS threads and
//! from tokio tasks alike.
//!
//! Expiry is enforced two ways:
//! - **Lazy**: every read or write first drains due records from the schedule.
//! - **Proactive**: [`ExpirySweeper`](crate::storage::ExpirySweeper) calls
//!   [`CacheEngine::sweep`] in the background.
//!
//! With a key limit the entry map is an LRU: reads and writes refresh a key,
//! and inserting past the limit evicts the least recently used key.

use crate::StorageError;
use crate::storage::entry::{Entry, current_millis};
use crate::storage::pattern::GlobPattern;
use crate::storage::schedule::{ExpiryRecord, ExpirySchedule};
use crate::storage::snapshot::{self, SNAPSHOT_VERSION, Snapshot};
use lru::LruCache;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Reply value of TTL for a missing key
pub const TTL_MISSING: i64 = -2;

/// Reply value of TTL for a key without expiry
pub const TTL_PERSISTENT: i64 = -1;

/// Figures reported by INFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    /// Live keys
    pub keys: usize,
    /// Sum of key and value lengths (an estimate, not allocator accounting)
    pub memory_usage: usize,
    /// Time since the engine was created
    pub uptime: Duration,
    /// Keys removed by lazy or proactive expiry
    pub expired_keys: u64,
    /// Key limit, 0 when unbounded
    pub max_keys: usize,
    /// Keys dropped to stay under the key limit
    pub evicted_keys: u64,
}

/// Result of one proactive drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Entries removed by this drain
    pub removed: usize,
    /// Earliest remaining scheduled expiry (Unix milliseconds)
    pub next_deadline: Option<u64>,
}

struct State {
    entries: LruCache<String, Entry>,
    schedule: ExpirySchedule,
}

impl State {
    fn new(max_keys: Option<NonZeroUsize>) -> Self {
        Self {
            entries: max_keys.map_or_else(LruCache::unbounded, LruCache::new),
            schedule: ExpirySchedule::new(),
        }
    }

    /// Pop every due record and delete the entries they still describe.
    ///
    /// A record is stale when its key is gone or now carries a different
    /// expiry; stale records are dropped without touching the map.
    fn purge_expired(&mut self, now: u64) -> usize {
        let mut removed = 0;
        while let Some(ExpiryRecord { expires_at, key }) = self.schedule.pop_due(now) {
            let current = self
                .entries
                .peek(&key)
                .is_some_and(|entry| entry.expires_at == Some(expires_at));
            if current {
                self.entries.pop(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Insert or replace a key, returning the key evicted to make room
    fn insert(&mut self, key: String, entry: Entry) -> Option<String> {
        if let Some(at) = entry.expires_at {
            self.schedule.push(key.clone(), at);
        }
        let replacing = self.entries.contains(&key);
        match self.entries.push(key, entry) {
            Some((evicted, _)) if !replacing => Some(evicted),
            _ => None,
        }
    }
}

/// Thread-safe key-value store with TTL support and snapshot persistence
pub struct CacheEngine {
    state: Mutex<State>,
    max_keys: Option<NonZeroUsize>,
    started_at: Instant,
    expired_keys: AtomicU64,
    evicted_keys: AtomicU64,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("keys", &self.len())
            .field("max_keys", &self.max_keys)
            .field("expired_keys", &self.expired_keys.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for CacheEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheEngine {
    /// Create an empty engine without a key limit
    pub fn new() -> Self {
        Self::with_max_keys(None)
    }

    /// Create an empty engine holding at most `max_keys` keys
    pub fn with_max_keys(max_keys: Option<NonZeroUsize>) -> Self {
        Self {
            state: Mutex::new(State::new(max_keys)),
            max_keys,
            started_at: Instant::now(),
            expired_keys: AtomicU64::new(0),
            evicted_keys: AtomicU64::new(0),
        }
    }

    /// Lock the state after draining whatever has expired by now
    fn lock_fresh(&self) -> (MutexGuard<'_, State>, u64) {
        let mut state = self.state.lock();
        let now = current_millis();
        self.drain(&mut state, now);
        (state, now)
    }

    fn drain(&self, state: &mut State, now: u64) -> usize {
        let removed = state.purge_expired(now);
        if removed > 0 {
            self.expired_keys.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = state.entries.len(), "Expired keys removed");
        }
        removed
    }

    fn insert(&self, state: &mut State, key: String, entry: Entry) {
        if let Some(evicted) = state.insert(key, entry) {
            self.evicted_keys.fetch_add(1, Ordering::Relaxed);
            debug!(key = %evicted, "Evicted least recently used key");
        }
    }

    /// Store a value, replacing any previous value and expiry for the key.
    ///
    /// With `ttl` the key expires `ttl` from now; without it the key lives
    /// until deleted.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        let (mut state, now) = self.lock_fresh();
        let entry = match ttl {
            Some(ttl) => Entry::with_ttl(value.into(), ttl, now),
            None => Entry::new(value.into()),
        };
        self.insert(&mut state, key.into(), entry);
    }

    /// Store several values at once, none of them expiring
    pub fn set_many<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let (mut state, _) = self.lock_fresh();
        for (key, value) in pairs {
            self.insert(&mut state, key.into(), Entry::new(value.into()));
        }
    }

    /// Get a copy of the value for a key
    pub fn get(&self, key: &str) -> Option<String> {
        let (mut state, _) = self.lock_fresh();
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Get the values of several keys, in request order
    pub fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        let (mut state, _) = self.lock_fresh();
        keys.iter()
            .map(|key| state.entries.get(*key).map(|entry| entry.value.clone()))
            .collect()
    }

    /// Check whether a key holds a live value
    pub fn exists(&self, key: &str) -> bool {
        let (state, _) = self.lock_fresh();
        state.entries.contains(key)
    }

    /// Remove a key, returning the number of keys removed (0 or 1).
    ///
    /// Pending expiry records for the key are left to go stale.
    pub fn delete(&self, key: &str) -> usize {
        let (mut state, _) = self.lock_fresh();
        usize::from(state.entries.pop(key).is_some())
    }

    /// Remaining lifetime in seconds, [`TTL_PERSISTENT`] for keys without
    /// expiry and [`TTL_MISSING`] for absent keys.
    ///
    /// Partial seconds count as a whole second, see [`Entry::ttl_secs`].
    pub fn ttl(&self, key: &str) -> i64 {
        let (state, now) = self.lock_fresh();
        match state.entries.peek(key) {
            Some(entry) => entry.ttl_secs(now).unwrap_or(TTL_PERSISTENT),
            None => TTL_MISSING,
        }
    }

    /// Increment the integer value of a key by one.
    ///
    /// A missing key counts as 0.
    pub fn incr(&self, key: &str) -> Result<i64, StorageError> {
        self.incr_by(key, 1)
    }

    /// Decrement the integer value of a key by one
    pub fn decr(&self, key: &str) -> Result<i64, StorageError> {
        self.incr_by(key, -1)
    }

    /// Add `delta` to the integer value of a key, keeping its expiry.
    ///
    /// Nothing is written when the value is not an integer or the result
    /// would overflow.
    pub fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let (mut state, _) = self.lock_fresh();

        let current = match state.entries.peek(key) {
            Some(entry) => entry.as_i64()?,
            None => 0,
        };
        let updated = current.checked_add(delta).ok_or(StorageError::Overflow)?;

        match state.entries.get_mut(key) {
            Some(entry) => entry.value = updated.to_string(),
            None => self.insert(&mut state, key.to_string(), Entry::new(updated.to_string())),
        }

        Ok(updated)
    }

    /// Live keys matching a glob pattern, sorted
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let pattern = GlobPattern::new(pattern);
        let (state, _) = self.lock_fresh();
        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Remove every key and every scheduled expiry
    pub fn flush(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.schedule.clear();
    }

    /// Number of stored keys, including expired ones not yet collected
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records in the expiration schedule, stale ones included
    pub fn scheduled(&self) -> usize {
        self.state.lock().schedule.len()
    }

    /// Keys removed by expiry since the engine was created
    pub fn expired_keys(&self) -> u64 {
        self.expired_keys.load(Ordering::Relaxed)
    }

    /// Keys evicted by the key limit since the engine was created
    pub fn evicted_keys(&self) -> u64 {
        self.evicted_keys.load(Ordering::Relaxed)
    }

    /// Key count, approximate memory usage and uptime
    pub fn info(&self) -> CacheInfo {
        let (state, _) = self.lock_fresh();
        let memory_usage = state
            .entries
            .iter()
            .map(|(key, entry)| entry.footprint(key))
            .sum();

        CacheInfo {
            keys: state.entries.len(),
            memory_usage,
            uptime: self.started_at.elapsed(),
            expired_keys: self.expired_keys(),
            max_keys: self.max_keys.map_or(0, NonZeroUsize::get),
            evicted_keys: self.evicted_keys(),
        }
    }

    /// Drain due expiry records and report when the next one is due
    pub fn sweep(&self) -> SweepOutcome {
        let mut state = self.state.lock();
        let removed = self.drain(&mut state, current_millis());
        SweepOutcome {
            removed,
            next_deadline: state.schedule.next_deadline(),
        }
    }

    /// Capture the whole store state, least recently used entry first
    fn capture(state: &State) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: current_millis(),
            entries: state
                .entries
                .iter()
                .rev()
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
            schedule: state.schedule.to_sorted_vec(),
        }
    }

    /// Write a snapshot of the store to `path`, returning the number of keys
    /// saved.
    ///
    /// The lock is held for the whole write so the file reflects a single
    /// point in time.
    pub fn save(&self, path: &Path) -> Result<usize, StorageError> {
        let state = self.state.lock();
        let image = Self::capture(&state);
        snapshot::write_atomic(path, &image.encode()?)?;

        info!(
            path = %path.display(),
            keys = image.entries.len(),
            scheduled = image.schedule.len(),
            "Snapshot saved"
        );
        Ok(image.entries.len())
    }

    /// Replace the store with the snapshot at `path`.
    ///
    /// Returns `Ok(None)` and leaves the store untouched when the file does
    /// not exist. Keys whose expiry passed while the snapshot sat on disk are
    /// dropped immediately, and a snapshot larger than the key limit keeps
    /// its most recently used keys.
    pub fn load(&self, path: &Path) -> Result<Option<usize>, StorageError> {
        let mut state = self.state.lock();

        let Some(image) = snapshot::read(path)? else {
            info!(path = %path.display(), "No snapshot found, starting empty");
            return Ok(None);
        };

        let scheduled: HashSet<(String, u64)> = image
            .schedule
            .iter()
            .map(|record| (record.key.clone(), record.expires_at))
            .collect();

        let mut restored = State::new(self.max_keys);
        restored.schedule = image.schedule.into_iter().collect();
        for (key, entry) in image.entries {
            if let Some(at) = entry.expires_at
                && !scheduled.contains(&(key.clone(), at))
            {
                restored.schedule.push(key.clone(), at);
            }
            let displaced = restored.entries.push(key.clone(), entry);
            if displaced.is_some_and(|(evicted, _)| evicted != key) {
                self.evicted_keys.fetch_add(1, Ordering::Relaxed);
            }
        }

        *state = restored;
        let expired = self.drain(&mut state, current_millis());

        info!(
            path = %path.display(),
            keys = state.entries.len(),
            expired,
            "Snapshot loaded"
        );
        Ok(Some(state.entries.len()))
    }
}
