//! Stored entries and wall-clock helpers
//!
//! Expiry is kept as an absolute Unix timestamp in milliseconds so that a
//! snapshot taken before a restart still expires keys at the right moment.

use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Stored value with optional expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque value
    pub value: String,
    /// Expiration timestamp in Unix milliseconds (None = never expire)
    pub expires_at: Option<u64>,
}

impl Entry {
    /// Create an entry that never expires
    pub fn new(value: String) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Create an entry expiring `ttl` after `now`
    pub fn with_ttl(value: String, ttl: Duration, now: u64) -> Self {
        Self {
            value,
            expires_at: Some(expire_at(now, ttl)),
        }
    }

    /// Check if the entry has expired at `now`
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Remaining lifetime in whole seconds (None = no expiry).
    ///
    /// Rounds up rather than truncating: 999ms left reports 1, so a live key
    /// with an expiry never reports 0 and `SET k v EX n` followed by TTL
    /// always lands in `1..=n`. At the deadline itself the entry already
    /// counts as expired and is purged before TTL reads it.
    pub fn ttl_secs(&self, now: u64) -> Option<i64> {
        self.expires_at
            .map(|at| at.saturating_sub(now).div_ceil(1000) as i64)
    }

    /// Interpret the value as a base-10 integer
    pub fn as_i64(&self) -> Result<i64, StorageError> {
        self.value.parse().map_err(|_| StorageError::NotInteger)
    }

    /// Approximate footprint used by INFO
    pub fn footprint(&self, key: &str) -> usize {
        key.len() + self.value.len()
    }
}

/// Absolute expiry for a TTL starting at `now`
pub fn expire_at(now: u64, ttl: Duration) -> u64 {
    now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
}

/// Get the current Unix timestamp in milliseconds
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_expire() {
        let entry = Entry::new("data".to_string());
        assert_eq!(entry.expires_at, None);
        assert!(!entry.is_expired_at(u64::MAX));
        assert_eq!(entry.ttl_secs(0), None);
    }

    #[test]
    fn test_expiry_boundary() {
        let entry = Entry::with_ttl("data".to_string(), Duration::from_secs(10), 1_000);
        assert_eq!(entry.expires_at, Some(11_000));
        assert!(!entry.is_expired_at(10_999));
        assert!(entry.is_expired_at(11_000));
    }

    #[test]
    fn test_ttl_rounds_up() {
        let entry = Entry::with_ttl("data".to_string(), Duration::from_secs(1), 0);
        assert_eq!(entry.ttl_secs(0), Some(1));
        assert_eq!(entry.ttl_secs(1), Some(1));
        assert_eq!(entry.ttl_secs(999), Some(1));
        assert_eq!(entry.ttl_secs(1_000), Some(0));
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(Entry::new("-42".to_string()).as_i64().unwrap(), -42);
        assert!(Entry::new("abc".to_string()).as_i64().is_err());
        assert!(Entry::new(" 1".to_string()).as_i64().is_err());
        assert!(Entry::new("99999999999999999999".to_string()).as_i64().is_err());
    }

    #[test]
    fn test_expire_at_saturates() {
        assert_eq!(expire_at(u64::MAX - 1, Duration::from_secs(5)), u64::MAX);
    }
}
