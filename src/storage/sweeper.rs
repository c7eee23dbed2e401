//! Background expiry sweeper
//!
//! Lazy expiry alone lets write-once keys that are never read again sit in
//! memory forever. The sweeper drains the expiration schedule in the
//! background and then sleeps until the next scheduled deadline, capped by a
//! fallback interval so keys written while it sleeps are picked up in time.
//!
//! The same loop runs either as a tokio task ([`ExpirySweeper::spawn`]) or
//! on a dedicated OS thread ([`ExpirySweeper::spawn_thread`]).

use crate::storage::CacheEngine;
use crate::storage::entry::current_millis;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Longest sleep between drains, also used when nothing is scheduled
    pub fallback_interval: Duration,

    /// Shortest sleep between drains
    pub min_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            fallback_interval: Duration::from_secs(1),
            min_interval: Duration::from_millis(1),
        }
    }
}

impl SweeperConfig {
    pub fn with_fallback(fallback_interval: Duration) -> Self {
        Self {
            fallback_interval,
            ..Self::default()
        }
    }
}

/// Drains expired keys from a [`CacheEngine`] on a dynamic schedule
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    engine: Arc<CacheEngine>,
    config: SweeperConfig,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<CacheEngine>, config: SweeperConfig) -> Self {
        Self { engine, config }
    }

    /// Run one drain and return how long to sleep before the next one
    pub fn run_once(&self) -> Duration {
        let outcome = self.engine.sweep();

        if outcome.removed > 0 {
            debug!(
                removed = outcome.removed,
                keys_remaining = self.engine.len(),
                "Sweeper removed expired keys"
            );
        }

        let wait = match outcome.next_deadline {
            Some(deadline) => {
                Duration::from_millis(deadline.saturating_sub(current_millis()))
            }
            None => self.config.fallback_interval,
        };
        let wait = wait
            .max(self.config.min_interval)
            .min(self.config.fallback_interval);
        trace!(wait_ms = wait.as_millis(), "Sweeper sleeping");
        wait
    }

    /// Sweep until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!("Background expiry sweeper started");
        loop {
            let wait = self.run_once();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!("Background expiry sweeper stopped");
    }

    /// Start the sweeper as a tokio task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Start the sweeper on its own OS thread.
    ///
    /// The thread stops when the returned handle is stopped or dropped.
    pub fn spawn_thread(self) -> std::io::Result<SweeperThread> {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name("expiry-sweeper".to_string())
            .spawn(move || {
                info!("Background expiry sweeper thread started");
                loop {
                    let wait = self.run_once();
                    if thread_signal.wait(wait) {
                        break;
                    }
                }
                info!("Background expiry sweeper thread stopped");
            })?;

        Ok(SweeperThread {
            signal,
            handle: Some(handle),
        })
    }
}

#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    /// Sleep up to `timeout`; returns true once stop was requested
    fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.condvar.wait_for(&mut stopped, timeout);
        }
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }
}

/// Handle to a sweeper running on a dedicated thread
#[derive(Debug)]
pub struct SweeperThread {
    signal: Arc<StopSignal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SweeperThread {
    /// Stop the thread and wait for it to exit
    pub fn stop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SweeperThread {
    fn drop(&mut self) {
        self.stop();
    }
}
