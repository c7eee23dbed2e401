//! Prometheus metrics for FerroCache

use crate::storage::CacheEngine;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    registry
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

/// Metrics shared by the server and the health endpoint
pub struct Metrics {
    pub registry: Registry,

    // Command counters
    pub cmd_get: IntCounter,
    pub cmd_set: IntCounter,
    pub cmd_mget: IntCounter,
    pub cmd_mset: IntCounter,
    pub cmd_keys: IntCounter,
    pub cmd_del: IntCounter,
    pub cmd_exists: IntCounter,
    pub cmd_ttl: IntCounter,
    pub cmd_incr: IntCounter,
    pub cmd_decr: IntCounter,
    pub cmd_save: IntCounter,
    pub cmd_info: IntCounter,
    pub cmd_flush: IntCounter,

    // Hit/miss counters
    pub get_hits: IntCounter,
    pub get_misses: IntCounter,

    // Connection metrics
    pub active_connections: IntGauge,
    pub total_connections: IntCounter,
    pub rejected_connections: IntCounter,

    // Bytes counters
    pub bytes_read: IntCounter,
    pub bytes_written: IntCounter,

    // Latency histograms
    pub cmd_latency: Histogram,

    // Error counters
    pub protocol_errors: IntCounter,
    pub storage_errors: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();
        let r = &registry;

        let cmd_get = counter(r, "ferrocache_cmd_get_total", "Total GET commands");
        let cmd_set = counter(r, "ferrocache_cmd_set_total", "Total SET commands");
        let cmd_mget = counter(r, "ferrocache_cmd_mget_total", "Total MGET commands");
        let cmd_mset = counter(r, "ferrocache_cmd_mset_total", "Total MSET commands");
        let cmd_keys = counter(r, "ferrocache_cmd_keys_total", "Total KEYS commands");
        let cmd_del = counter(r, "ferrocache_cmd_del_total", "Total DEL commands");
        let cmd_exists = counter(r, "ferrocache_cmd_exists_total", "Total EXISTS commands");
        let cmd_ttl = counter(r, "ferrocache_cmd_ttl_total", "Total TTL commands");
        let cmd_incr = counter(r, "ferrocache_cmd_incr_total", "Total INCR commands");
        let cmd_decr = counter(r, "ferrocache_cmd_decr_total", "Total DECR commands");
        let cmd_save = counter(r, "ferrocache_cmd_save_total", "Total SAVE commands");
        let cmd_info = counter(r, "ferrocache_cmd_info_total", "Total INFO commands");
        let cmd_flush = counter(r, "ferrocache_cmd_flushall_total", "Total FLUSHALL commands");

        let get_hits = counter(r, "ferrocache_get_hits_total", "Total GET hits");
        let get_misses = counter(r, "ferrocache_get_misses_total", "Total GET misses");

        let active_connections = IntGauge::new(
            "ferrocache_active_connections",
            "Current active connections",
        )
        .expect("valid gauge definition");
        registry
            .register(Box::new(active_connections.clone()))
            .expect("gauge registered once");
        let total_connections =
            counter(r, "ferrocache_connections_total", "Total connections accepted");
        let rejected_connections = counter(
            r,
            "ferrocache_rejected_connections_total",
            "Total connections rejected",
        );

        let bytes_read = counter(r, "ferrocache_bytes_read_total", "Total bytes read");
        let bytes_written = counter(r, "ferrocache_bytes_written_total", "Total bytes written");

        let cmd_latency = Histogram::with_opts(
            HistogramOpts::new(
                "ferrocache_cmd_latency_seconds",
                "Command latency in seconds",
            )
            .buckets(vec![
                0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )
        .expect("valid histogram definition");
        registry
            .register(Box::new(cmd_latency.clone()))
            .expect("histogram registered once");

        let protocol_errors =
            counter(r, "ferrocache_protocol_errors_total", "Total protocol errors");
        let storage_errors = counter(r, "ferrocache_storage_errors_total", "Total storage errors");

        Self {
            registry,
            cmd_get,
            cmd_set,
            cmd_mget,
            cmd_mset,
            cmd_keys,
            cmd_del,
            cmd_exists,
            cmd_ttl,
            cmd_incr,
            cmd_decr,
            cmd_save,
            cmd_info,
            cmd_flush,
            get_hits,
            get_misses,
            active_connections,
            total_connections,
            rejected_connections,
            bytes_read,
            bytes_written,
            cmd_latency,
            protocol_errors,
            storage_errors,
        }
    }

    /// Get Prometheus formatted metrics, including figures read from the engine
    pub fn gather(&self, engine: &CacheEngine) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        let mut output = String::from_utf8_lossy(&buffer).into_owned();

        let keys = engine.len();
        let expired = engine.expired_keys();
        let evicted = engine.evicted_keys();

        output.push_str(&format!(
            "\n# HELP ferrocache_keys Keys currently stored\n\
             # TYPE ferrocache_keys gauge\n\
             ferrocache_keys {keys}\n"
        ));

        output.push_str(&format!(
            "\n# HELP ferrocache_expired_keys_removed_total Keys removed by lazy or background expiry\n\
             # TYPE ferrocache_expired_keys_removed_total counter\n\
             ferrocache_expired_keys_removed_total {expired}\n"
        ));

        output.push_str(&format!(
            "\n# HELP ferrocache_evicted_keys_total Keys evicted to stay within max_keys\n\
             # TYPE ferrocache_evicted_keys_total counter\n\
             ferrocache_evicted_keys_total {evicted}\n"
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        metrics.cmd_get.inc();
        metrics.cmd_set.inc();
        metrics.get_hits.inc();
        metrics.active_connections.set(5);

        let engine = CacheEngine::new();
        let output = metrics.gather(&engine);
        assert!(output.contains("ferrocache_cmd_get_total 1"));
        assert!(output.contains("ferrocache_active_connections 5"));
    }

    #[test]
    fn test_engine_figures() {
        let metrics = Metrics::new();
        let engine = CacheEngine::new();
        engine.set("a", "1", None);
        engine.set("b", "2", Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        engine.sweep();

        let output = metrics.gather(&engine);
        assert!(output.contains("ferrocache_keys 1"));
        assert!(output.contains("ferrocache_expired_keys_removed_total 1"));
        assert!(output.contains("ferrocache_evicted_keys_total 0"));
    }

    #[test]
    fn test_evicted_keys_figure() {
        let metrics = Metrics::new();
        let engine = CacheEngine::with_max_keys(std::num::NonZeroUsize::new(1));
        engine.set("a", "1", None);
        engine.set("b", "2", None);

        let output = metrics.gather(&engine);
        assert!(output.contains("ferrocache_keys 1"));
        assert!(output.contains("ferrocache_evicted_keys_total 1"));
    }
}
