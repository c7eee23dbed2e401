//! Command handlers for the line protocol

use super::Server;
use crate::StorageError;
use crate::protocol::{Command, ResponseWriter};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{error, info};

/// Execute a parsed command
pub fn execute(server: &Server, cmd: Command<'_>, response: &mut ResponseWriter) {
    let engine = &server.engine;
    let metrics = &server.metrics;

    match cmd {
        Command::Set {
            key,
            value,
            ttl_secs,
        } => {
            metrics.cmd_set.inc();
            engine.set(key, value, ttl_secs.map(Duration::from_secs));
            response.ok();
        }
        Command::Get { key } => {
            metrics.cmd_get.inc();
            match engine.get(key) {
                Some(value) => {
                    metrics.get_hits.inc();
                    response.value(&value);
                }
                None => {
                    metrics.get_misses.inc();
                    response.nil();
                }
            }
        }
        Command::Mget { keys } => {
            metrics.cmd_mget.inc();
            let values = engine.get_many(&keys);
            response.array_len(values.len());
            for value in values {
                match value {
                    Some(value) => {
                        metrics.get_hits.inc();
                        response.value(&value);
                    }
                    None => {
                        metrics.get_misses.inc();
                        response.nil();
                    }
                }
            }
        }
        Command::Mset { pairs } => {
            metrics.cmd_mset.inc();
            engine.set_many(pairs);
            response.ok();
        }
        Command::Keys { pattern } => {
            metrics.cmd_keys.inc();
            let keys = engine.keys(pattern);
            response.array_len(keys.len());
            for key in &keys {
                response.value(key);
            }
        }
        Command::Del { key } => {
            metrics.cmd_del.inc();
            response.integer(engine.delete(key) as i64);
        }
        Command::Exists { key } => {
            metrics.cmd_exists.inc();
            response.integer(i64::from(engine.exists(key)));
        }
        Command::Ttl { key } => {
            metrics.cmd_ttl.inc();
            response.integer(engine.ttl(key));
        }
        Command::Incr { key } => {
            metrics.cmd_incr.inc();
            counter_reply(server, engine.incr(key), response);
        }
        Command::Decr { key } => {
            metrics.cmd_decr.inc();
            counter_reply(server, engine.decr(key), response);
        }
        Command::Save => {
            metrics.cmd_save.inc();
            handle_save(server, response);
        }
        Command::Info => {
            metrics.cmd_info.inc();
            handle_info(server, response);
        }
        Command::FlushAll => {
            metrics.cmd_flush.inc();
            engine.flush();
            info!("Cache flushed by client");
            response.ok();
        }
        Command::Quit => {
            // Handled in connection loop
        }
    }
}

fn counter_reply(
    server: &Server,
    result: Result<i64, StorageError>,
    response: &mut ResponseWriter,
) {
    match result {
        Ok(n) => response.integer(n),
        Err(e) => {
            server.metrics.storage_errors.inc();
            response.error(&e.to_string());
        }
    }
}

/// Run blocking work from a connection task.
///
/// On a multi-threaded runtime the worker hands its other tasks off first;
/// elsewhere (current-thread runtime, plain threads) `f` simply runs inline.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Handle SAVE command
fn handle_save(server: &Server, response: &mut ResponseWriter) {
    match run_blocking(|| server.engine.save(&server.snapshot_path)) {
        Ok(_) => response.ok(),
        Err(e) => {
            server.metrics.storage_errors.inc();
            error!(path = %server.snapshot_path.display(), "SAVE failed: {}", e);
            response.error(&e.to_string());
        }
    }
}

/// Handle INFO command
fn handle_info(server: &Server, response: &mut ResponseWriter) {
    let info = server.engine.info();
    response.pair("keys", info.keys);
    response.pair("memory_usage", info.memory_usage);
    response.pair("uptime", info.uptime.as_secs());
    response.pair("expired_keys", info.expired_keys);
    response.pair("max_size", info.max_keys);
    response.pair("evicted_keys", info.evicted_keys);
}
