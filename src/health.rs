//! Simple HTTP health and metrics server (synchronous)

use crate::config::MetricsConfig;
use crate::metrics::Metrics;
use crate::storage::CacheEngine;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// Health server state
pub struct HealthServer {
    metrics: Arc<Metrics>,
    engine: Arc<CacheEngine>,
    ready: AtomicBool,
    running: AtomicBool,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(metrics: Arc<Metrics>, engine: Arc<CacheEngine>) -> Self {
        Self {
            metrics,
            engine,
            ready: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    /// Set the ready state
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Stop the server
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start the health server (blocking, run in separate thread)
    pub fn run(self: Arc<Self>, config: &MetricsConfig) -> std::io::Result<()> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        info!("Health server listening on {}", config.listen_addr);
        self.serve(&listener)
    }

    /// Serve requests from a bound listener until stopped
    pub fn serve(&self, listener: &TcpListener) -> std::io::Result<()> {
        listener.set_nonblocking(true)?;

        while self.running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = self.handle_connection(stream) {
                        error!("Health connection error: {}", e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    error!("Health server accept error: {}", e);
                }
            }
        }

        info!("Health server stopped");
        Ok(())
    }

    /// Build the status, content type and body for a request line
    fn route(&self, request_line: &str) -> (u16, &'static str, String) {
        // "GET /path HTTP/1.1"
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
            return (400, "text/plain", "Bad Request".to_string());
        };

        if method != "GET" {
            return (405, "text/plain", "Method Not Allowed".to_string());
        }

        match path {
            "/health" | "/healthz" => (
                200,
                "application/json",
                format!(r#"{{"status":"healthy","keys":{}}}"#, self.engine.len()),
            ),
            "/ready" | "/readyz" => {
                if self.is_ready() {
                    (200, "application/json", r#"{"status":"ready"}"#.to_string())
                } else {
                    (503, "application/json", r#"{"status":"not ready"}"#.to_string())
                }
            }
            "/metrics" => (
                200,
                "text/plain; version=0.0.4",
                self.metrics.gather(&self.engine),
            ),
            _ => (404, "text/plain", "Not Found".to_string()),
        }
    }

    /// Handle a single HTTP connection
    fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        stream.set_nonblocking(false)?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        let (status, content_type, body) = self.route(&request_line);
        send_response(&mut stream, status, content_type, &body)
    }
}

/// Send HTTP response
fn send_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &str,
) -> std::io::Result<()> {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        503 => "Service Unavailable",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        content_type,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes())?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn health() -> HealthServer {
        HealthServer::new(Arc::new(Metrics::new()), Arc::new(CacheEngine::new()))
    }

    #[test]
    fn test_ready_state() {
        let server = health();

        assert!(!server.is_ready());
        server.set_ready(true);
        assert!(server.is_ready());
        server.set_ready(false);
        assert!(!server.is_ready());
    }

    #[test]
    fn test_routes() {
        let server = health();
        server.engine.set("a", "1", None);

        let (status, _, body) = server.route("GET /health HTTP/1.1\r\n");
        assert_eq!(status, 200);
        assert_eq!(body, r#"{"status":"healthy","keys":1}"#);

        assert_eq!(server.route("GET /ready HTTP/1.1\r\n").0, 503);
        server.set_ready(true);
        assert_eq!(server.route("GET /readyz HTTP/1.1\r\n").0, 200);

        let (status, _, body) = server.route("GET /metrics HTTP/1.1\r\n");
        assert_eq!(status, 200);
        assert!(body.contains("ferrocache_keys 1"));

        assert_eq!(server.route("POST /health HTTP/1.1\r\n").0, 405);
        assert_eq!(server.route("GET /nope HTTP/1.1\r\n").0, 404);
        assert_eq!(server.route("\r\n").0, 400);
    }

    #[test]
    fn test_serve_over_http() {
        let server = Arc::new(health());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let background = Arc::clone(&server);
        let thread = std::thread::spawn(move || background.serve(&listener));

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET /health HTTP/1.1\r\n\r\n").unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert!(reply.starts_with("HTTP/1.1 200 OK"));
        assert!(reply.ends_with(r#"{"status":"healthy","keys":0}"#));

        server.stop();
        thread.join().unwrap().unwrap();
    }
}
