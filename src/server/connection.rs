//! Connection handling for individual client connections

use super::Server;
use super::handler;
use crate::ProtocolError;
use crate::protocol::{ParseResult, ResponseWriter, find_line_end, parse};
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

/// Handle a single client connection
pub async fn handle(
    server: Arc<Server>,
    mut stream: TcpStream,
    _permit: OwnedSemaphorePermit,
) -> anyhow::Result<()> {
    let mut read_buf = BytesMut::with_capacity(server.config.read_buffer_size);
    let mut response = ResponseWriter::new(server.config.write_buffer_size);
    // Set while skipping the rest of a line that exceeded the length cap
    let mut discarding = false;

    loop {
        tokio::select! {
            _ = server.cancel_token.cancelled() => {
                break;
            }
            result = stream.read_buf(&mut read_buf) => {
                match result {
                    Ok(0) => {
                        // Connection closed
                        break;
                    }
                    Ok(n) => {
                        server.metrics.bytes_read.inc_by(n as u64);

                        // Process every complete line in the buffer
                        let quit = process_lines(&server, &mut read_buf, &mut response, &mut discarding);

                        if !response.is_empty() {
                            let buf = response.take();
                            server.metrics.bytes_written.inc_by(buf.len() as u64);
                            stream.write_all(&buf).await?;
                        }
                        response.clear();

                        if quit {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        debug!("Read error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Execute the complete lines at the front of `read_buf`, appending replies.
///
/// A line that outgrows `max_line_length` is answered with one error and
/// then dropped up to and including its `\n`, however many reads that takes;
/// `discarding` carries that state between calls.
///
/// Returns true when the client asked to close the connection.
fn process_lines(
    server: &Server,
    read_buf: &mut BytesMut,
    response: &mut ResponseWriter,
    discarding: &mut bool,
) -> bool {
    loop {
        if *discarding {
            match find_line_end(read_buf) {
                Some(end) => {
                    let _ = read_buf.split_to(end + 1);
                    *discarding = false;
                }
                None => {
                    read_buf.clear();
                    return false;
                }
            }
        }

        match parse(read_buf) {
            ParseResult::Complete(cmd, consumed) => {
                if cmd.is_quit() {
                    return true;
                }

                let started = Instant::now();
                handler::execute(server, cmd, response);
                server
                    .metrics
                    .cmd_latency
                    .observe(started.elapsed().as_secs_f64());

                let _ = read_buf.split_to(consumed);
            }
            ParseResult::Error(e, consumed) => {
                server.metrics.protocol_errors.inc();
                response.error(&e.to_string());
                let _ = read_buf.split_to(consumed);
            }
            ParseResult::NeedMoreData => {
                if read_buf.len() > server.config.max_line_length {
                    server.metrics.protocol_errors.inc();
                    response.error(&ProtocolError::LineTooLong.to_string());
                    read_buf.clear();
                    *discarding = true;
                }
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::metrics::Metrics;
    use crate::storage::CacheEngine;
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;

    fn short_line_server() -> Server {
        let engine = Arc::new(CacheEngine::new());
        engine.set("victim", "precious", None);
        Server::new(
            ServerConfig {
                max_line_length: 16,
                ..ServerConfig::default()
            },
            PathBuf::from("unused.rdb"),
            engine,
            Arc::new(Metrics::new()),
            CancellationToken::new(),
        )
    }

    /// Feed one read's worth of bytes and return the replies it produced
    fn feed(
        server: &Server,
        read_buf: &mut BytesMut,
        discarding: &mut bool,
        bytes: &[u8],
    ) -> String {
        let mut response = ResponseWriter::new(256);
        read_buf.extend_from_slice(bytes);
        process_lines(server, read_buf, &mut response, discarding);
        String::from_utf8(response.take().to_vec()).unwrap()
    }

    #[test]
    fn test_tail_of_long_line_is_not_executed() {
        let server = short_line_server();
        let mut read_buf = BytesMut::new();
        let mut discarding = false;

        let reply = feed(
            &server,
            &mut read_buf,
            &mut discarding,
            b"SET k aaaaaaaaaaaaaaaaaaaaaaaa",
        );
        assert_eq!(reply, "ERROR: Command line too long\r\n");
        assert!(discarding);

        let reply = feed(&server, &mut read_buf, &mut discarding, b" DEL victim\r\n");
        assert_eq!(reply, "");
        assert!(!discarding);
        assert!(read_buf.is_empty());
        assert_eq!(server.engine.get("victim").as_deref(), Some("precious"));
        assert_eq!(server.engine.get("k"), None);
        assert_eq!(server.metrics.protocol_errors.get(), 1);
    }

    #[test]
    fn test_discard_spans_several_reads() {
        let server = short_line_server();
        let mut read_buf = BytesMut::new();
        let mut discarding = false;

        feed(&server, &mut read_buf, &mut discarding, b"GET aaaaaaaaaaaaaaaaaaaa");
        assert_eq!(feed(&server, &mut read_buf, &mut discarding, b"bbbbbbbbbbbbbbbbbbbbbbbbbbbb"), "");
        assert_eq!(feed(&server, &mut read_buf, &mut discarding, b"DEL victim"), "");
        assert!(discarding);
        assert_eq!(feed(&server, &mut read_buf, &mut discarding, b"\n"), "");
        assert!(!discarding);
        assert_eq!(server.engine.get("victim").as_deref(), Some("precious"));
    }

    #[test]
    fn test_next_line_after_discard_runs() {
        let server = short_line_server();
        let mut read_buf = BytesMut::new();
        let mut discarding = false;

        feed(&server, &mut read_buf, &mut discarding, b"SET k aaaaaaaaaaaaaaaaaaaaaaaa");
        let reply = feed(
            &server,
            &mut read_buf,
            &mut discarding,
            b"aaaa\r\nGET victim\r\n",
        );
        assert_eq!(reply, "precious\r\n");
        assert!(read_buf.is_empty());
    }

    #[test]
    fn test_pipelined_lines() {
        let server = short_line_server();
        let mut read_buf = BytesMut::new();
        let mut discarding = false;

        let reply = feed(
            &server,
            &mut read_buf,
            &mut discarding,
            b"SET a 1\r\nGET a\r\nGET b",
        );
        assert_eq!(reply, "OK\r\n1\r\n");
        assert_eq!(&read_buf[..], b"GET b");
    }
}
