//! Per-connection request/response loop.
//!
//! [`HttpConnection`] owns the framed halves of one accepted socket and runs
//! the keep-alive loop: read a complete request (bounded by the configured
//! timeouts and size limits), dispatch it to the handler, serialize the
//! response, decide whether the connection survives. Requests on a single
//! connection are processed strictly in arrival order.
//!
//! The connection is the failure boundary for handler code: a panicking
//! handler is caught here, logged, and ends the connection without taking
//! the server down.

use crate::codec::{ParserConfig, RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::{HttpError, Method, Response};
use futures::{FutureExt, SinkExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, warn};

/// Timing and size limits for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Budget for reading the first request.
    pub read_timeout: Duration,
    /// Idle budget between keep-alive requests.
    pub keep_alive_timeout: Duration,
    pub parser: ParserConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(5),
            parser: ParserConfig::default(),
        }
    }
}

/// The read/dispatch/write loop over one byte-stream socket.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: ConnectionConfig,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, config: ConnectionConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::with_config(config.parser), 4096),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config,
        }
    }

    /// Runs the connection until the peer goes away, a timeout fires, the
    /// handler fails, or the request asks for `Connection: close`.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + ?Sized,
    {
        let mut is_first_request = true;
        let mut keep_alive = true;

        while keep_alive {
            let wait = if is_first_request { self.config.read_timeout } else { self.config.keep_alive_timeout };

            let next = match tokio::time::timeout(wait, self.framed_read.next()).await {
                Ok(next) => next,
                Err(_elapsed) => {
                    if is_first_request && self.framed_read.read_buffer().is_empty() {
                        debug!("no bytes before read timeout, answering 408");
                        let _ = self.framed_write.send(Response::request_timeout()).await;
                    }
                    // idle keep-alive timeout closes silently
                    return Ok(());
                }
            };

            let request = match next {
                Some(Ok(request)) => request,
                Some(Err(e)) if e.is_overflow() => {
                    warn!(cause = %e, "request exceeds size limits, closing");
                    return Err(e.into());
                }
                Some(Err(e)) => {
                    warn!(cause = %e, "failed to parse request, answering 400");
                    let _ = self.framed_write.send(Response::bad_request("bad request")).await;
                    return Err(e.into());
                }
                None => {
                    debug!("peer closed the connection");
                    return Ok(());
                }
            };
            is_first_request = false;

            let close_requested = request
                .header("connection")
                .map(|value| value.eq_ignore_ascii_case("close"))
                .unwrap_or(false);
            let is_head = request.method() == Method::Head;

            let mut response = match AssertUnwindSafe(handler.call(request)).catch_unwind().await {
                Ok(response) => response,
                Err(panic) => {
                    error!(cause = panic_message(panic.as_ref()), "handler panicked, closing connection");
                    return Ok(());
                }
            };

            if close_requested {
                keep_alive = false;
                response.append_header("Connection", "close");
            }
            if is_head {
                // HEAD keeps Content-Length as the handler set it
                let _ = response.take_body();
            }

            self.framed_write.send(response).await.map_err(|e| {
                warn!(cause = %e, "failed to write response");
                e
            })?;
        }

        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Request;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    async fn echo_path(request: Request) -> Response {
        Response::ok(request.path().to_string())
    }

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            read_timeout: Duration::from_millis(500),
            keep_alive_timeout: Duration::from_millis(500),
            parser: ParserConfig::default(),
        }
    }

    fn spawn_connection(
        server: tokio::io::DuplexStream,
        config: ConnectionConfig,
    ) -> tokio::task::JoinHandle<Result<(), HttpError>> {
        let (reader, writer) = tokio::io::split(server);
        let connection = HttpConnection::new(reader, writer, config);
        tokio::spawn(connection.process(Arc::new(echo_path)))
    }

    #[tokio::test]
    async fn keep_alive_serves_pipelined_requests_in_order() {
        let (mut client, server) = duplex(4096);
        let task = spawn_connection(server, test_config());

        client
            .write_all(b"GET /a HTTP/1.1\r\n\r\nGET /bb HTTP/1.1\r\n\r\n")
            .await
            .unwrap();

        let expected: &[u8] =
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: 2\r\n\r\n/a\
              HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: 3\r\n\r\n/bb";
        let mut buffer = vec![0u8; expected.len()];
        client.read_exact(&mut buffer).await.unwrap();
        assert_eq!(buffer, expected);

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn connection_close_is_honored_and_echoed() {
        let (mut client, server) = duplex(4096);
        let task = spawn_connection(server, test_config());

        client
            .write_all(b"GET /x HTTP/1.1\r\nConnection: CLOSE\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Connection: close\r\n"));

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn parse_failure_answers_400_and_closes() {
        let (mut client, server) = duplex(4096);
        let task = spawn_connection(server, test_config());

        client.write_all(b"BREW /pot HTTP/1.1\r\n\r\n").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));

        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn head_response_drops_body_but_keeps_content_length() {
        let (mut client, server) = duplex(4096);
        let task = spawn_connection(server, test_config());

        client
            .write_all(b"HEAD /abc HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8(response).unwrap();
        assert!(response.contains("Content-Length: 4\r\n"));
        assert!(response.ends_with("\r\n\r\n"));

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn first_request_timeout_answers_408() {
        let (mut client, server) = duplex(4096);
        let config = ConnectionConfig { read_timeout: Duration::from_millis(50), ..test_config() };
        let task = spawn_connection(server, config);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 408 Request Timeout\r\n"));

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn idle_keep_alive_timeout_closes_silently() {
        let (mut client, server) = duplex(4096);
        let config = ConnectionConfig { keep_alive_timeout: Duration::from_millis(50), ..test_config() };
        let task = spawn_connection(server, config);

        client.write_all(b"GET /a HTTP/1.1\r\n\r\n").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        // nothing after the first response: the idle timeout closed the socket
        assert_eq!(response.matches("HTTP/1.1").count(), 1);

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_header_closes_without_response() {
        let (mut client, server) = duplex(16384);
        let config = ConnectionConfig {
            parser: ParserConfig { max_header_size: 64, max_body_size: 1024 },
            ..test_config()
        };
        let task = spawn_connection(server, config);

        let mut request = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
        request.extend_from_slice(&[b'a'; 256]);
        client.write_all(&request).await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());

        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn panicking_handler_closes_without_response() {
        async fn boom(_request: Request) -> Response {
            panic!("boom");
        }

        let (mut client, server) = duplex(4096);
        let (reader, writer) = tokio::io::split(server);
        let connection = HttpConnection::new(reader, writer, test_config());
        let task = tokio::spawn(connection.process(Arc::new(boom)));

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());

        task.await.unwrap().unwrap();
    }
}
