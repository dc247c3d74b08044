//! Streaming HTTP/1.1 request decoder.
//!
//! The decoder accumulates bytes until the header terminator is seen, parses
//! the head, then waits for exactly `Content-Length` body bytes before
//! yielding one complete [`Request`]. Size guards fire while data is still
//! streaming in, so an oversized header section is rejected before the
//! terminator ever arrives.

use crate::ensure;
use crate::protocol::target::{decode_path, parse_query};
use crate::protocol::{Method, ParseError, Request};
use bytes::BytesMut;
use std::collections::HashMap;
use tokio_util::codec::Decoder;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Size limits applied while parsing a request.
#[derive(Debug, Copy, Clone)]
pub struct ParserConfig {
    pub max_header_size: usize,
    pub max_body_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_header_size: 8192, max_body_size: 1_048_576 }
    }
}

/// A decoder producing one fully materialized [`Request`] per frame.
///
/// The decoder is a two-state machine: while `pending` is `None` it is
/// looking for a complete header section; afterwards it is waiting for the
/// declared body length.
pub struct RequestDecoder {
    config: ParserConfig,
    pending: Option<PendingRequest>,
}

struct PendingRequest {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    query: HashMap<String, String>,
    content_length: usize,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config, pending: None }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::with_config(ParserConfig::default())
    }
}

impl Decoder for RequestDecoder {
    type Item = Request;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            let header_end = match find_terminator(src) {
                Some(offset) => offset,
                None => {
                    ensure!(
                        src.len() <= self.config.max_header_size,
                        ParseError::too_large_header(src.len(), self.config.max_header_size)
                    );
                    return Ok(None);
                }
            };
            ensure!(
                header_end <= self.config.max_header_size,
                ParseError::too_large_header(header_end, self.config.max_header_size)
            );

            let head = src.split_to(header_end + HEADER_TERMINATOR.len());
            let pending = parse_head(&head[..header_end])?;
            ensure!(
                pending.content_length <= self.config.max_body_size,
                ParseError::too_large_body(pending.content_length, self.config.max_body_size)
            );
            self.pending = Some(pending);
        }

        // body phase: wait until the declared length is buffered
        let content_length = self.pending.as_ref().map(|pending| pending.content_length).unwrap_or(0);
        if src.len() < content_length {
            return Ok(None);
        }

        let pending = self.pending.take().expect("pending request set above");
        let body = src.split_to(content_length).freeze();
        Ok(Some(Request::from_parts(pending.method, pending.path, pending.headers, pending.query, body)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(request) => Ok(Some(request)),
            None => {
                // leftover bytes at EOF mean the peer quit mid-request
                ensure!(src.is_empty() && self.pending.is_none(), ParseError::Incomplete);
                Ok(None)
            }
        }
    }
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer.windows(HEADER_TERMINATOR.len()).position(|window| window == HEADER_TERMINATOR)
}

fn parse_head(head: &[u8]) -> Result<PendingRequest, ParseError> {
    let head = std::str::from_utf8(head).map_err(|_| ParseError::invalid_header("head is not valid utf-8"))?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let (method, path, query) = parse_request_line(request_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| ParseError::invalid_header("missing ':'"))?;
        ensure!(!name.is_empty(), ParseError::invalid_header("empty header name"));
        headers.push((name.to_string(), value.trim().to_string()));
    }

    let content_length = parse_content_length(&headers)?;

    Ok(PendingRequest { method, path, headers, query, content_length })
}

fn parse_request_line(line: &str) -> Result<(Method, String, HashMap<String, String>), ParseError> {
    let tokens: Vec<&str> = line.split(' ').collect();
    ensure!(tokens.len() == 3 && tokens.iter().all(|token| !token.is_empty()), ParseError::InvalidRequestLine);

    let method = Method::from_bytes(tokens[0].as_bytes())?;
    let (raw_path, raw_query) = match tokens[1].split_once('?') {
        Some((path, query)) => (path, query),
        None => (tokens[1], ""),
    };

    Ok((method, decode_path(raw_path)?, parse_query(raw_query)))
}

fn parse_content_length(headers: &[(String, String)]) -> Result<usize, ParseError> {
    let mut values = headers.iter().filter(|(name, _)| name.eq_ignore_ascii_case("content-length"));

    let value = match values.next() {
        Some((_, value)) => value,
        None => return Ok(0),
    };
    ensure!(values.next().is_none(), ParseError::DuplicateContentLength);

    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ParseError::invalid_content_length(format!("value {value:?} is not a non-negative integer")))
}
