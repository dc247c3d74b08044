//! Error types for HTTP protocol handling.
//!
//! [`HttpError`] is the top-level error at the connection boundary; it wraps
//! either a [`ParseError`] (request side) or a [`SendError`] (response side).
//! The connection layer inspects `ParseError` variants to decide between
//! answering 400 and closing the socket without a response.

use std::io;
use thiserror::Error;

/// The top-level error type for HTTP operations.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Errors that occur while reading and parsing a request
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    /// Errors that occur while serializing and writing a response
    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Errors that occur during HTTP request parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The stream ended before a complete request was buffered
    #[error("connection closed before a complete request was received")]
    Incomplete,

    /// Header section exceeds the configured limit
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    /// Declared Content-Length exceeds the configured body limit
    #[error("body size too large, content-length: {content_length} exceed the limit {max_size}")]
    TooLargeBody { content_length: usize, max_size: usize },

    /// Request line is not exactly `METHOD SP target SP version`
    #[error("invalid request line")]
    InvalidRequestLine,

    /// Invalid or unsupported HTTP method
    #[error("invalid http method")]
    InvalidMethod,

    /// Invalid header format or content
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    /// More than one Content-Length header present
    #[error("duplicate content-length header")]
    DuplicateContentLength,

    /// Content-Length value is not a non-negative integer
    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    /// A `..` segment would escape the path root
    #[error("path traversal rejected")]
    PathTraversal,

    /// Request target cannot be decoded into a path
    #[error("invalid path: {reason}")]
    InvalidPath { reason: String },

    /// I/O error during parsing
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_large_body(content_length: usize, max_size: usize) -> Self {
        Self::TooLargeBody { content_length, max_size }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn invalid_path<S: ToString>(reason: S) -> Self {
        Self::InvalidPath { reason: reason.to_string() }
    }

    /// True for the size-guard variants that close the connection without a
    /// 400 response.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::TooLargeHeader { .. } | Self::TooLargeBody { .. })
    }
}

/// Errors that occur during HTTP response serialization and writing.
#[derive(Error, Debug)]
pub enum SendError {
    /// I/O error during sending
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
