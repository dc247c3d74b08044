//! HTTP/1.1 wire codec.
//!
//! [`RequestDecoder`] turns raw socket bytes into [`Request`] values and
//! [`ResponseEncoder`] serializes [`Response`] values back out. Both plug
//! into `tokio_util`'s framed read/write halves; the connection layer owns
//! the read loop and the timeouts.
//!
//! [`Request`]: crate::protocol::Request
//! [`Response`]: crate::protocol::Response

mod request_decoder;
mod response_encoder;

pub use request_decoder::{ParserConfig, RequestDecoder};
pub use response_encoder::ResponseEncoder;
