use crate::protocol::{Response, SendError};
use bytes::BytesMut;
use tokio_util::codec::Encoder;

/// Serializes a [`Response`] byte-exactly: status line, header lines in
/// stored order (duplicates preserved), a bare CRLF, then the body.
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self
    }
}

impl Encoder<Response> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let headers_len: usize =
            response.headers().iter().map(|(name, value)| name.len() + value.len() + 4).sum();
        dst.reserve(16 + response.reason().len() + headers_len + 2 + response.body().len());

        dst.extend_from_slice(b"HTTP/1.1 ");
        dst.extend_from_slice(response.status().to_string().as_bytes());
        dst.extend_from_slice(b" ");
        dst.extend_from_slice(response.reason().as_bytes());
        dst.extend_from_slice(b"\r\n");

        for (name, value) in response.headers() {
            dst.extend_from_slice(name.as_bytes());
            dst.extend_from_slice(b": ");
            dst.extend_from_slice(value.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }

        dst.extend_from_slice(b"\r\n");
        dst.extend_from_slice(response.body());
        Ok(())
    }
}
