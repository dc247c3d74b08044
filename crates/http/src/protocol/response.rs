use crate::protocol::Cookie;
use bytes::Bytes;

/// An HTTP response under construction.
///
/// Headers are an ordered list; duplicates are allowed and serialize as
/// repeated lines. Every canned constructor sets both `Content-Type` and
/// `Content-Length`. No `Connection` header is set by default, keep-alive
/// being the HTTP/1.1 default.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Response {
    /// An empty response with the standard reason phrase for `status` and no
    /// headers. Most callers want one of the canned constructors instead.
    pub fn new(status: u16) -> Self {
        Self { status, reason: reason_phrase(status).to_string(), headers: Vec::new(), body: Bytes::new() }
    }

    fn with_body(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let mut response = Response::new(status);
        response.append_header("Content-Type", content_type);
        response.append_header("Content-Length", body.len().to_string());
        response.body = body;
        response
    }

    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self.reason = reason_phrase(status).to_string();
        self
    }

    #[inline]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup, first occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header_name, _)| header_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body bytes. Headers are left untouched; callers that care
    /// about `Content-Length` set it themselves.
    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = body.into();
        self
    }

    /// Removes and returns the body, leaving headers (including any
    /// `Content-Length`) exactly as they were. Used for HEAD responses.
    pub fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body)
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) -> &mut Self {
        self.append_header("Set-Cookie", cookie.render())
    }

    // Canned constructors, one per status the server surfaces.

    /// 200 with a plain-text body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::with_body(200, mime::TEXT_PLAIN_UTF_8.as_ref(), body)
    }

    /// An arbitrary status with a plain-text body.
    pub fn text(status: u16, body: impl Into<Bytes>) -> Self {
        Self::with_body(status, mime::TEXT_PLAIN_UTF_8.as_ref(), body)
    }

    /// 200 with an `application/json` body.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::with_body(200, mime::APPLICATION_JSON.as_ref(), body)
    }

    pub fn created(body: impl Into<Bytes>) -> Self {
        Self::with_body(201, mime::TEXT_PLAIN_UTF_8.as_ref(), body)
    }

    pub fn no_content() -> Self {
        Self::with_body(204, mime::TEXT_PLAIN_UTF_8.as_ref(), Bytes::new())
    }

    /// A redirect; `status` is one of 301, 302, 307 or 308.
    pub fn redirect(status: u16, location: &str) -> Self {
        debug_assert!(matches!(status, 301 | 302 | 307 | 308));
        let mut response = Self::with_body(status, mime::TEXT_PLAIN_UTF_8.as_ref(), Bytes::new());
        response.append_header("Location", location);
        response
    }

    pub fn bad_request(message: impl Into<Bytes>) -> Self {
        Self::with_body(400, mime::TEXT_PLAIN_UTF_8.as_ref(), message)
    }

    pub fn not_found() -> Self {
        Self::with_body(404, mime::TEXT_PLAIN_UTF_8.as_ref(), "not found")
    }

    /// 405 carrying the `Allow` header listing the registered methods.
    pub fn method_not_allowed(allow: &str) -> Self {
        let mut response = Self::with_body(405, mime::TEXT_PLAIN_UTF_8.as_ref(), "method not allowed");
        response.append_header("Allow", allow);
        response
    }

    pub fn request_timeout() -> Self {
        Self::with_body(408, mime::TEXT_PLAIN_UTF_8.as_ref(), "request timeout")
    }

    pub fn payload_too_large() -> Self {
        Self::with_body(413, mime::TEXT_PLAIN_UTF_8.as_ref(), "payload too large")
    }

    /// 429 carrying `Retry-After` in seconds.
    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        let mut response = Self::with_body(429, mime::TEXT_PLAIN_UTF_8.as_ref(), "too many requests");
        response.append_header("Retry-After", retry_after_secs.to_string());
        response
    }

    pub fn internal_error(message: impl Into<Bytes>) -> Self {
        Self::with_body(500, mime::TEXT_PLAIN_UTF_8.as_ref(), message)
    }

    pub fn service_unavailable() -> Self {
        Self::with_body(503, mime::TEXT_PLAIN_UTF_8.as_ref(), "service unavailable")
    }

    pub fn gateway_timeout() -> Self {
        Self::with_body(504, mime::TEXT_PLAIN_UTF_8.as_ref(), "gateway timeout")
    }
}

/// The standard reason phrase for `status`, or `"Unknown"`.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canned_constructors_set_content_headers() {
        let response = Response::ok("hello");
        assert_eq!(response.status(), 200);
        assert_eq!(response.reason(), "OK");
        assert_eq!(response.header("content-type"), Some(mime::TEXT_PLAIN_UTF_8.as_ref()));
        assert_eq!(response.header("content-length"), Some("5"));
        assert_eq!(&response.body()[..], b"hello");
    }

    #[test]
    fn duplicate_headers_are_kept_in_order() {
        let mut response = Response::ok("");
        response.append_header("Set-Cookie", "a=1");
        response.append_header("Set-Cookie", "b=2");

        let cookies: Vec<&str> = response
            .headers()
            .iter()
            .filter(|(name, _)| name == "Set-Cookie")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
    }

    #[test]
    fn take_body_leaves_headers_untouched() {
        let mut response = Response::ok("hello");
        let body = response.take_body();
        assert_eq!(&body[..], b"hello");
        assert!(response.body().is_empty());
        assert_eq!(response.header("content-length"), Some("5"));
    }

    #[test]
    fn method_not_allowed_carries_allow() {
        let response = Response::method_not_allowed("GET, POST");
        assert_eq!(response.status(), 405);
        assert_eq!(response.header("allow"), Some("GET, POST"));
    }

    #[test]
    fn set_cookie_appends_header() {
        let mut response = Response::no_content();
        response.set_cookie(&Cookie::new("session", "abc"));
        assert_eq!(response.header("set-cookie"), Some("session=abc; Path=/"));
    }
}
