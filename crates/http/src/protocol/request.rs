use crate::protocol::Method;
use bytes::Bytes;
use std::collections::HashMap;

/// A fully materialized HTTP request.
///
/// The path is always percent-decoded and normalized before a `Request` is
/// constructed. Headers keep their wire order and original case; lookup by
/// name is case-insensitive and returns the first occurrence.
///
/// `params` is filled by the router after a successful match. `ctx` is the
/// request-scoped string map middleware and handlers communicate through.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    ctx: HashMap<String, String>,
}

impl Request {
    pub(crate) fn from_parts(
        method: Method,
        path: String,
        headers: Vec<(String, String)>,
        query: HashMap<String, String>,
        body: Bytes,
    ) -> Self {
        Self { method, path, headers, body, params: HashMap::new(), query, ctx: HashMap::new() }
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The decoded, normalized request path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All headers in wire order, original case preserved.
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

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A path parameter captured by the matched route pattern.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A query-string value. Duplicate keys kept the last value.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// A request-scoped context value set by upstream middleware.
    pub fn ctx(&self, key: &str) -> Option<&str> {
        self.ctx.get(key).map(String::as_str)
    }

    /// Returns the request with `key` set in its context map.
    pub fn with_ctx(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.insert(key.into(), value.into());
        self
    }

    /// Replaces the extracted path parameters. Routers call this after a
    /// successful match, before invoking the handler chain.
    pub fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Reads a request cookie by name, first occurrence wins. The value is
    /// everything after the first `=` of the matching entry.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let header = self.header("cookie")?;
        for entry in header.split(';') {
            let entry = entry.trim_start();
            if let Some((cookie_name, value)) = entry.split_once('=') {
                if cookie_name == name {
                    return Some(value);
                }
            }
        }
        None
    }
}

/// Builds a [`Request`] by hand, mainly for handlers under test and for
/// dispatching synthetic requests.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    query: HashMap<String, String>,
}

impl RequestBuilder {
    fn new() -> Self {
        Self { method: None, path: "/".to_string(), ..Default::default() }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// The path is taken as-is; callers are expected to pass a normalized one.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        Request::from_parts(
            self.method.unwrap_or(Method::Get),
            self.path,
            self.headers,
            self.query,
            self.body,
        )
    }
}
