use crate::middleware::Middleware;
use async_trait::async_trait;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Emits one line per handled request with method, path, status and elapsed
/// milliseconds.
pub struct Logger;

struct LoggerHandler {
    next: Arc<dyn Handler>,
}

impl Middleware for Logger {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(LoggerHandler { next })
    }
}

#[async_trait]
impl Handler for LoggerHandler {
    async fn call(&self, request: Request) -> Response {
        let method = request.method();
        let path = request.path().to_string();
        let start = Instant::now();

        let response = self.next.call(request).await;

        info!(
            method = %method,
            path = %path,
            status = response.status(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request handled"
        );
        response
    }
}
