use crate::middleware::Middleware;
use async_trait::async_trait;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Tags every response with an `X-Request-Id`: the one the client sent, or a
/// synthesized `req-<nanos>` when the request carried none.
pub struct RequestId;

struct RequestIdHandler {
    next: Arc<dyn Handler>,
}

impl Middleware for RequestId {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(RequestIdHandler { next })
    }
}

#[async_trait]
impl Handler for RequestIdHandler {
    async fn call(&self, request: Request) -> Response {
        let id = match request.header("x-request-id") {
            Some(id) => id.to_string(),
            None => {
                let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
                format!("req-{nanos}")
            }
        };

        let mut response = self.next.call(request).await;
        response.append_header("X-Request-Id", id);
        response
    }
}
