use crate::middleware::Middleware;
use async_trait::async_trait;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Bounds the downstream handler to a deadline. On expiry the client gets a
/// 504 and the downstream future is dropped, cancelling its work at the next
/// suspension point; the connection itself stays usable.
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

struct TimeoutHandler {
    duration: Duration,
    next: Arc<dyn Handler>,
}

impl Middleware for Timeout {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(TimeoutHandler { duration: self.duration, next })
    }
}

#[async_trait]
impl Handler for TimeoutHandler {
    async fn call(&self, request: Request) -> Response {
        let method = request.method();
        let path = request.path().to_string();

        match tokio::time::timeout(self.duration, self.next.call(request)).await {
            Ok(response) => response,
            Err(_elapsed) => {
                warn!(method = %method, path = %path, timeout_ms = self.duration.as_millis() as u64, "handler deadline elapsed");
                Response::gateway_timeout()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use rill_http::protocol::Method;

    fn router(timeout: Timeout) -> Router {
        let mut router = Router::new();
        router.middleware(timeout);
        router.get("/fast", |_request: Request| async { Response::ok("fast") });
        router.get("/slow", |_request: Request| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Response::ok("slow")
        });
        router
    }

    #[tokio::test]
    async fn fast_handlers_pass_through() {
        let router = router(Timeout::new(Duration::from_millis(100)));
        let request = Request::builder().method(Method::Get).path("/fast").build();

        let response = router.dispatch(request).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn slow_handlers_produce_504() {
        let router = router(Timeout::new(Duration::from_millis(20)));
        let request = Request::builder().method(Method::Get).path("/slow").build();

        let response = router.dispatch(request).await;
        assert_eq!(response.status(), 504);
    }
}
