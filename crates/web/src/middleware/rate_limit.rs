use crate::middleware::Middleware;
use async_trait::async_trait;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Fixed-window rate limiting with one counter shared by every connection
/// going through this middleware instance. Over-quota requests are answered
/// with 429 and `Retry-After` set to the window length in seconds.
pub struct RateLimit {
    max_requests: u32,
    window: Duration,
    state: Arc<Mutex<Window>>,
}

struct Window {
    started_at: Instant,
    count: u32,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(Window { started_at: Instant::now(), count: 0 })),
        }
    }
}

struct RateLimitHandler {
    max_requests: u32,
    window: Duration,
    state: Arc<Mutex<Window>>,
    next: Arc<dyn Handler>,
}

impl Middleware for RateLimit {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(RateLimitHandler {
            max_requests: self.max_requests,
            window: self.window,
            state: self.state.clone(),
            next,
        })
    }
}

#[async_trait]
impl Handler for RateLimitHandler {
    async fn call(&self, request: Request) -> Response {
        {
            let mut window = self.state.lock().await;
            if window.started_at.elapsed() >= self.window {
                window.started_at = Instant::now();
                window.count = 0;
            }
            if window.count >= self.max_requests {
                warn!(max_requests = self.max_requests, "rate limit exceeded");
                return Response::too_many_requests(self.window.as_secs());
            }
            window.count += 1;
        }

        self.next.call(request).await
    }
}
