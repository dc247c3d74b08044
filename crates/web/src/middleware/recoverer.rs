use crate::middleware::Middleware;
use async_trait::async_trait;
use futures::FutureExt;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;

/// Catches panics from downstream handlers and turns them into a 500
/// carrying the panic text. Without this middleware a panic reaches the
/// connection task, which logs it and closes the connection.
pub struct Recoverer;

struct RecovererHandler {
    next: Arc<dyn Handler>,
}

impl Middleware for Recoverer {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(RecovererHandler { next })
    }
}

#[async_trait]
impl Handler for RecovererHandler {
    async fn call(&self, request: Request) -> Response {
        match AssertUnwindSafe(self.next.call(request)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(cause = message, "handler panicked");
                Response::internal_error(format!("internal server error: {message}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use rill_http::protocol::Method;

    #[tokio::test]
    async fn panics_become_500_with_description() {
        let mut router = Router::new();
        router.middleware(Recoverer);
        router.get("/boom", |_request: Request| async { panic!("database exploded") });

        let response = router.dispatch(Request::builder().method(Method::Get).path("/boom").build()).await;
        assert_eq!(response.status(), 500);
        assert!(String::from_utf8_lossy(response.body()).contains("database exploded"));
    }

    #[tokio::test]
    async fn healthy_responses_pass_through() {
        let mut router = Router::new();
        router.middleware(Recoverer);
        router.get("/ok", |_request: Request| async { Response::ok("fine") });

        let response = router.dispatch(Request::builder().method(Method::Get).path("/ok").build()).await;
        assert_eq!(response.status(), 200);
        assert_eq!(&response.body()[..], b"fine");
    }
}
