//! Request handler abstraction.
//!
//! A [`Handler`] consumes a request and produces a response. The trait is
//! object-safe so routers and middleware can store handlers as
//! `Arc<dyn Handler>`; plain async functions implement it via the blanket
//! impl, so `router.get("/", my_async_fn)` just works.

use crate::protocol::{Request, Response};
use async_trait::async_trait;
use std::future::Future;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request) -> Response;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn call(&self, request: Request) -> Response {
        (self)(request).await
    }
}
