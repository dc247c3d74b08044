//! Middleware as handler-wrapping composition.
//!
//! A middleware takes the downstream handler and returns a new handler
//! wrapped around it. The router composes its middleware list around the
//! matched handler at dispatch time, rightmost wrapping first, so the first
//! middleware added sees the request first.
//!
//! Stateful middleware ([`RateLimit`]) hold their state behind an `Arc` and
//! share it across every wrapped handler they produce; the same instance is
//! invoked concurrently from many connection tasks.

mod cors;
mod logger;
mod rate_limit;
mod recoverer;
mod request_id;
mod timeout;

pub use cors::Cors;
pub use logger::Logger;
pub use rate_limit::RateLimit;
pub use recoverer::Recoverer;
pub use request_id::RequestId;
pub use timeout::Timeout;

use rill_http::handler::Handler;
use std::sync::Arc;

pub trait Middleware: Send + Sync {
    /// Wraps `next`, producing the handler that will actually be invoked.
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler>;
}
