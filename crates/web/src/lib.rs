//! rill-web: a chi-style HTTP/1.1 server library.
//!
//! Routes are registered against a trie [`Router`], middleware stack around
//! matched handlers, and [`Server`] drives the accept loop on top of
//! rill-http's connection layer.
//!
//! ```no_run
//! use rill_web::{Request, Response, Router, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut router = Router::new();
//!     router.get("/hello/{name}", |req: Request| async move {
//!         Response::ok(format!("hello, {}", req.param("name").unwrap_or("world")))
//!     });
//!
//!     Server::builder()
//!         .router(router)
//!         .config(ServerConfig::new(8080))
//!         .build()
//!         .expect("router and config are set")
//!         .serve()
//!         .await
//! }
//! ```

mod config;
pub mod middleware;
mod router;
mod server;

pub use config::ServerConfig;
pub use router::{Route, Router};
pub use server::{Server, ServerBuildError, ServerBuilder, ServerHandle};

pub use rill_http::handler::Handler;
pub use rill_http::protocol::{Cookie, Method, Request, Response, SameSite};
