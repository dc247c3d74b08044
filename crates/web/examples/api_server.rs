//! A small JSON-ish API showing route groups, the middleware stack, cookies
//! and graceful shutdown.

use rill_web::middleware::{Logger, RateLimit, Recoverer, RequestId, Timeout};
use rill_web::{Cookie, Request, Response, Router, SameSite, Server, ServerConfig};
use std::time::Duration;

async fn list_users(_req: Request) -> Response {
    Response::json(r#"[{"id":1,"name":"ada"},{"id":2,"name":"grace"}]"#)
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("0");
    Response::json(format!(r#"{{"id":{id}}}"#))
}

async fn create_user(req: Request) -> Response {
    Response::created(req.body().clone())
}

async fn login(_req: Request) -> Response {
    let mut response = Response::ok("logged in");
    response.set_cookie(
        &Cookie::new("session", "s3cr3t")
            .max_age(3600)
            .http_only()
            .same_site(SameSite::Lax),
    );
    response
}

async fn whoami(req: Request) -> Response {
    match req.cookie("session") {
        Some(_) => Response::ok("you are logged in"),
        None => Response::text(401, "no session"),
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let mut router = Router::new();
    router.middleware(Logger);
    router.middleware(RequestId);
    router.middleware(Recoverer);
    router.middleware(Timeout::new(Duration::from_secs(10)));
    router.middleware(RateLimit::new(100, Duration::from_secs(60)));

    router.route("/api/v1", |v1| {
        v1.get("/users", list_users);
        v1.post("/users", create_user);
        v1.get("/users/{id}", get_user);
    });
    router.post("/login", login);
    router.get("/whoami", whoami);
    router.get("/static/*", |req: Request| async move {
        Response::ok(format!("would serve {}", req.param("*").unwrap_or("/")))
    });

    let server = Server::builder()
        .router(router)
        .config(ServerConfig::new(8080).max_connections(256))
        .build()
        .expect("router and config are set");

    let handle = server.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.expect("install ctrl-c handler");
        handle.shutdown().await;
    });

    server.serve().await
}
