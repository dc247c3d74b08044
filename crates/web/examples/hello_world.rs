use rill_web::{Request, Response, Router, Server, ServerConfig};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let mut router = Router::new();
    router.get("/", |_req: Request| async { Response::ok("hello world") });
    router.get("/hello/{name}", |req: Request| async move {
        Response::ok(format!("hello, {}!", req.param("name").unwrap_or("world")))
    });

    Server::builder()
        .router(router)
        .config(ServerConfig::new(8080))
        .build()
        .expect("router and config are set")
        .serve()
        .await
}
