use crate::middleware::Middleware;
use async_trait::async_trait;
use rill_http::handler::Handler;
use rill_http::protocol::{Method, Request, Response};
use std::sync::Arc;
use std::time::Duration;

/// Cross-origin resource sharing.
///
/// OPTIONS requests short-circuit with a 204 preflight answer; every other
/// method runs downstream and gets the origin decision appended. The origin
/// decision: a configured `*` always wins, a listed origin is echoed back,
/// anything else gets no CORS header at all.
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Duration,
}

impl Default for Cors {
    fn default() -> Self {
        Self::new()
    }
}

impl Cors {
    pub fn new() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: Method::ALL.iter().map(|method| method.as_str().to_string()).collect(),
            allowed_headers: vec!["Content-Type".to_string()],
            allow_credentials: false,
            max_age: Duration::from_secs(86_400),
        }
    }

    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn origin_decision(&self, request: &Request) -> Option<String> {
        if self.allowed_origins.iter().any(|origin| origin == "*") {
            return Some("*".to_string());
        }
        let origin = request.header("origin")?;
        if self.allowed_origins.iter().any(|allowed| allowed == origin) {
            Some(origin.to_string())
        } else {
            None
        }
    }

    fn apply_origin(&self, response: &mut Response, decision: Option<String>) {
        if let Some(origin) = decision {
            response.append_header("Access-Control-Allow-Origin", origin);
        }
        if self.allow_credentials {
            response.append_header("Access-Control-Allow-Credentials", "true");
        }
    }
}

struct CorsHandler {
    config: Cors,
    next: Arc<dyn Handler>,
}

impl Middleware for Cors {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(CorsHandler { config: self.clone(), next })
    }
}

#[async_trait]
impl Handler for CorsHandler {
    async fn call(&self, request: Request) -> Response {
        let decision = self.config.origin_decision(&request);

        if request.method() == Method::Options {
            let mut response = Response::no_content();
            response.append_header("Access-Control-Allow-Methods", self.config.allowed_methods.join(", "));
            response.append_header("Access-Control-Allow-Headers", self.config.allowed_headers.join(", "));
            response.append_header("Access-Control-Max-Age", self.config.max_age.as_secs().to_string());
            self.config.apply_origin(&mut response, decision);
            return response;
        }

        let mut response = self.next.call(request).await;
        self.config.apply_origin(&mut response, decision);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;

    fn cors_router(cors: Cors) -> Router {
        let mut router = Router::new();
        router.middleware(cors);
        router.get("/data", |_request: Request| async { Response::ok("data") });
        router.options("/data", |_request: Request| async { Response::ok("never reached") });
        router
    }

    #[tokio::test]
    async fn preflight_short_circuits_with_204() {
        let router = cors_router(Cors::new());
        let request = Request::builder().method(Method::Options).path("/data").build();

        let response = router.dispatch(request).await;
        assert_eq!(response.status(), 204);
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        assert!(response.header("access-control-allow-methods").unwrap().contains("GET"));
        assert_eq!(response.header("access-control-max-age"), Some("86400"));
    }

    #[tokio::test]
    async fn listed_origin_is_echoed() {
        let router = cors_router(Cors::new().allowed_origins(["https://app.example"]));
        let request = Request::builder()
            .method(Method::Get)
            .path("/data")
            .header("Origin", "https://app.example")
            .build();

        let response = router.dispatch(request).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.header("access-control-allow-origin"), Some("https://app.example"));
    }

    #[tokio::test]
    async fn unlisted_origin_gets_no_cors_header() {
        let router = cors_router(Cors::new().allowed_origins(["https://app.example"]));
        let request = Request::builder()
            .method(Method::Get)
            .path("/data")
            .header("Origin", "https://evil.example")
            .build();

        let response = router.dispatch(request).await;
        assert_eq!(response.header("access-control-allow-origin"), None);
    }

    #[tokio::test]
    async fn credentials_flag_adds_header() {
        let router = cors_router(Cors::new().allow_credentials(true));
        let request = Request::builder().method(Method::Get).path("/data").build();

        let response = router.dispatch(request).await;
        assert_eq!(response.header("access-control-allow-credentials"), Some("true"));
    }
}
