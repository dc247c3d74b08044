//! Trie-based request router.
//!
//! Patterns are split into `/`-separated segments; each segment is a literal,
//! a `{name}` parameter capture, or a terminal `*` catch-all. Nodes live in a
//! flat pool addressed by index, root at index 0, so the trie has no cyclic
//! ownership and can be walked or cloned freely.
//!
//! Lookup precedence at every node is strict: literal child first, then the
//! parameter child, then the catch-all, with backtracking between them. A
//! path that matches some route but not the requested method produces a 405
//! carrying an `Allow` header; nothing matching produces a 404. On those two
//! misses the middleware chain is deliberately bypassed.

use crate::middleware::Middleware;
use rill_http::handler::Handler;
use rill_http::protocol::{Method, Request, Response};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// One trie node in the pool.
struct Node {
    handlers: BTreeMap<Method, Arc<dyn Handler>>,
    literals: Vec<(String, usize)>,
    param: Option<(String, usize)>,
    catch_all: Option<BTreeMap<Method, Arc<dyn Handler>>>,
}

impl Node {
    fn new() -> Self {
        Self { handlers: BTreeMap::new(), literals: Vec::new(), param: None, catch_all: None }
    }
}

/// One registered route, reconstructed from the trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub pattern: String,
}

enum Lookup {
    Found { handler: Arc<dyn Handler>, params: HashMap<String, String> },
    MethodMiss { allow: String },
    NotFound,
}

/// chi-style router: pattern registration, middleware stacking and dispatch.
///
/// Registration happens during setup through `&mut self`; dispatch only needs
/// `&self` and is safe to call from any number of connection tasks.
pub struct Router {
    nodes: Vec<Node>,
    middlewares: Vec<Arc<dyn Middleware>>,
    prefix: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { nodes: vec![Node::new()], middlewares: Vec::new(), prefix: String::new() }
    }

    /// Registers `handler` for `method` under `pattern` (the router's prefix
    /// is prepended). Re-registering the same method at the same terminal
    /// silently overwrites.
    pub fn register<H: Handler + 'static>(&mut self, method: Method, pattern: &str, handler: H) {
        self.register_arc(method, pattern, Arc::new(handler));
    }

    pub fn get<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(Method::Get, pattern, handler);
    }

    pub fn post<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(Method::Post, pattern, handler);
    }

    pub fn put<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(Method::Put, pattern, handler);
    }

    pub fn delete<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(Method::Delete, pattern, handler);
    }

    pub fn patch<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(Method::Patch, pattern, handler);
    }

    pub fn head<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(Method::Head, pattern, handler);
    }

    pub fn options<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(Method::Options, pattern, handler);
    }

    /// Runs `f` against a derived handle whose prefix is this router's prefix
    /// extended by `prefix`. The derived handle shares the node pool and the
    /// middleware list; registrations through it write into the shared pool.
    pub fn route<F: FnOnce(&mut Router)>(&mut self, prefix: &str, f: F) {
        let saved_len = self.prefix.len();
        self.prefix.push_str(prefix);
        f(self);
        self.prefix.truncate(saved_len);
    }

    /// Appends a middleware. The first middleware added is the outermost:
    /// it sees the request first and the response last.
    pub fn middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    fn register_arc(&mut self, method: Method, pattern: &str, handler: Arc<dyn Handler>) {
        let full_pattern = format!("{}{}", self.prefix, pattern);
        let segments: Vec<&str> = full_pattern.split('/').filter(|segment| !segment.is_empty()).collect();

        let mut node = 0usize;
        for segment in segments {
            if segment == "*" {
                self.nodes[node].catch_all.get_or_insert_with(BTreeMap::new).insert(method, handler);
                return;
            }

            if let Some(name) = param_name(segment) {
                node = match self.nodes[node].param {
                    // an existing parameter edge keeps its original name
                    Some((_, child)) => child,
                    None => {
                        let child = self.push_node();
                        self.nodes[node].param = Some((name.to_string(), child));
                        child
                    }
                };
            } else {
                let existing = self.nodes[node]
                    .literals
                    .iter()
                    .find(|(literal, _)| literal == segment)
                    .map(|&(_, child)| child);
                node = match existing {
                    Some(child) => child,
                    None => {
                        let child = self.push_node();
                        self.nodes[node].literals.push((segment.to_string(), child));
                        child
                    }
                };
            }
        }

        self.nodes[node].handlers.insert(method, handler);
    }

    fn push_node(&mut self) -> usize {
        self.nodes.push(Node::new());
        self.nodes.len() - 1
    }

    /// Looks up the route for `request`, fills its params and runs the
    /// middleware-wrapped handler. 404/405 short-circuit before the
    /// middleware chain.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        match self.lookup(request.method(), request.path()) {
            Lookup::Found { handler, params } => {
                request.set_params(params);
                let mut composed = handler;
                for middleware in self.middlewares.iter().rev() {
                    composed = middleware.wrap(composed);
                }
                composed.call(request).await
            }
            Lookup::MethodMiss { allow } => Response::method_not_allowed(&allow),
            Lookup::NotFound => Response::not_found(),
        }
    }

    fn lookup(&self, method: Method, path: &str) -> Lookup {
        let path = if path != "/" && path.ends_with('/') { &path[..path.len() - 1] } else { path };
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();

        let mut params = Vec::new();
        let mut allowed = BTreeSet::new();
        match self.search(0, &segments, 0, method, &mut params, &mut allowed) {
            Some(handler) => Lookup::Found { handler, params: params.into_iter().collect() },
            None if !allowed.is_empty() => {
                let mut methods: Vec<Method> = allowed.into_iter().collect();
                if methods.contains(&Method::Get) && !methods.contains(&Method::Head) {
                    methods.push(Method::Head);
                }
                let allow = methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                Lookup::MethodMiss { allow }
            }
            None => Lookup::NotFound,
        }
    }

    /// Depth-first match with backtracking. `allowed` accumulates the methods
    /// of every terminal the path reaches, for the 405 `Allow` header.
    fn search(
        &self,
        node_index: usize,
        segments: &[&str],
        position: usize,
        method: Method,
        params: &mut Vec<(String, String)>,
        allowed: &mut BTreeSet<Method>,
    ) -> Option<Arc<dyn Handler>> {
        let node = &self.nodes[node_index];

        if position == segments.len() {
            allowed.extend(node.handlers.keys().copied());
            if let Some(handler) = method_lookup(&node.handlers, method) {
                return Some(handler);
            }
        } else {
            let segment = segments[position];

            let literal_child = node
                .literals
                .iter()
                .find(|(literal, _)| literal == segment)
                .map(|&(_, child)| child);
            if let Some(child) = literal_child {
                if let Some(handler) = self.search(child, segments, position + 1, method, params, allowed) {
                    return Some(handler);
                }
            }

            if let Some((name, child)) = &node.param {
                params.push((name.clone(), segment.to_string()));
                if let Some(handler) = self.search(*child, segments, position + 1, method, params, allowed) {
                    return Some(handler);
                }
                params.pop();
            }
        }

        if let Some(catch_all) = &node.catch_all {
            allowed.extend(catch_all.keys().copied());
            if let Some(handler) = method_lookup(catch_all, method) {
                let remainder = if position >= segments.len() {
                    "/".to_string()
                } else {
                    format!("/{}", segments[position..].join("/"))
                };
                params.push(("*".to_string(), remainder));
                return Some(handler);
            }
        }

        None
    }

    /// Every registered (pattern, method) pair, depth-first in edge-insertion
    /// order. Intended for startup logging and debugging.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes = Vec::new();
        self.walk(0, String::new(), &mut routes);
        routes
    }

    fn walk(&self, node_index: usize, pattern: String, routes: &mut Vec<Route>) {
        let node = &self.nodes[node_index];

        let display = if pattern.is_empty() { "/" } else { pattern.as_str() };
        for method in node.handlers.keys() {
            routes.push(Route { method: *method, pattern: display.to_string() });
        }
        if let Some(catch_all) = &node.catch_all {
            for method in catch_all.keys() {
                routes.push(Route { method: *method, pattern: format!("{pattern}/*") });
            }
        }

        for (literal, child) in &node.literals {
            self.walk(*child, format!("{pattern}/{literal}"), routes);
        }
        if let Some((name, child)) = &node.param {
            self.walk(*child, format!("{pattern}/{{{name}}}"), routes);
        }
    }
}

fn param_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')).filter(|name| !name.is_empty())
}

fn method_lookup(handlers: &BTreeMap<Method, Arc<dyn Handler>>, method: Method) -> Option<Arc<dyn Handler>> {
    if let Some(handler) = handlers.get(&method) {
        return Some(handler.clone());
    }
    // HEAD falls back to the GET handler; the connection strips the body
    if method == Method::Head {
        return handlers.get(&Method::Get).cloned();
    }
    None
}

#[async_trait::async_trait]
impl Handler for Router {
    async fn call(&self, request: Request) -> Response {
        self.dispatch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &'static str) -> impl Handler {
        move |_request: Request| async move { Response::ok(name) }
    }

    fn request(method: Method, path: &str) -> Request {
        Request::builder().method(method).path(path).build()
    }

    async fn body_of(router: &Router, method: Method, path: &str) -> String {
        let response = router.dispatch(request(method, path)).await;
        String::from_utf8(response.body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn static_routes_dispatch_by_method() {
        let mut router = Router::new();
        router.get("/resource", tag("get"));
        router.post("/resource", tag("post"));

        assert_eq!(body_of(&router, Method::Get, "/resource").await, "get");
        assert_eq!(body_of(&router, Method::Post, "/resource").await, "post");
    }

    #[tokio::test]
    async fn literal_beats_parameter() {
        let mut router = Router::new();
        router.get("/a/{id}", tag("param"));
        router.get("/a/x", tag("literal"));

        assert_eq!(body_of(&router, Method::Get, "/a/x").await, "literal");
        assert_eq!(body_of(&router, Method::Get, "/a/y").await, "param");
    }

    #[tokio::test]
    async fn parameter_values_are_captured() {
        let mut router = Router::new();
        router.get("/users/{id}/posts/{post}", |request: Request| async move {
            Response::ok(format!(
                "{}:{}",
                request.param("id").unwrap_or(""),
                request.param("post").unwrap_or("")
            ))
        });

        assert_eq!(body_of(&router, Method::Get, "/users/42/posts/7").await, "42:7");
    }

    #[tokio::test]
    async fn backtracks_from_literal_dead_end() {
        let mut router = Router::new();
        router.get("/files/special/x", tag("deep-literal"));
        router.get("/files/{name}", tag("param"));

        // "special" exists as a literal child but has no terminal for this
        // shape, so the search falls back to the parameter edge
        assert_eq!(body_of(&router, Method::Get, "/files/special").await, "param");
    }

    #[tokio::test]
    async fn catch_all_captures_remainder() {
        let mut router = Router::new();
        router.get("/static/*", |request: Request| async move {
            Response::ok(request.param("*").unwrap_or("").to_string())
        });

        assert_eq!(body_of(&router, Method::Get, "/static/css/style.css").await, "/css/style.css");
        assert_eq!(body_of(&router, Method::Get, "/static").await, "/");
    }

    #[tokio::test]
    async fn catch_all_yields_to_literal_and_param() {
        let mut router = Router::new();
        router.get("/a/*", tag("wild"));
        router.get("/a/{id}", tag("param"));
        router.get("/a/x", tag("literal"));

        assert_eq!(body_of(&router, Method::Get, "/a/x").await, "literal");
        assert_eq!(body_of(&router, Method::Get, "/a/y").await, "param");
        assert_eq!(body_of(&router, Method::Get, "/a/y/z").await, "wild");
    }

    #[tokio::test]
    async fn method_miss_is_405_with_allow() {
        let mut router = Router::new();
        router.get("/resource", tag("get"));
        router.post("/resource", tag("post"));

        let response = router.dispatch(request(Method::Delete, "/resource")).await;
        assert_eq!(response.status(), 405);
        let allow = response.header("allow").unwrap();
        assert!(allow.contains("GET"));
        assert!(allow.contains("POST"));
        assert!(allow.contains("HEAD"));
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let mut router = Router::new();
        router.get("/known", tag("known"));

        let response = router.dispatch(request(Method::Get, "/unknown")).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn head_falls_back_to_get() {
        let mut router = Router::new();
        router.get("/page", tag("page"));

        let response = router.dispatch(request(Method::Head, "/page")).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn trailing_slash_is_normalized() {
        let mut router = Router::new();
        router.get("/a/b", tag("ab"));

        assert_eq!(body_of(&router, Method::Get, "/a/b/").await, "ab");
        assert_eq!(body_of(&router, Method::Get, "/a/b").await, "ab");
    }

    #[tokio::test]
    async fn root_route_matches() {
        let mut router = Router::new();
        router.get("/", tag("root"));

        assert_eq!(body_of(&router, Method::Get, "/").await, "root");
    }

    #[tokio::test]
    async fn groups_inherit_and_extend_the_prefix() {
        let mut router = Router::new();
        router.route("/api", |api| {
            api.get("/health", tag("health"));
            api.route("/v1", |v1| {
                v1.get("/users", tag("users"));
            });
            api.get("/other", tag("other"));
        });
        router.get("/top", tag("top"));

        assert_eq!(body_of(&router, Method::Get, "/api/health").await, "health");
        assert_eq!(body_of(&router, Method::Get, "/api/v1/users").await, "users");
        assert_eq!(body_of(&router, Method::Get, "/api/other").await, "other");
        assert_eq!(body_of(&router, Method::Get, "/top").await, "top");
    }

    #[tokio::test]
    async fn reregistration_overwrites() {
        let mut router = Router::new();
        router.get("/x", tag("first"));
        router.get("/x", tag("second"));

        assert_eq!(body_of(&router, Method::Get, "/x").await, "second");
    }

    #[tokio::test]
    async fn param_name_clash_keeps_existing_name() {
        let mut router = Router::new();
        router.get("/u/{id}", |request: Request| async move {
            Response::ok(request.param("id").unwrap_or("missing").to_string())
        });
        router.post("/u/{uid}", |request: Request| async move {
            Response::ok(request.param("id").unwrap_or("missing").to_string())
        });

        // the second registration reuses the existing edge, so the capture
        // still lands under "id"
        assert_eq!(body_of(&router, Method::Post, "/u/77").await, "77");
    }

    #[tokio::test]
    async fn dispatch_is_deterministic() {
        let mut router = Router::new();
        router.get("/a/{id}", tag("param"));
        router.get("/a/x", tag("literal"));

        for _ in 0..16 {
            assert_eq!(body_of(&router, Method::Get, "/a/x").await, "literal");
        }
    }

    #[tokio::test]
    async fn routes_enumerates_patterns() {
        let mut router = Router::new();
        router.get("/", tag("root"));
        router.get("/a/b", tag("ab"));
        router.post("/a/{id}", tag("aid"));
        router.get("/static/*", tag("files"));

        let routes = router.routes();
        assert!(routes.contains(&Route { method: Method::Get, pattern: "/".to_string() }));
        assert!(routes.contains(&Route { method: Method::Get, pattern: "/a/b".to_string() }));
        assert!(routes.contains(&Route { method: Method::Post, pattern: "/a/{id}".to_string() }));
        assert!(routes.contains(&Route { method: Method::Get, pattern: "/static/*".to_string() }));
        assert_eq!(routes.len(), 4);
    }
}
