//! Route registration and dispatch.
//!
//! # Responsibilities
//! - Register handlers per lifecycle method and `use` middleware
//! - Mount other routers under a path prefix
//! - Resolve and run the handler chain for one event
//!
//! # Design Decisions
//! - Built once at startup, then shared via Arc (no locks while serving)
//! - The Router owns no side effects; handlers do

use std::future::Future;

use crate::error::Error;
use crate::net::connection::Socket;
use crate::routing::handler::{handler, BoxHandler, HandlerResult, Next};
use crate::routing::pattern::Pattern;
use crate::routing::request::{Method, Request};
use crate::routing::table::RouteTable;

/// Lifecycle event router.
#[derive(Clone, Debug, Default)]
pub struct Router {
    table: RouteTable,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain of handlers for one entry. `None` registers middleware.
    pub fn route(&mut self, method: Option<Method>, pattern: &str, handlers: Vec<BoxHandler>) -> &mut Self {
        self.table.register(method, Pattern::parse(pattern), handlers);
        self
    }

    pub fn connect<H, Fut>(&mut self, pattern: &str, h: H) -> &mut Self
    where
        H: Fn(Socket, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Connect), pattern, vec![handler(h)])
    }

    pub fn message<H, Fut>(&mut self, pattern: &str, h: H) -> &mut Self
    where
        H: Fn(Socket, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Message), pattern, vec![handler(h)])
    }

    pub fn close<H, Fut>(&mut self, pattern: &str, h: H) -> &mut Self
    where
        H: Fn(Socket, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Some(Method::Close), pattern, vec![handler(h)])
    }

    /// Register middleware for every event under `prefix`, any method.
    pub fn use_at<H, Fut>(&mut self, prefix: &str, h: H) -> &mut Self
    where
        H: Fn(Socket, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(None, prefix, vec![handler(h)])
    }

    /// Register middleware for every event.
    pub fn use_all<H, Fut>(&mut self, h: H) -> &mut Self
    where
        H: Fn(Socket, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.use_at("/", h)
    }

    /// Append every entry of `router` with its pattern prefixed by `prefix`.
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        let prefix = Pattern::parse(prefix);
        for entry in router.table.entries() {
            self.table.register(
                entry.method,
                entry.pattern.prefixed(&prefix),
                entry.handlers.clone(),
            );
        }
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Resolve the chain for `req` and run it.
    ///
    /// Returns `Handler` if any link in the chain fails. Returns `NoRouteFound`
    /// if no terminal entry matches, after running any matching middleware.
    pub async fn dispatch(&self, socket: Socket, req: Request) -> Result<(), Error> {
        let method = req.method();
        let resolved = self.table.find(method, req.path())?;
        let unrouted = (!resolved.terminal).then(|| req.path().to_string());
        tracing::trace!(
            connection_id = %socket.id(),
            method = %method,
            path = %req.path(),
            links = resolved.links.len(),
            terminal = resolved.terminal,
            "Dispatching"
        );

        Next::new(resolved.links, socket)
            .run(req)
            .await
            .map_err(Error::Handler)?;

        match unrouted {
            Some(path) => Err(Error::NoRouteFound { method, path }),
            None => Ok(()),
        }
    }
}
