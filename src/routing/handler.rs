//! Handler trait and explicit chain hand-off.
//!
//! A handler receives the connection handle, the request and a [`Next`].
//! Calling [`Next::run`] passes the request to the following link; returning
//! without calling it ends the chain for this event.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::net::connection::Socket;
use crate::routing::request::Request;
use crate::routing::table::ChainLink;

/// Result returned by every handler.
pub type HandlerResult = Result<(), BoxError>;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// A lifecycle event handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, socket: Socket, req: Request, next: Next) -> BoxFuture<HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Socket, Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, socket: Socket, req: Request, next: Next) -> BoxFuture<HandlerResult> {
        Box::pin(self(socket, req, next))
    }
}

/// Box a closure or handler for multi-handler registration.
pub fn handler<H: Handler>(h: H) -> BoxHandler {
    Arc::new(h)
}

/// The remainder of a handler chain.
pub struct Next {
    chain: Arc<[ChainLink]>,
    index: usize,
    socket: Socket,
}

impl Next {
    pub(crate) fn new(chain: Vec<ChainLink>, socket: Socket) -> Self {
        Self {
            chain: chain.into(),
            index: 0,
            socket,
        }
    }

    /// Run the next link with `req`.
    pub async fn run(self, mut req: Request) -> HandlerResult {
        let Some(link) = self.chain.get(self.index) else {
            tracing::debug!(
                connection_id = %self.socket.id(),
                method = %req.method(),
                path = %req.path(),
                "End of handler chain reached"
            );
            return Ok(());
        };

        req.set_params(link.params.clone());
        let handler = Arc::clone(&link.handler);
        let next = Next {
            chain: Arc::clone(&self.chain),
            index: self.index + 1,
            socket: self.socket.clone(),
        };
        handler.call(self.socket, req, next).await
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("len", &self.chain.len())
            .finish()
    }
}
