//! Ordered route table.
//!
//! # Responsibilities
//! - Store (method, pattern, handler chain) entries in registration order
//! - Resolve an event to `use` middleware followed by at most one terminal entry
//!
//! # Design Decisions
//! - Linear scan; route counts are small and order is the tie-break
//! - Terminal entries need an exact method and a full path match
//! - `use` entries are method-agnostic prefix matches

use crate::error::Error;
use crate::routing::handler::BoxHandler;
use crate::routing::pattern::{Params, Pattern};
use crate::routing::request::Method;

/// A registered binding. `method == None` marks a `use` entry.
#[derive(Clone)]
pub struct RouteEntry {
    pub method: Option<Method>,
    pub pattern: Pattern,
    pub handlers: Vec<BoxHandler>,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.to_string())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// One resolved step of a handler chain.
#[derive(Clone)]
pub struct ChainLink {
    pub handler: BoxHandler,
    /// Parameters bound by the entry this handler belongs to.
    pub params: Params,
}

/// A resolved chain. `terminal` is false when only `use` entries matched.
#[derive(Clone)]
pub struct Resolved {
    pub links: Vec<ChainLink>,
    pub terminal: bool,
}

/// Route entries in registration order.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Entries with no handlers are ignored.
    pub fn register(&mut self, method: Option<Method>, pattern: Pattern, handlers: Vec<BoxHandler>) {
        if handlers.is_empty() {
            tracing::warn!(pattern = %pattern, "Ignoring route registered without handlers");
            return;
        }
        self.entries.push(RouteEntry {
            method,
            pattern,
            handlers,
        });
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the handler chain for an event.
    ///
    /// Returns every matching `use` entry registered before the first matching
    /// terminal entry, followed by that entry's handlers. Without a terminal
    /// match the chain is every matching `use` entry; `NoRouteFound` only when
    /// nothing matched at all.
    pub fn find(&self, method: Method, path: &str) -> Result<Resolved, Error> {
        let mut chain = Vec::new();

        for entry in &self.entries {
            match entry.method {
                None => {
                    if let Some(params) = entry.pattern.match_prefix(path) {
                        push_links(&mut chain, entry, params);
                    }
                }
                Some(m) if m == method => {
                    if let Some(params) = entry.pattern.match_exact(path) {
                        push_links(&mut chain, entry, params);
                        return Ok(Resolved {
                            links: chain,
                            terminal: true,
                        });
                    }
                }
                Some(_) => {}
            }
        }

        if !chain.is_empty() {
            return Ok(Resolved {
                links: chain,
                terminal: false,
            });
        }

        Err(Error::NoRouteFound {
            method,
            path: path.to_string(),
        })
    }
}

fn push_links(chain: &mut Vec<ChainLink>, entry: &RouteEntry, params: Params) {
    chain.extend(entry.handlers.iter().map(|handler| ChainLink {
        handler: handler.clone(),
        params: params.clone(),
    }));
}
