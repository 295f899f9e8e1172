//! Process-wide tag → connection registry.
//!
//! # Responsibilities
//! - Bind an application tag to exactly one live connection
//! - Let any part of the application look a connection up by tag
//! - Drop the binding when the connection closes
//!
//! # Design Decisions
//! - DashMap entry API makes check-and-insert atomic per tag
//! - Locks are held for a single map operation, never across a handler
//! - Removal is keyed by connection id so a stale socket cannot evict a
//!   newer owner of the same tag
//! - A connection may own several tags when handlers call `register` directly

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::Error;
use crate::net::connection::Socket;
use crate::observability::metrics;

/// Concurrent tag → socket table.
#[derive(Default)]
pub struct TagRegistry {
    tags: DashMap<String, Socket>,
}

// Formatting a Socket takes its state lock; never do that under a shard lock.
impl std::fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagRegistry").field("len", &self.tags.len()).finish()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `tag` to `socket`.
    ///
    /// Binding a tag already held by the same connection is a no-op; a tag
    /// held by another connection fails with `TagConflict`.
    pub fn register(&self, tag: &str, socket: &Socket) -> Result<(), Error> {
        match self.tags.entry(tag.to_string()) {
            Entry::Occupied(existing) => {
                if existing.get().id() == socket.id() {
                    return Ok(());
                }
                tracing::warn!(
                    tag = %tag,
                    owner = %existing.get().id(),
                    connection_id = %socket.id(),
                    "Tag already bound to another connection"
                );
                metrics::record_tag_conflict();
                return Err(Error::TagConflict {
                    tag: tag.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(socket.clone());
            }
        }
        metrics::record_tagged(self.tags.len());
        Ok(())
    }

    /// Look up the live connection bound to `tag`.
    pub fn lookup(&self, tag: &str) -> Option<Socket> {
        self.tags.get(tag).map(|entry| entry.value().clone())
    }

    /// Remove every binding owned by `socket`. Idempotent.
    ///
    /// Keyed on the connection id rather than the socket's recorded tag, so
    /// bindings made through [`TagRegistry::register`] directly are released
    /// too, and a stale socket never evicts a newer owner.
    pub fn remove(&self, socket: &Socket) {
        let id = socket.id();
        let before = self.tags.len();
        self.tags.retain(|tag, owner| {
            let owned = owner.id() == id;
            if owned {
                tracing::debug!(connection_id = %id, tag = %tag, "Released tag");
            }
            !owned
        });

        let after = self.tags.len();
        if after == before {
            tracing::debug!(connection_id = %id, "Closing a connection with no bound tag");
        } else {
            metrics::record_tagged(after);
        }
    }

    /// Number of bound tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Snapshot of bound tags.
    pub fn tags(&self) -> Vec<String> {
        self.tags.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn socket_on(registry: &Arc<TagRegistry>) -> Socket {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        Socket::new(tx, Arc::clone(registry))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Arc::new(TagRegistry::new());
        let socket = socket_on(&registry);

        registry.register("user-42", &socket).unwrap();
        let found = registry.lookup("user-42").unwrap();
        assert!(found.same_connection(&socket));
        assert!(registry.lookup("user-43").is_none());
        assert_eq!(registry.tags(), vec!["user-42".to_string()]);
    }

    #[test]
    fn test_conflict_keeps_first_owner() {
        let registry = Arc::new(TagRegistry::new());
        let c1 = socket_on(&registry);
        let c2 = socket_on(&registry);

        registry.register("t", &c1).unwrap();
        let err = registry.register("t", &c2).unwrap_err();
        assert!(matches!(err, Error::TagConflict { ref tag } if tag == "t"));

        assert!(registry.lookup("t").unwrap().same_connection(&c1));
    }

    #[test]
    fn test_same_connection_reregister_is_noop() {
        let registry = Arc::new(TagRegistry::new());
        let socket = socket_on(&registry);

        registry.register("t", &socket).unwrap();
        registry.register("t", &socket).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_releases_tag() {
        let registry = Arc::new(TagRegistry::new());
        let socket = socket_on(&registry);
        socket.set_tag("user-42").unwrap();

        registry.remove(&socket);
        assert!(registry.lookup("user-42").is_none());
        assert!(registry.is_empty());

        // Idempotent
        registry.remove(&socket);
    }

    #[test]
    fn test_remove_releases_direct_registrations() {
        let registry = Arc::new(TagRegistry::new());
        let socket = socket_on(&registry);
        registry.register("user-42", &socket).unwrap();
        registry.register("user-42-admin", &socket).unwrap();
        assert_eq!(socket.tag(), None);

        registry.remove(&socket);
        assert!(registry.lookup("user-42").is_none());
        assert!(registry.is_empty());

        let next = socket_on(&registry);
        registry.register("user-42", &next).unwrap();
        assert!(registry.lookup("user-42").unwrap().same_connection(&next));
    }

    #[test]
    fn test_remove_untagged_is_noop() {
        let registry = Arc::new(TagRegistry::new());
        let tagged = socket_on(&registry);
        let untagged = socket_on(&registry);
        tagged.set_tag("keep").unwrap();

        registry.remove(&untagged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_socket_does_not_evict_new_owner() {
        let registry = Arc::new(TagRegistry::new());
        let old = socket_on(&registry);
        old.set_tag("session").unwrap();
        registry.remove(&old);

        let new = socket_on(&registry);
        new.set_tag("session").unwrap();

        registry.remove(&old);
        assert!(registry.lookup("session").unwrap().same_connection(&new));
    }

    #[test]
    fn test_concurrent_register_single_winner() {
        let registry = Arc::new(TagRegistry::new());
        let sockets: Vec<Socket> = (0..16).map(|_| socket_on(&registry)).collect();

        let handles: Vec<_> = sockets
            .iter()
            .cloned()
            .map(|socket| std::thread::spawn(move || socket.set_tag("dup")))
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(Error::TagConflict { .. })))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(conflicts, sockets.len() - 1);

        let owner = registry.lookup("dup").unwrap();
        assert_eq!(owner.tag().as_deref(), Some("dup"));
    }
}
