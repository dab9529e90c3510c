use std::hash::Hash;

use dashmap::DashMap;
use uuid::Uuid;

/// Live push connections and their (possibly absent) bound user identity.
///
/// A connection is Open/Unbound from `register` until an auth frame binds
/// it; `unregister` removes it from either state. One user may hold many
/// connections (tabs, devices). Generic over the connection-id type so the
/// state machine can be exercised without real sockets; production uses
/// `PushRegistry` from the parent module.
///
/// Owned by `AppState` rather than living in a module-level global, so
/// independent server instances (and tests) each get their own registry.
pub struct ConnectionRegistry<C: Copy + Eq + Hash> {
    connections: DashMap<C, Option<Uuid>>,
}

impl<C: Copy + Eq + Hash> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Track a freshly opened connection with no identity yet.
    pub fn register(&self, conn: C) {
        self.connections.insert(conn, None);
    }

    /// Associate a connection with a user. Binding a connection that was
    /// never registered registers it implicitly. Rebinding replaces the
    /// prior identity; the previous one is returned so callers can log it.
    pub fn bind(&self, conn: C, user_id: Uuid) -> Option<Uuid> {
        self.connections.insert(conn, Some(user_id)).flatten()
    }

    /// Drop a connection in any state. Returns whether it was tracked.
    pub fn unregister(&self, conn: C) -> bool {
        self.connections.remove(&conn).is_some()
    }

    pub fn user_of(&self, conn: C) -> Option<Uuid> {
        self.connections.get(&conn).and_then(|entry| *entry.value())
    }

    /// Whether the user has at least one live bound connection. The
    /// registry is the liveness source of truth; room membership only
    /// addresses delivery. Dispatch gates on this so the two never drift.
    pub fn is_user_connected(&self, user_id: Uuid) -> bool {
        self.connections
            .iter()
            .any(|entry| *entry.value() == Some(user_id))
    }

    /// Every live connection bound to this user.
    pub fn connections_for(&self, user_id: Uuid) -> Vec<C> {
        self.connections
            .iter()
            .filter(|entry| *entry.value() == Some(user_id))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Every bound connection with its user, for broadcast fan-out.
    /// Unbound connections are excluded; they have no one to count for.
    pub fn all_bound(&self) -> Vec<(C, Uuid)> {
        self.connections
            .iter()
            .filter_map(|entry| entry.value().map(|user_id| (*entry.key(), user_id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<C: Copy + Eq + Hash> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_bind_then_unregister() {
        let registry: ConnectionRegistry<u32> = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        registry.register(1);
        assert_eq!(registry.user_of(1), None);
        assert!(registry.all_bound().is_empty());

        registry.bind(1, user);
        assert_eq!(registry.user_of(1), Some(user));
        assert_eq!(registry.all_bound(), vec![(1, user)]);

        assert!(registry.unregister(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn bind_without_register_is_implicit_register() {
        let registry: ConnectionRegistry<u32> = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        assert_eq!(registry.bind(7, user), None);
        assert_eq!(registry.user_of(7), Some(user));
    }

    #[test]
    fn is_user_connected_tracks_bound_state_only() {
        let registry: ConnectionRegistry<u32> = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        registry.register(1);
        assert!(!registry.is_user_connected(user));

        registry.bind(1, user);
        assert!(registry.is_user_connected(user));

        registry.unregister(1);
        assert!(!registry.is_user_connected(user));
    }

    #[test]
    fn multiple_connections_per_user() {
        let registry: ConnectionRegistry<u32> = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        registry.bind(1, user);
        registry.bind(2, user);
        registry.bind(3, other);
        assert_eq!(registry.len(), 3);

        let mut conns = registry.connections_for(user);
        conns.sort_unstable();
        assert_eq!(conns, vec![1, 2]);
        assert_eq!(registry.connections_for(other), vec![3]);
    }

    #[test]
    fn rebind_replaces_and_returns_previous_identity() {
        let registry: ConnectionRegistry<u32> = ConnectionRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        registry.bind(1, first);
        assert_eq!(registry.bind(1, second), Some(first));
        assert_eq!(registry.user_of(1), Some(second));
        assert!(registry.connections_for(first).is_empty());
    }

    #[test]
    fn unbound_connection_is_still_removable() {
        let registry: ConnectionRegistry<u32> = ConnectionRegistry::new();
        registry.register(9);
        assert!(registry.unregister(9));
        assert!(!registry.unregister(9));
    }
}
