//! External collaborator traits (spec §6).
//!
//! Everything the tunnel daemon needs from the host environment — a TUN/TAP
//! device, a routing/firewall policy, a persistence backend and a user
//! directory — is expressed as a trait here rather than a concrete
//! implementation, so the engine crates can be exercised with in-memory
//! fakes in tests and wired to real OS integration in the binaries.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::Result;

/// A virtual network device the engine reads/writes raw IP packets from.
/// Production implementations wrap a TUN/TAP handle; tests use an
/// in-memory channel pair.
#[async_trait]
pub trait DatagramDevice: Send + Sync {
    async fn recv(&self) -> Result<Vec<u8>>;
    async fn send(&self, packet: &[u8]) -> Result<()>;
}

/// Routing/firewall policy applied when a session is established or torn
/// down. Production implementations shell out to `ip route`/`iptables` (or
/// platform equivalents); tests use a no-op or recording fake.
#[async_trait]
pub trait NetworkPolicy: Send + Sync {
    async fn on_session_up(&self, assigned_ip: Ipv4Addr) -> Result<()>;
    async fn on_session_down(&self, assigned_ip: Ipv4Addr) -> Result<()>;
}

/// Durable session record as persisted by a [`SessionStore`].
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session_id: String,
    pub user_id: String,
    pub assigned_ip: Ipv4Addr,
    pub created_at_unix: u64,
    pub expires_at_unix: u64,
}

/// Persistence for session records, independent of the in-memory registry
/// used for the hot path. Production implementations back onto a database;
/// the default build ships an in-memory implementation suitable for single
/// node deployments and tests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: StoredSession) -> Result<()>;
    async fn get(&self, session_id: &str) -> Result<Option<StoredSession>>;
    async fn remove(&self, session_id: &str) -> Result<()>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<StoredSession>>;
}

/// A directory entry: the data needed to authenticate and authorize a user.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    pub password_hash: String,
    pub max_sessions: u32,
    pub enabled: bool,
}

/// User lookup and credential verification, independent of how accounts are
/// actually stored. Production implementations back onto a database or
/// external IdP; the default build ships an in-memory implementation.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<UserRecord>>;
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemorySessionStore {
        sessions: Mutex<HashMap<String, StoredSession>>,
    }

    #[async_trait]
    impl SessionStore for InMemorySessionStore {
        async fn put(&self, session: StoredSession) -> Result<()> {
            self.sessions
                .lock()
                .await
                .insert(session.session_id.clone(), session);
            Ok(())
        }

        async fn get(&self, session_id: &str) -> Result<Option<StoredSession>> {
            Ok(self.sessions.lock().await.get(session_id).cloned())
        }

        async fn remove(&self, session_id: &str) -> Result<()> {
            self.sessions.lock().await.remove(session_id);
            Ok(())
        }

        async fn list_for_user(&self, user_id: &str) -> Result<Vec<StoredSession>> {
            Ok(self
                .sessions
                .lock()
                .await
                .values()
                .filter(|s| s.user_id == user_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct InMemoryUserDirectory {
        users: HashMap<String, UserRecord>,
    }

    impl InMemoryUserDirectory {
        pub fn with_user(mut self, record: UserRecord) -> Self {
            self.users.insert(record.user_id.clone(), record);
            self
        }
    }

    #[async_trait]
    impl UserDirectory for InMemoryUserDirectory {
        async fn find(&self, username: &str) -> Result<Option<UserRecord>> {
            Ok(self.users.get(username).cloned())
        }
    }

    #[tokio::test]
    async fn session_store_round_trip() {
        let store = InMemorySessionStore::default();
        let session = StoredSession {
            session_id: "s1".into(),
            user_id: "alice".into(),
            assigned_ip: Ipv4Addr::new(10, 8, 0, 2),
            created_at_unix: 0,
            expires_at_unix: 100,
        };
        store.put(session.clone()).await.unwrap();
        assert!(store.get("s1").await.unwrap().is_some());
        let for_user = store.list_for_user("alice").await.unwrap();
        assert_eq!(for_user.len(), 1);
        store.remove("s1").await.unwrap();
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_directory_lookup() {
        let dir = InMemoryUserDirectory::default().with_user(UserRecord {
            user_id: "alice".into(),
            password_hash: "hash".into(),
            max_sessions: 3,
            enabled: true,
        });
        assert!(dir.find("alice").await.unwrap().is_some());
        assert!(dir.find("bob").await.unwrap().is_none());
    }
}
