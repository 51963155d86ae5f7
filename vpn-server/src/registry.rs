//! Concurrent session registry (spec §4.F), dual-indexed by session token
//! and by assigned virtual IP so the data-plane loop can look a session up
//! either by the credential a client presents or by the source address of
//! an inbound packet.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;

use crate::errors::{Result, ServerError};
use crate::session::ServerSession;

pub type SharedSession = Arc<Mutex<ServerSession>>;

#[derive(Default)]
pub struct SessionRegistry {
    by_token: DashMap<String, SharedSession>,
    by_ip: DashMap<Ipv4Addr, String>,
    by_user: DashMap<String, Vec<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails loudly on a duplicate token (spec §4.D) rather than silently
    /// overwriting the existing session — at the protocol's token entropy
    /// a collision means something is wrong (a bug in token generation, or
    /// a replayed/forged `AuthSuccess`), not a legitimate reconnect.
    pub fn insert(&self, session: ServerSession) -> Result<SharedSession> {
        let token = session.token.clone();
        let ip = session.assigned_ip;
        let user_id = session.user_id.clone();
        let entry = match self.by_token.entry(token.clone()) {
            Entry::Occupied(_) => return Err(ServerError::DuplicateToken),
            Entry::Vacant(entry) => entry,
        };
        let shared = Arc::new(Mutex::new(session));
        entry.insert(shared.clone());
        self.by_ip.insert(ip, token.clone());
        self.by_user.entry(user_id).or_default().push(token);
        Ok(shared)
    }

    pub fn get_by_token(&self, token: &str) -> Option<SharedSession> {
        self.by_token.get(token).map(|e| e.clone())
    }

    pub fn get_by_ip(&self, ip: Ipv4Addr) -> Option<SharedSession> {
        let token = self.by_ip.get(&ip)?.clone();
        self.get_by_token(&token)
    }

    pub fn remove(&self, token: &str) {
        if let Some((_, session)) = self.by_token.remove(token) {
            if let Ok(session) = session.try_lock() {
                self.by_ip.remove(&session.assigned_ip);
                if let Some(mut tokens) = self.by_user.get_mut(&session.user_id) {
                    tokens.retain(|t| t != token);
                }
            }
        }
    }

    pub fn active_session_count_for_user(&self, user_id: &str) -> usize {
        self.by_user.get(user_id).map(|v| v.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Every currently registered session, for the background eviction and
    /// stats-logging tasks (spec §4.F `all()`, §4.G background tasks 1-2).
    pub fn all(&self) -> Vec<SharedSession> {
        self.by_token.iter().map(|e| e.value().clone()).collect()
    }

    /// Closes and removes every session whose last activity is older than
    /// `idle_timeout`, or whose age exceeds `ttl`, returning the virtual IPs
    /// freed so the caller can release them back to the allocator (spec
    /// §4.F `cleanup_inactive`, §4.G background task 1, invariant 3 — an
    /// evicted session's address must return to the pool). A session
    /// currently locked by its own connection task (mid read/write) is left
    /// for the next sweep rather than blocked on.
    pub async fn cleanup_inactive(&self, idle_timeout: Duration, ttl: Duration) -> Vec<Ipv4Addr> {
        let mut freed_ips = Vec::new();
        for token in self.by_token.iter().map(|e| e.key().clone()).collect::<Vec<_>>() {
            let Some(shared) = self.get_by_token(&token) else {
                continue;
            };
            let evicted_ip = {
                let Ok(mut locked) = shared.try_lock() else {
                    continue;
                };
                if locked.is_idle(idle_timeout) {
                    locked.close("idle timeout");
                    Some(locked.assigned_ip)
                } else if locked.created_at.elapsed() > ttl {
                    locked.close("session ttl expired");
                    Some(locked.assigned_ip)
                } else {
                    None
                }
            };
            if let Some(ip) = evicted_ip {
                self.remove(&token);
                freed_ips.push(ip);
            }
        }
        freed_ips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpn_crypto::session::AeadSession;

    fn session(token: &str, user: &str, ip: Ipv4Addr) -> ServerSession {
        ServerSession::new(
            format!("sess-{token}"),
            token.to_string(),
            user.to_string(),
            ip,
            AeadSession::new(&[9u8; 32]).unwrap(),
        )
    }

    #[test]
    fn insert_and_lookup_by_token_and_ip() {
        let reg = SessionRegistry::new();
        reg.insert(session("tok1", "alice", Ipv4Addr::new(10, 8, 0, 2))).unwrap();
        assert!(reg.get_by_token("tok1").is_some());
        assert!(reg.get_by_ip(Ipv4Addr::new(10, 8, 0, 2)).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn per_user_session_count_tracks_multiple_sessions() {
        let reg = SessionRegistry::new();
        reg.insert(session("tok1", "alice", Ipv4Addr::new(10, 8, 0, 2))).unwrap();
        reg.insert(session("tok2", "alice", Ipv4Addr::new(10, 8, 0, 3))).unwrap();
        assert_eq!(reg.active_session_count_for_user("alice"), 2);
    }

    #[test]
    fn remove_clears_both_indices() {
        let reg = SessionRegistry::new();
        reg.insert(session("tok1", "alice", Ipv4Addr::new(10, 8, 0, 2))).unwrap();
        reg.remove("tok1");
        assert!(reg.get_by_token("tok1").is_none());
        assert!(reg.get_by_ip(Ipv4Addr::new(10, 8, 0, 2)).is_none());
        assert_eq!(reg.active_session_count_for_user("alice"), 0);
    }

    #[test]
    fn insert_rejects_a_duplicate_token() {
        let reg = SessionRegistry::new();
        reg.insert(session("tok1", "alice", Ipv4Addr::new(10, 8, 0, 2))).unwrap();
        let err = reg
            .insert(session("tok1", "mallory", Ipv4Addr::new(10, 8, 0, 3)))
            .unwrap_err();
        assert!(matches!(err, ServerError::DuplicateToken));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_inactive_evicts_only_sessions_past_the_timeout() {
        let reg = SessionRegistry::new();
        reg.insert(session("fresh", "alice", Ipv4Addr::new(10, 8, 0, 2))).unwrap();
        let stale = session("stale", "bob", Ipv4Addr::new(10, 8, 0, 3));
        let shared_stale = reg.insert(stale).unwrap();
        {
            let mut locked = shared_stale.lock().await;
            locked.last_activity -= Duration::from_secs(3600);
        }

        let evicted = reg.cleanup_inactive(Duration::from_secs(300), Duration::from_secs(86400)).await;
        assert_eq!(evicted, vec![Ipv4Addr::new(10, 8, 0, 3)]);
        assert!(reg.get_by_token("fresh").is_some());
        assert!(reg.get_by_token("stale").is_none());
        assert_eq!(reg.all().len(), 1);
    }

    #[tokio::test]
    async fn cleanup_inactive_evicts_sessions_past_their_ttl_even_if_active() {
        let reg = SessionRegistry::new();
        let shared = reg.insert(session("old", "carol", Ipv4Addr::new(10, 8, 0, 4))).unwrap();
        {
            let mut locked = shared.lock().await;
            locked.created_at -= Duration::from_secs(25 * 3600);
            locked.touch();
        }

        let evicted = reg.cleanup_inactive(Duration::from_secs(300), Duration::from_secs(24 * 3600)).await;
        assert_eq!(evicted, vec![Ipv4Addr::new(10, 8, 0, 4)]);
        assert!(reg.get_by_token("old").is_none());
    }
}
