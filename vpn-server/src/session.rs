//! A single server-side tunnel session (spec §4.E).

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use vpn_crypto::session::{AeadSession, SessionStatistics};

/// Everything the server tracks about one authenticated client for the
/// lifetime of its tunnel.
pub struct ServerSession {
    pub session_id: String,
    pub token: String,
    pub user_id: String,
    pub assigned_ip: Ipv4Addr,
    pub aead: AeadSession,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub last_ping_sent: Option<Instant>,
    /// Set once by [`close`](Self::close); further calls are a no-op so the
    /// per-connection task and a background eviction sweep can both try to
    /// close the same session without double-counting the reason.
    pub closed_reason: Option<String>,
}

impl ServerSession {
    pub fn new(session_id: String, token: String, user_id: String, assigned_ip: Ipv4Addr, aead: AeadSession) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            token,
            user_id,
            assigned_ip,
            aead,
            created_at: now,
            last_activity: now,
            last_ping_sent: None,
            closed_reason: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed_reason.is_some()
    }

    /// Idempotent (spec §4.E): the first call records `reason`, every later
    /// call is a no-op.
    pub fn close(&mut self, reason: impl Into<String>) {
        if self.closed_reason.is_none() {
            self.closed_reason = Some(reason.into());
        }
    }

    pub fn statistics(&self) -> SessionStatistics {
        self.aead.statistics()
    }
}
