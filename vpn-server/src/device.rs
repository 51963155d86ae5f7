//! Default [`DatagramDevice`]/[`NetworkPolicy`] implementations for the
//! binary (spec §6): real TUN/TAP and `ip route`/`iptables` integration is
//! platform-specific and is left as a pluggable seam, same as the original
//! deployment's device abstraction. This build ships a device that never
//! produces packets and a policy that only logs, so the server runs and
//! authenticates clients out of the box without host network privileges.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use tracing::info;
use vpn_core::error::Result;
use vpn_core::plugins::{DatagramDevice, NetworkPolicy};

/// Never yields a packet from `recv`, and drops whatever `send` forwards to
/// it. Swap in a real TUN handle to route decrypted traffic to the host
/// network stack.
#[derive(Default)]
pub struct NullDevice;

#[async_trait]
impl DatagramDevice for NullDevice {
    async fn recv(&self) -> Result<Vec<u8>> {
        std::future::pending().await
    }

    async fn send(&self, packet: &[u8]) -> Result<()> {
        info!(bytes = packet.len(), "discarding packet: no device configured");
        Ok(())
    }
}

/// Logs session lifecycle transitions without touching routing tables.
pub struct NoopNetworkPolicy;

#[async_trait]
impl NetworkPolicy for NoopNetworkPolicy {
    async fn on_session_up(&self, assigned_ip: Ipv4Addr) -> Result<()> {
        info!(%assigned_ip, "session up: no routing policy configured");
        Ok(())
    }

    async fn on_session_down(&self, assigned_ip: Ipv4Addr) -> Result<()> {
        info!(%assigned_ip, "session down: no routing policy configured");
        Ok(())
    }
}
