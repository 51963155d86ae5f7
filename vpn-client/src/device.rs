//! Default [`DatagramDevice`] for the binary (spec §6): real TUN/TAP
//! integration is platform-specific and left as a pluggable seam. This
//! build ships a device that never produces packets and discards whatever
//! it's asked to send, so the client connects and authenticates without a
//! configured network interface.

use async_trait::async_trait;
use tracing::info;
use vpn_core::error::Result;
use vpn_core::plugins::DatagramDevice;

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
