//! Session token and virtual IP address allocation (spec §4.D).

use std::collections::HashSet;
use std::net::Ipv4Addr;

use rand::RngCore;
use vpn_core::constants::{VIRTUAL_NET_FIRST_HOST, VIRTUAL_NET_LAST_HOST, VIRTUAL_NET_OCTETS};

use crate::errors::{Result, ServerError};

/// Generates an opaque, unguessable session token.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Allocates addresses from the server's virtual subnet (default
/// `10.8.0.0/24`), handing out `.2`-`.254` and reclaiming them on release.
pub struct IpAllocator {
    base_octets: [u8; 3],
    in_use: HashSet<u8>,
}

impl IpAllocator {
    pub fn new(base_octets: [u8; 3]) -> Self {
        Self {
            base_octets,
            in_use: HashSet::new(),
        }
    }

    pub fn with_default_range() -> Self {
        Self::new(VIRTUAL_NET_OCTETS)
    }

    /// Hands out the lowest free host address, or `IpPoolExhausted` if the
    /// whole assignable range is taken.
    pub fn allocate(&mut self) -> Result<Ipv4Addr> {
        for host in VIRTUAL_NET_FIRST_HOST..=VIRTUAL_NET_LAST_HOST {
            if self.in_use.insert(host) {
                let [a, b, c] = self.base_octets;
                return Ok(Ipv4Addr::new(a, b, c, host));
            }
        }
        Err(ServerError::IpPoolExhausted)
    }

    /// Returns `addr` to the pool. No-op if `addr` wasn't allocated by this
    /// pool (e.g. outside its subnet).
    pub fn release(&mut self, addr: Ipv4Addr) {
        let octets = addr.octets();
        if octets[..3] == self.base_octets {
            self.in_use.remove(&octets[3]);
        }
    }

    pub fn allocated_count(&self) -> usize {
        self.in_use.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_in_order_starting_at_first_host() {
        let mut pool = IpAllocator::new([10, 8, 0]);
        assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(10, 8, 0, 2));
        assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(10, 8, 0, 3));
    }

    #[test]
    fn released_address_can_be_reallocated() {
        let mut pool = IpAllocator::new([10, 8, 0]);
        let addr = pool.allocate().unwrap();
        pool.release(addr);
        assert_eq!(pool.allocate().unwrap(), addr);
    }

    #[test]
    fn exhausted_pool_returns_error() {
        let mut pool = IpAllocator::new([10, 8, 0]);
        for _ in VIRTUAL_NET_FIRST_HOST..=VIRTUAL_NET_LAST_HOST {
            pool.allocate().unwrap();
        }
        assert!(matches!(pool.allocate(), Err(ServerError::IpPoolExhausted)));
    }

    #[test]
    fn session_tokens_are_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
