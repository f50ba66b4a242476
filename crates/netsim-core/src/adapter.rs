//! Boundary traits between the simulator core and the host OS. Kept crate-
//! agnostic here so `netsim-core` never needs to depend on `tun` or
//! `pnet_packet` directly; `netsim-tunnel` provides the real implementations.

use bytes::Bytes;
use std::net::Ipv4Addr;

use crate::error::IngressError;

/// Raw byte I/O against the tunnel device.
pub trait TunnelAdapter: Send + Sync {
    fn recv(&self) -> std::io::Result<Bytes>;
    fn send(&self, datagram: &[u8]) -> std::io::Result<()>;
}

/// Validates and rewrites raw IP datagrams at the tunnel boundary.
pub trait PacketAdapter: Send + Sync {
    /// Validates that `raw` is a well-formed IPv4 datagram carrying UDP or
    /// TCP, per the ingress error variants in [`IngressError`].
    fn validate_ingress(&self, raw: &Bytes) -> Result<(), IngressError>;

    /// Rewrites the datagram's source address to `new_src` and recomputes
    /// the IPv4 and transport checksums, so the real receiver sees a
    /// consistent source regardless of which simulated path the packet took.
    fn rewrite_source(&self, raw: &Bytes, new_src: Ipv4Addr) -> Result<Bytes, IngressError>;
}
