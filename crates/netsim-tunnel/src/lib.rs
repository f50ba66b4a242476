//! Host OS integration for the network simulator: opening and driving a TUN
//! device, and rewriting IPv4 datagrams on their way back out.

mod device;
mod error;
mod rewrite;

pub use device::TunDevice;
pub use error::TunnelError;
pub use rewrite::Ipv4RewriteAdapter;
