use crate::packet::{Address, Packet};

use super::RoutingPolicy;

/// Floods every packet across every neighbor link, unconditionally. No loop
/// prevention beyond `hops_left`; no dedup at the terminal, so the same
/// payload may be written to the tunnel more than once.
#[derive(Debug, Default)]
pub struct BroadcastPolicy;

impl RoutingPolicy for BroadcastPolicy {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn get_routed_packets(&self, _at: Address, _packet: &Packet, neighbors: &[Address]) -> Vec<Address> {
        neighbors.to_vec()
    }
}
