use std::collections::HashSet;
use std::sync::Mutex;

use crate::link::LinkId;
use crate::packet::{Address, Packet, PacketKind};

use super::RoutingPolicy;

/// Floods like [`BroadcastPolicy`](super::BroadcastPolicy), but deduplicates
/// by packet id before a duplicate copy ever consumes a terminal-bound
/// link's delivery budget — an oracle in the sense that no real deployment
/// has this global knowledge for free; it exists to give an upper bound on
/// flooding's delivery ratio without flooding's duplicate-transit cost.
///
/// Dedup happens in two matching hooks, both gated on the link ending at
/// `terminal`: `on_link_input_dequeue` suppresses (clears the payload of) a
/// copy whose id has already arrived, before that copy is emulated at all;
/// `on_link_output_enqueue` marks an id seen the first time a copy actually
/// makes it out the other side.
pub struct OraclePolicy {
    terminal: Address,
    seen_ids: Mutex<HashSet<u64>>,
}

impl OraclePolicy {
    pub fn new(terminal: Address) -> Self {
        Self {
            terminal,
            seen_ids: Mutex::new(HashSet::new()),
        }
    }
}

impl RoutingPolicy for OraclePolicy {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn tag_kind(&self) -> PacketKind {
        PacketKind::Oracle
    }

    fn get_routed_packets(&self, _at: Address, _packet: &Packet, neighbors: &[Address]) -> Vec<Address> {
        neighbors.to_vec()
    }

    fn on_link_input_dequeue(&self, link: LinkId, packet: &mut Packet) {
        if link.1 != self.terminal {
            return;
        }
        let already_seen = self
            .seen_ids
            .lock()
            .expect("oracle seen_ids poisoned")
            .contains(&packet.id);
        if already_seen {
            packet.suppress();
        }
    }

    fn on_link_output_enqueue(&self, link: LinkId, packet: &Packet) {
        if link.1 != self.terminal {
            return;
        }
        self.seen_ids
            .lock()
            .expect("oracle seen_ids poisoned")
            .insert(packet.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Instant;

    fn sample(id: u64) -> Packet {
        Packet {
            src: 0,
            dst: 9,
            hops_left: 3,
            payload: Bytes::from_static(b"x"),
            arrival_time: Instant::now(),
            id,
            kind: PacketKind::Oracle,
        }
    }

    #[test]
    fn suppresses_a_duplicate_arrival_at_the_terminal_link() {
        let policy = OraclePolicy::new(9);
        let link: LinkId = (0, 9);

        let mut first = sample(1);
        policy.on_link_input_dequeue(link, &mut first);
        assert!(!first.is_suppressed());
        policy.on_link_output_enqueue(link, &first);

        let mut second = sample(1);
        policy.on_link_input_dequeue(link, &mut second);
        assert!(second.is_suppressed());
    }

    #[test]
    fn ignores_links_that_do_not_end_at_the_terminal() {
        let policy = OraclePolicy::new(9);
        let link: LinkId = (0, 1);

        let mut first = sample(1);
        policy.on_link_input_dequeue(link, &mut first);
        policy.on_link_output_enqueue(link, &first);

        let mut second = sample(1);
        policy.on_link_input_dequeue(link, &mut second);
        assert!(!second.is_suppressed());
    }

    #[test]
    fn tags_oracle_kind() {
        let policy = OraclePolicy::new(9);
        assert_eq!(policy.tag_kind(), PacketKind::Oracle);
    }
}
