//! Pluggable multi-hop routing policies.
//!
//! A policy decides, at every hop a packet passes through, which outgoing
//! links to fan it out across. It also observes the four points in a
//! packet's life where an engine worker touches a link: arrival at a link's
//! input side (as an address pair, before the packet itself is known),
//! dequeue from a link's input queue, enqueue onto a link's output queue,
//! and dequeue from a link's output queue on the way to the next hop or the
//! terminal. The engine calls a policy's hooks under its global link-event
//! lock, so a policy implementation can assume hooks for a given packet are
//! never interleaved with hooks for another packet crossing the same link
//! at the same instant.

mod best_neighbor;
mod broadcast;
mod oracle;

pub use best_neighbor::BestNeighborPolicy;
pub use broadcast::BroadcastPolicy;
pub use oracle::OraclePolicy;

use crate::link::LinkId;
use crate::packet::{Address, Packet, PacketKind};

pub trait RoutingPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// The `PacketKind` a fresh packet should be tagged with at ingress.
    /// Most policies use `Data`; oracle routing tags `Oracle` so the
    /// terminal's dedup logic can be told apart from ordinary flooding.
    fn tag_kind(&self) -> PacketKind {
        PacketKind::Data
    }

    /// Chooses which neighbors of `at` a packet should be forwarded to
    /// next. Called both at ingress and at every subsequent hop.
    fn get_routed_packets(&self, at: Address, packet: &Packet, neighbors: &[Address]) -> Vec<Address>;

    /// Fired by a link's input-side worker for every iteration, using the
    /// link's own static addresses, just before it waits on the link's
    /// delivery model. Unlike the other three hooks this one does not see
    /// a packet — it exists for policies (best-neighbor) that need to know
    /// a link is still alive independent of traffic on it.
    fn on_incoming_packet(&self, _src: Address, _dst: Address) {}

    /// Fired when a link worker dequeues a packet from its input queue,
    /// immediately before handing it to the link emulator. Takes the
    /// packet mutably so a policy can suppress it in place (oracle dedup)
    /// before it consumes any of the link's delivery budget.
    fn on_link_input_dequeue(&self, _link: LinkId, _packet: &mut Packet) {}

    /// Fired immediately after a link emulator produces an output packet
    /// (not fired for packets the link dropped).
    fn on_link_output_enqueue(&self, _link: LinkId, _packet: &Packet) {}

    /// Fired once a packet is dequeued from a link's output queue, before
    /// the engine decides whether to deliver it to the terminal or
    /// continue routing it. Used by best-neighbor to time a link's
    /// one-way latency.
    fn on_outgoing_packet(&self, _packet: &Packet) {}
}
