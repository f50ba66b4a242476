use std::time::Instant;

use bytes::Bytes;

/// A drone node identifier. Two addresses are reserved by configuration:
/// the simulated ingress source and the terminal (base-station) address.
pub type Address = i64;

/// Tag chosen by the routing policy at first fanout. Preserved across hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Data,
    Oracle,
}

/// A simulated packet travelling across the link overlay.
///
/// `id` is assigned once at ingress and never changes across copies or
/// hops. `hops_left` is monotonically non-increasing along any path. A
/// packet whose `payload` has been cleared to zero length is *suppressed*:
/// it still generates lifecycle log events but is never written to the
/// tunnel.
#[derive(Debug, Clone)]
pub struct Packet {
    pub src: Address,
    pub dst: Address,
    pub hops_left: u32,
    pub payload: Bytes,
    pub arrival_time: Instant,
    pub id: u64,
    pub kind: PacketKind,
}

impl Packet {
    pub fn is_suppressed(&self) -> bool {
        self.payload.is_empty()
    }

    /// Clears the payload in place, marking this packet suppressed while
    /// preserving its id, hop count, and routing addresses.
    pub fn suppress(&mut self) {
        self.payload = Bytes::new();
    }

    /// Byte length the link emulators charge against delivery-slot capacity.
    pub fn len(&self) -> usize {
        self.payload.len()
    }
}

/// Monotonic packet-id allocator. Touched only by the ingress loop.
#[derive(Debug, Default)]
pub struct PacketIdAllocator {
    next: std::sync::atomic::AtomicU64,
}

impl PacketIdAllocator {
    pub fn new() -> Self {
        Self {
            next: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}
