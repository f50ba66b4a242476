//! Link emulators: the per-edge delivery models that sit between two drone
//! addresses and decide when (or whether) a packet put in on one side comes
//! out the other.
//!
//! Each emulator owns its own input and output queues: `write_incoming`
//! feeds the former (non-blocking; a full queue is a silent drop, per the
//! system's bounded-queue semantics), `read_outgoing` drains the latter
//! (blocking), and `run_emulation_step` is the link's own internal worker
//! loop body, driven repeatedly by one dedicated thread per link (see
//! `engine`). This keeps every link's delivery model — including a
//! throughput-limited one that may buffer and split packets across several
//! delivery slots — in sole control of when it actually blocks.

mod delay;
mod trace;

pub use delay::DelayEmulator;
pub use trace::TraceEmulator;

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::packet::Packet;

/// One directed edge of the overlay, identified by (source, destination)
/// drone addresses. Links are one-way; a bidirectional edge in a config
/// file becomes two `LinkId`s.
pub type LinkId = (crate::packet::Address, crate::packet::Address);

/// How long a worker blocks waiting on a link's internal queue before
/// rechecking the engine's shared shutdown flag.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Applies a single link's delivery model. Implementations are expected to
/// be driven by one dedicated worker thread per link (see `engine`).
pub trait LinkEmulator: Send + Sync {
    /// A short tag for log records (`"delay"`, `"trace"`).
    fn kind_name(&self) -> &'static str;

    /// Non-blocking enqueue onto the link's own input queue. A queue already
    /// at capacity silently drops `packet` — the only queue-overflow
    /// behavior in this system.
    fn write_incoming(&self, packet: Packet);

    /// Runs one step of the link's delivery model: blocks (on the link's
    /// own simulated clock and/or its input queue) until there is work to
    /// do, then pushes zero or more delivered packets onto the link's own
    /// output queue. A single call may deliver several packets at once for
    /// a throughput-limited link opportunistically draining its queue.
    ///
    /// `on_dequeue` is invoked once per packet this step pulls off the
    /// input queue, before that packet is subjected to the link's delivery
    /// model; `on_enqueue` is invoked once per packet actually pushed to
    /// the output queue; `on_drop` is invoked once per packet the link's
    /// own model (loss, not queue overflow) decides not to deliver. All
    /// three are the caller's hooks into logging and the routing policy,
    /// invoked under the caller's link-event lock.
    fn run_emulation_step(
        &self,
        on_dequeue: &mut dyn FnMut(&mut Packet),
        on_enqueue: &dyn Fn(&Packet),
        on_drop: &dyn Fn(&Packet),
    );

    /// Blocks until a packet is available on the link's own output queue,
    /// waking periodically to recheck `running`. Returns `None` once
    /// `running` goes false or the link has otherwise been torn down.
    fn read_outgoing(&self, running: &AtomicBool) -> Option<Packet>;
}
