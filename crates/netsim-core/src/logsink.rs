//! Packet lifecycle logging.
//!
//! `start_simulator` and `start_trace` bracket startup; `packet_received`,
//! entering and leaving a link, being dropped by a link's loss model, being
//! suppressed by a routing policy, and `packet_sent` bracket a single
//! packet's life. Each is emitted as a structured `tracing` event at `INFO`
//! so a log sink (file, stdout, or a test subscriber) can reconstruct a
//! packet's full path without instrumenting the engine itself. These event
//! names are a stable contract: downstream log analysis matches on them
//! exactly.
//!
//! `tracing-subscriber`'s built-in timers are millisecond-resolution; the
//! external log format calls for microseconds, so [`MicrosecondTime`] supplies
//! one for use with `fmt::Layer::with_timer`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

use crate::link::LinkId;
use crate::packet::Packet;

/// A `FormatTime` implementation that writes wall-clock time as
/// `seconds.microseconds` since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrosecondTime;

impl FormatTime for MicrosecondTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        write!(w, "{}.{:06}", now.as_secs(), now.subsec_micros())
    }
}

/// Logged once, before any worker thread is spawned.
pub fn start_simulator() {
    tracing::info!(event = "start_simulator");
}

/// Logged once per trace-emulated link, at construction time.
pub fn start_trace(src: crate::packet::Address, dst: crate::packet::Address) {
    tracing::info!(event = "start_trace", src, dst);
}

pub fn packet_received(packet: &Packet) {
    tracing::info!(
        event = "packet_received",
        id = packet.id,
        src = packet.src,
        dst = packet.dst,
        hops_left = packet.hops_left,
        kind = ?packet.kind,
        bytes = packet.len(),
    );
}

pub fn packet_entered_link(link: LinkId, packet: &Packet) {
    tracing::info!(
        event = "packet_entered_link",
        id = packet.id,
        link_from = link.0,
        link_to = link.1,
        hops_left = packet.hops_left,
        bytes = packet.len(),
    );
}

pub fn packet_left_link(link: LinkId, packet: &Packet) {
    tracing::info!(
        event = "packet_left_link",
        id = packet.id,
        link_from = link.0,
        link_to = link.1,
        hops_left = packet.hops_left,
        bytes = packet.len(),
    );
}

pub fn packet_dropped(link: LinkId, packet_id: u64) {
    tracing::info!(
        event = "packet_dropped",
        id = packet_id,
        link_from = link.0,
        link_to = link.1,
    );
}

pub fn packet_suppressed(packet: &Packet) {
    tracing::info!(
        event = "packet_suppressed",
        id = packet.id,
        src = packet.src,
        dst = packet.dst,
    );
}

pub fn packet_sent(packet: &Packet) {
    tracing::info!(
        event = "packet_sent",
        id = packet.id,
        src = packet.src,
        dst = packet.dst,
        bytes = packet.len(),
    );
}
