//! End-to-end exercises of the engine's pieces wired together without a real
//! tunnel: a fake in-memory `TunnelAdapter`/`PacketAdapter` pair stands in
//! for `netsim-tunnel`, so these run on any host regardless of TUN
//! permissions.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

use netsim_core::adapter::{PacketAdapter, TunnelAdapter};
use netsim_core::engine::{Engine, EngineConfig};
use netsim_core::error::IngressError;
use netsim_core::link::DelayEmulator;
use netsim_core::policy::{BroadcastPolicy, OraclePolicy};
use netsim_core::registry::LinkTable;

/// A `TunnelAdapter` backed by channels instead of a real device: `inject`
/// feeds bytes in as if they arrived from the sender, `written` collects
/// whatever the engine writes back out.
struct FakeTunnel {
    inbound_rx: Receiver<Bytes>,
    outbound_tx: Sender<Bytes>,
}

struct FakeTunnelHandle {
    inbound_tx: Sender<Bytes>,
    outbound_rx: Receiver<Bytes>,
}

fn fake_tunnel() -> (FakeTunnel, FakeTunnelHandle) {
    let (inbound_tx, inbound_rx) = bounded(16);
    let (outbound_tx, outbound_rx) = bounded(16);
    (
        FakeTunnel {
            inbound_rx,
            outbound_tx,
        },
        FakeTunnelHandle {
            inbound_tx,
            outbound_rx,
        },
    )
}

impl TunnelAdapter for FakeTunnel {
    fn recv(&self) -> std::io::Result<Bytes> {
        self.inbound_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "no inbound packet"))
    }

    fn send(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.outbound_tx
            .send(Bytes::copy_from_slice(datagram))
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "receiver gone"))
    }
}

/// A pass-through adapter: every datagram validates, and "rewrite" is the
/// identity. Good enough to exercise routing/link behavior in isolation from
/// IPv4 parsing, which `netsim-tunnel` covers on its own.
struct PassthroughAdapter;

impl PacketAdapter for PassthroughAdapter {
    fn validate_ingress(&self, raw: &Bytes) -> Result<(), IngressError> {
        if raw.is_empty() {
            Err(IngressError::Truncated)
        } else {
            Ok(())
        }
    }

    fn rewrite_source(&self, raw: &Bytes, _new_src: Ipv4Addr) -> Result<Bytes, IngressError> {
        Ok(raw.clone())
    }
}

fn base_engine_config(source: i64, terminal: i64) -> EngineConfig {
    EngineConfig {
        source,
        terminal,
        max_hops: 8,
        terminal_ipv4: Ipv4Addr::new(10, 0, 0, 2),
    }
}

/// S1 — broadcast over a single direct link: a datagram injected at the
/// source is delivered once to the terminal with its payload intact.
#[test]
fn broadcast_delivers_over_a_single_link() {
    let mut links = LinkTable::new();
    links.insert(0, 1, Arc::new(DelayEmulator::new(Duration::from_millis(1))));

    let (tunnel, handle) = fake_tunnel();
    let engine = Engine::new(
        base_engine_config(0, 1),
        links,
        Arc::new(BroadcastPolicy),
        Arc::new(tunnel),
        Arc::new(PassthroughAdapter),
    );

    let running = Arc::new(AtomicBool::new(true));
    let _handles = engine.spawn(running.clone());

    handle
        .inbound_tx
        .send(Bytes::from_static(b"hello-world"))
        .unwrap();

    let delivered = handle
        .outbound_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("packet should reach the terminal");
    assert_eq!(&delivered[..], b"hello-world");

    running.store(false, Ordering::Relaxed);
}

/// S3 — oracle routing deduplicates: flooding across two parallel relays
/// produces exactly one tunnel write, not two.
#[test]
fn oracle_routing_deduplicates_parallel_paths() {
    let mut links = LinkTable::new();
    links.insert(0, 1, Arc::new(DelayEmulator::new(Duration::from_millis(1))));
    links.insert(0, 2, Arc::new(DelayEmulator::new(Duration::from_millis(1))));
    links.insert(1, 3, Arc::new(DelayEmulator::new(Duration::from_millis(1))));
    links.insert(2, 3, Arc::new(DelayEmulator::new(Duration::from_millis(1))));

    let (tunnel, handle) = fake_tunnel();
    let engine = Engine::new(
        base_engine_config(0, 3),
        links,
        Arc::new(OraclePolicy::new(3)),
        Arc::new(tunnel),
        Arc::new(PassthroughAdapter),
    );

    let running = Arc::new(AtomicBool::new(true));
    let _handles = engine.spawn(running.clone());

    handle
        .inbound_tx
        .send(Bytes::from_static(b"dedup-me"))
        .unwrap();

    let first = handle
        .outbound_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("packet should reach the terminal at least once");
    assert_eq!(&first[..], b"dedup-me");

    let second = handle.outbound_rx.recv_timeout(Duration::from_millis(500));
    assert!(
        second.is_err(),
        "oracle routing must suppress the duplicate arrival"
    );

    running.store(false, Ordering::Relaxed);
}

/// S6 — hop budget exhaustion: a packet whose path is longer than
/// `max_hops` is silently dropped before it ever reaches the terminal.
#[test]
fn hop_budget_exhaustion_drops_long_paths() {
    let mut links = LinkTable::new();
    links.insert(0, 1, Arc::new(DelayEmulator::new(Duration::ZERO)));
    links.insert(1, 2, Arc::new(DelayEmulator::new(Duration::ZERO)));
    links.insert(2, 3, Arc::new(DelayEmulator::new(Duration::ZERO)));

    let mut config = base_engine_config(0, 3);
    config.max_hops = 1;

    let (tunnel, handle) = fake_tunnel();
    let engine = Engine::new(
        config,
        links,
        Arc::new(BroadcastPolicy),
        Arc::new(tunnel),
        Arc::new(PassthroughAdapter),
    );

    let running = Arc::new(AtomicBool::new(true));
    let _handles = engine.spawn(running.clone());

    handle
        .inbound_tx
        .send(Bytes::from_static(b"too-far"))
        .unwrap();

    let result = handle.outbound_rx.recv_timeout(Duration::from_millis(500));
    assert!(
        result.is_err(),
        "a packet whose path exceeds max_hops must never reach the terminal"
    );

    running.store(false, Ordering::Relaxed);
}

/// Malformed ingress is fatal: the ingress worker aborts the whole process
/// rather than dropping the datagram and continuing. `std::process::exit`
/// can't be asserted in-process without killing the rest of the test suite,
/// so this re-execs the test binary filtered to just this test in a child
/// process and asserts that child's exit status.
#[test]
fn malformed_ingress_is_fatal_to_the_process() {
    const CHILD_ENV: &str = "NETSIM_MALFORMED_INGRESS_CHILD";

    if std::env::var_os(CHILD_ENV).is_some() {
        feed_one_malformed_datagram();
        panic!("ingress worker should have aborted the process before this point");
    }

    let exe = std::env::current_exe().expect("test binary path");
    let status = std::process::Command::new(exe)
        .arg("malformed_ingress_is_fatal_to_the_process")
        .arg("--exact")
        .arg("--nocapture")
        .env(CHILD_ENV, "1")
        .status()
        .expect("failed to re-exec test binary");

    assert!(
        !status.success(),
        "malformed ingress must abort the process with a non-zero exit code"
    );
}

fn feed_one_malformed_datagram() {
    let mut links = LinkTable::new();
    links.insert(0, 1, Arc::new(DelayEmulator::new(Duration::from_millis(1))));

    let (tunnel, handle) = fake_tunnel();
    let engine = Engine::new(
        base_engine_config(0, 1),
        links,
        Arc::new(BroadcastPolicy),
        Arc::new(tunnel),
        Arc::new(PassthroughAdapter),
    );

    let running = Arc::new(AtomicBool::new(true));
    let _handles = engine.spawn(running.clone());

    handle.inbound_tx.send(Bytes::new()).unwrap();

    std::thread::sleep(Duration::from_secs(2));
}

/// Suppressed packets (empty payload reaching the terminal) are never
/// written to the tunnel, even though they still traverse the overlay.
#[test]
fn suppressed_packets_are_not_written_to_the_tunnel() {
    struct AlwaysSuppress {
        terminal: i64,
    }
    impl netsim_core::policy::RoutingPolicy for AlwaysSuppress {
        fn name(&self) -> &'static str {
            "always-suppress"
        }
        fn get_routed_packets(&self, _at: i64, _packet: &netsim_core::Packet, neighbors: &[i64]) -> Vec<i64> {
            neighbors.to_vec()
        }
        fn on_link_input_dequeue(&self, link: netsim_core::link::LinkId, packet: &mut netsim_core::Packet) {
            if link.1 == self.terminal {
                packet.suppress();
            }
        }
    }

    let mut links = LinkTable::new();
    links.insert(0, 1, Arc::new(DelayEmulator::new(Duration::from_millis(1))));

    let (tunnel, handle) = fake_tunnel();
    let engine = Engine::new(
        base_engine_config(0, 1),
        links,
        Arc::new(AlwaysSuppress { terminal: 1 }),
        Arc::new(tunnel),
        Arc::new(PassthroughAdapter),
    );

    let running = Arc::new(AtomicBool::new(true));
    let _handles = engine.spawn(running.clone());

    handle
        .inbound_tx
        .send(Bytes::from_static(b"should-not-arrive"))
        .unwrap();

    let result = handle.outbound_rx.recv_timeout(Duration::from_millis(500));
    assert!(result.is_err(), "suppressed packets must not reach the tunnel");

    running.store(false, Ordering::Relaxed);
}
