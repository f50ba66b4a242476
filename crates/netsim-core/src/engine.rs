//! The core engine: wires the packet adapter, the link overlay, and a
//! routing policy together into a running simulation.
//!
//! Every link gets two worker threads: an input-side worker that feeds the
//! link's own emulator (and observes the policy's input-side hooks), and an
//! output-side worker that drains whatever the emulator delivers, decides
//! whether that packet has reached the terminal or needs another hop, and
//! either writes it back out the tunnel or continues routing it directly —
//! there is no central dispatcher. A single ingress thread reads raw
//! datagrams from the tunnel and turns them into [`Packet`]s.
//!
//! All worker kinds poll a shared `Arc<AtomicBool>` "running" flag between
//! iterations so the whole engine can be torn down from one place.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::adapter::{PacketAdapter, TunnelAdapter};
use crate::link::{LinkEmulator, LinkId};
use crate::logsink;
use crate::packet::{Address, Packet, PacketIdAllocator};
use crate::policy::RoutingPolicy;
use crate::registry::LinkTable;

/// Static, fully-resolved simulation parameters. Built by `netsim-cli`'s
/// config loader; the engine itself never parses JSON.
pub struct EngineConfig {
    pub source: Address,
    pub terminal: Address,
    pub max_hops: u32,
    pub terminal_ipv4: Ipv4Addr,
}

/// A running (or ready-to-run) simulation instance.
pub struct Engine {
    config: EngineConfig,
    links: LinkTable,
    policy: Arc<dyn RoutingPolicy>,
    tunnel: Arc<dyn TunnelAdapter>,
    adapter: Arc<dyn PacketAdapter>,
    ids: Arc<PacketIdAllocator>,
    link_event_lock: Arc<Mutex<()>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        links: LinkTable,
        policy: Arc<dyn RoutingPolicy>,
        tunnel: Arc<dyn TunnelAdapter>,
        adapter: Arc<dyn PacketAdapter>,
    ) -> Self {
        Self {
            config,
            links,
            policy,
            tunnel,
            adapter,
            ids: Arc::new(PacketIdAllocator::new()),
            link_event_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Spawns all worker threads and returns their join handles. Callers
    /// control shutdown entirely through `running`; this call itself never
    /// blocks.
    pub fn spawn(self, running: Arc<AtomicBool>) -> Vec<std::thread::JoinHandle<()>> {
        let Engine {
            config,
            links,
            policy,
            tunnel,
            adapter,
            ids,
            link_event_lock,
        } = self;

        logsink::start_simulator();

        let config = Arc::new(config);
        let links = Arc::new(links);

        let mut handles = Vec::new();

        for &link_id in links.link_ids() {
            let emulator = links
                .emulator(link_id)
                .expect("link_ids come from the same link table")
                .clone();

            {
                let emulator = emulator.clone();
                let policy = policy.clone();
                let link_event_lock = link_event_lock.clone();
                let running = running.clone();
                let name = format!("link-in-{}-{}", link_id.0, link_id.1);
                handles.push(
                    std::thread::Builder::new()
                        .name(name)
                        .spawn(move || input_worker(link_id, emulator, policy, link_event_lock, running))
                        .expect("failed to spawn link input worker thread"),
                );
            }

            {
                let policy = policy.clone();
                let links = links.clone();
                let tunnel = tunnel.clone();
                let adapter = adapter.clone();
                let config = config.clone();
                let running = running.clone();
                let name = format!("link-out-{}-{}", link_id.0, link_id.1);
                handles.push(
                    std::thread::Builder::new()
                        .name(name)
                        .spawn(move || output_worker(link_id, emulator, policy, links, tunnel, adapter, config, running))
                        .expect("failed to spawn link output worker thread"),
                );
            }
        }

        {
            let running = running.clone();
            let policy = policy.clone();
            let links = links.clone();
            let tunnel = tunnel.clone();
            let adapter = adapter.clone();
            let config = config.clone();
            handles.push(
                std::thread::Builder::new()
                    .name("ingress".into())
                    .spawn(move || ingress_worker(tunnel, adapter, policy, links, config, ids, running))
                    .expect("failed to spawn ingress thread"),
            );
        }

        handles
    }
}

/// Hands `packet` to `policy` for fanout, then enqueues a tagged copy of
/// each resulting address onto that neighbor's link. Shared by the ingress
/// worker and every link's output worker — any hop that isn't the terminal
/// calls this directly rather than through a central dispatcher.
fn route_packet(mut packet: Packet, at: Address, policy: &dyn RoutingPolicy, links: &LinkTable) {
    packet.src = at;
    let neighbors = links.neighbors_of(at);
    let next_hops = policy.get_routed_packets(at, &packet, neighbors);

    for next in next_hops {
        let Some(emulator) = links.emulator((at, next)) else {
            continue;
        };
        let mut copy = packet.clone();
        copy.dst = next;
        copy.arrival_time = Instant::now();
        emulator.write_incoming(copy);
    }
}

/// Drives one link's own delivery model, forever. Calls `policy.
/// on_incoming_packet` once per loop iteration (this link's static
/// addresses, no packet yet needed), then blocks inside
/// `run_emulation_step` until that link's model actually has work to do.
fn input_worker(
    link_id: LinkId,
    emulator: Arc<dyn LinkEmulator>,
    policy: Arc<dyn RoutingPolicy>,
    link_event_lock: Arc<Mutex<()>>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        policy.on_incoming_packet(link_id.0, link_id.1);

        // Held for the whole step, including any sleep inside it, so a
        // routing policy observing link events sees a consistent snapshot.
        let _guard = link_event_lock.lock().expect("link-event lock poisoned");

        let on_dequeue = &mut |packet: &mut Packet| {
            policy.on_link_input_dequeue(link_id, packet);
            logsink::packet_entered_link(link_id, packet);
        };
        let on_enqueue = &|packet: &Packet| {
            policy.on_link_output_enqueue(link_id, packet);
        };
        let on_drop = &|packet: &Packet| {
            logsink::packet_dropped(link_id, packet.id);
        };

        emulator.run_emulation_step(on_dequeue, on_enqueue, on_drop);
    }
}

/// Drains whatever `emulator` delivers and decides what happens next:
/// terminal delivery, another hop, or a silent drop on hop-budget
/// exhaustion.
#[allow(clippy::too_many_arguments)]
fn output_worker(
    link_id: LinkId,
    emulator: Arc<dyn LinkEmulator>,
    policy: Arc<dyn RoutingPolicy>,
    links: Arc<LinkTable>,
    tunnel: Arc<dyn TunnelAdapter>,
    adapter: Arc<dyn PacketAdapter>,
    config: Arc<EngineConfig>,
    running: Arc<AtomicBool>,
) {
    while let Some(mut packet) = emulator.read_outgoing(&running) {
        logsink::packet_left_link(link_id, &packet);
        policy.on_outgoing_packet(&packet);

        if packet.is_suppressed() {
            logsink::packet_suppressed(&packet);
            continue;
        }

        let (_, at) = link_id;

        if at == config.terminal {
            match adapter.rewrite_source(&packet.payload, config.terminal_ipv4) {
                Ok(rewritten) => {
                    logsink::packet_sent(&packet);
                    if let Err(err) = tunnel.send(&rewritten) {
                        tracing::warn!(error = %err, id = packet.id, "tunnel write failed");
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, id = packet.id, "egress rewrite failed, dropping");
                }
            }
            continue;
        }

        if packet.hops_left == 0 {
            tracing::warn!(id = packet.id, at, "hop budget exhausted");
            continue;
        }
        packet.hops_left -= 1;

        route_packet(packet, at, policy.as_ref(), links.as_ref());
    }
}

#[allow(clippy::too_many_arguments)]
fn ingress_worker(
    tunnel: Arc<dyn TunnelAdapter>,
    adapter: Arc<dyn PacketAdapter>,
    policy: Arc<dyn RoutingPolicy>,
    links: Arc<LinkTable>,
    config: Arc<EngineConfig>,
    ids: Arc<PacketIdAllocator>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        let raw = match tunnel.recv() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "tunnel read failed");
                continue;
            }
        };

        if let Err(err) = adapter.validate_ingress(&raw) {
            eprintln!("fatal: malformed ingress packet: {err}");
            std::process::exit(1);
        }

        let packet = Packet {
            src: config.source,
            dst: config.terminal,
            hops_left: config.max_hops,
            payload: raw,
            arrival_time: Instant::now(),
            id: ids.next_id(),
            kind: policy.tag_kind(),
        };
        logsink::packet_received(&packet);

        route_packet(packet, config.source, policy.as_ref(), links.as_ref());
    }
}
