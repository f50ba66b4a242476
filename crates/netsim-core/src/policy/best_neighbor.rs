use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::packet::{Address, Packet};

use super::RoutingPolicy;

/// Per-candidate-neighbor latency-probing state. `latest_arrival` is the
/// timestamp of the most recent probe handed to a terminal-bound link from
/// this neighbor; `latest_latency` is the most recently *committed*
/// one-way transit sample for that same link, lagged by `update_lag`.
#[derive(Default)]
struct SelfState {
    latest_arrival: Option<Instant>,
    latest_latency: Option<Duration>,
}

/// Forwards toward the terminal directly whenever the terminal is a direct
/// neighbor, plus (once a measurement exists) a second relay attempt toward
/// whichever non-terminal neighbor currently looks fastest.
///
/// A neighbor's latency sample is taken by timing a terminal-bound link's
/// own transit: [`on_incoming_packet`](RoutingPolicy::on_incoming_packet)
/// starts the clock when a probe is handed to that link, and
/// [`on_outgoing_packet`](RoutingPolicy::on_outgoing_packet) reads it back
/// once the link's emulator delivers. The sample isn't committed to
/// `latest_latency` immediately — it's written by a thread that sleeps
/// `update_lag` first, modelling a control plane that reacts to
/// measurements on a delay rather than instantaneously. That write is a
/// cooperative task: `alive` (cleared in `Drop`) and a `Weak` back-reference
/// both let the policy's destruction cancel a write still in flight instead
/// of resurrecting state nobody will read again.
pub struct BestNeighborPolicy {
    terminal: Address,
    update_lag: Duration,
    state: Mutex<HashMap<Address, SelfState>>,
    alive: Arc<AtomicBool>,
    self_weak: Weak<BestNeighborPolicy>,
}

impl BestNeighborPolicy {
    pub fn new(terminal: Address, update_lag: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            terminal,
            update_lag,
            state: Mutex::new(HashMap::new()),
            alive: Arc::new(AtomicBool::new(true)),
            self_weak: weak.clone(),
        })
    }

    fn best_relay(&self, neighbors: &[Address]) -> Option<Address> {
        let state = self.state.lock().expect("best-neighbor state poisoned");
        neighbors
            .iter()
            .copied()
            .filter(|n| *n != self.terminal)
            .filter_map(|n| state.get(&n).and_then(|s| s.latest_latency).map(|d| (n, d)))
            .min_by_key(|(_, d)| *d)
            .map(|(n, _)| n)
    }
}

impl Drop for BestNeighborPolicy {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

impl RoutingPolicy for BestNeighborPolicy {
    fn name(&self) -> &'static str {
        "best-neighbor"
    }

    fn get_routed_packets(&self, _at: Address, _packet: &Packet, neighbors: &[Address]) -> Vec<Address> {
        let mut routed = Vec::with_capacity(2);
        if neighbors.contains(&self.terminal) {
            routed.push(self.terminal);
        }
        if let Some(relay) = self.best_relay(neighbors) {
            routed.push(relay);
        }
        routed
    }

    fn on_incoming_packet(&self, src: Address, dst: Address) {
        if dst != self.terminal {
            return;
        }
        self.state
            .lock()
            .expect("best-neighbor state poisoned")
            .entry(src)
            .or_default()
            .latest_arrival = Some(Instant::now());
    }

    fn on_outgoing_packet(&self, packet: &Packet) {
        if packet.dst != self.terminal {
            return;
        }
        let neighbor = packet.src;
        let departed = {
            let state = self.state.lock().expect("best-neighbor state poisoned");
            state.get(&neighbor).and_then(|s| s.latest_arrival)
        };
        let Some(departed) = departed else {
            return;
        };
        let latency = departed.elapsed();

        let update_lag = self.update_lag;
        let alive = self.alive.clone();
        let weak = self.self_weak.clone();
        std::thread::Builder::new()
            .name("best-neighbor-latency-write".into())
            .spawn(move || {
                std::thread::sleep(update_lag);
                if !alive.load(Ordering::Relaxed) {
                    return;
                }
                let Some(policy) = weak.upgrade() else {
                    return;
                };
                policy
                    .state
                    .lock()
                    .expect("best-neighbor state poisoned")
                    .entry(neighbor)
                    .or_default()
                    .latest_latency = Some(latency);
            })
            .expect("failed to spawn best-neighbor latency-write thread");
    }
}
