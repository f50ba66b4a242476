use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;

use crate::packet::Packet;
use crate::trace::{LossSchedule, TraceSchedule, SLOT_BYTES};

use super::{LinkEmulator, POLL_INTERVAL};

struct SlotCursor {
    base_time: Instant,
    index: usize,
}

struct LossCursor {
    base_time: Instant,
    index: usize,
}

/// A packet that only partly fit in the delivery window that charged it;
/// `leftover` is how many of its bytes are still owed against a future slot.
struct InTransit {
    packet: Packet,
    leftover: usize,
}

struct State {
    slot: SlotCursor,
    bytes_left_in_window: usize,
    loss: LossCursor,
    in_transit: Option<InTransit>,
}

/// Trace-and-loss link: delivery slots drawn from a repeating millisecond
/// trace, each with a fixed byte budget (`SLOT_BYTES`), and an independent
/// repeating loss schedule advanced against wall-clock time rather than
/// once per packet processed.
///
/// Each instance owns its own seeded RNG so that parallel links with
/// identical loss traces do not drop in lockstep.
pub struct TraceEmulator {
    trace: TraceSchedule,
    loss: LossSchedule,
    rng: Mutex<StdRng>,
    state: Mutex<State>,
    input_tx: Sender<Packet>,
    input_rx: Receiver<Packet>,
    output_tx: Sender<Packet>,
    output_rx: Receiver<Packet>,
}

impl TraceEmulator {
    pub fn new(trace: TraceSchedule, loss: LossSchedule, seed: u64) -> Self {
        Self::with_queue_capacity(trace, loss, seed, 256)
    }

    pub fn with_queue_capacity(trace: TraceSchedule, loss: LossSchedule, seed: u64, queue_capacity: usize) -> Self {
        let now = Instant::now();
        let state = State {
            slot: SlotCursor { base_time: now, index: 0 },
            bytes_left_in_window: SLOT_BYTES,
            loss: LossCursor { base_time: now, index: 0 },
            in_transit: None,
        };
        let (input_tx, input_rx) = crossbeam_channel::bounded(queue_capacity.max(1));
        let (output_tx, output_rx) = crossbeam_channel::bounded(queue_capacity.max(1));
        Self {
            trace,
            loss,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            state: Mutex::new(state),
            input_tx,
            input_rx,
            output_tx,
            output_rx,
        }
    }

    fn next_release_time(cursor: &SlotCursor, offsets: &[u64]) -> Instant {
        cursor.base_time + Duration::from_millis(offsets[cursor.index])
    }

    fn advance_slot_cursor(cursor: &mut SlotCursor, offsets: &[u64]) {
        cursor.index += 1;
        if cursor.index == offsets.len() {
            cursor.index = 0;
            cursor.base_time += Duration::from_millis(*offsets.last().unwrap());
        }
    }

    /// Catches the slot cursor up to the present without sleeping, so a
    /// link that has been idle doesn't try to "wait" for slots long past.
    fn skip_unused_slots(&self, state: &mut State) {
        let offsets = self.trace.offsets_ms();
        let now = Instant::now();
        while Self::next_release_time(&state.slot, offsets) < now {
            Self::advance_slot_cursor(&mut state.slot, offsets);
        }
    }

    /// Sleeps until the current slot's release time if it's still ahead,
    /// then consumes it: advances the cursor and resets the byte budget.
    fn wait_and_consume_slot(&self, state: &mut State) {
        let offsets = self.trace.offsets_ms();
        let release = Self::next_release_time(&state.slot, offsets);
        let now = Instant::now();
        if release > now {
            std::thread::sleep(release - now);
        }
        Self::advance_slot_cursor(&mut state.slot, offsets);
        state.bytes_left_in_window = SLOT_BYTES;
    }

    /// Advances the loss cursor against wall-clock time (not per-packet) so
    /// that a schedule with more than one row cycles correctly regardless
    /// of how many packets pass between two wall-clock instants. A
    /// single-entry schedule never advances: its probability applies
    /// forever. Mirrors the source trace's own cursor: the schedule's last
    /// entry is used only to compute the wrap distance back to index 0, and
    /// is never itself the "current" entry.
    fn advance_loss_cursor(&self, state: &mut State, now: Instant) {
        let entries = self.loss.entries();
        if entries.len() < 2 {
            return;
        }
        loop {
            let (next_index, next_base) = if state.loss.index == entries.len() - 2 {
                (0, state.loss.base_time + Duration::from_millis(entries[entries.len() - 1].0))
            } else {
                (state.loss.index + 1, state.loss.base_time)
            };
            let next_release = next_base + Duration::from_millis(entries[next_index].0);
            if now > next_release {
                state.loss.index = next_index;
                state.loss.base_time = next_base;
            } else {
                break;
            }
        }
    }

    fn roll_loss(&self, state: &mut State) -> bool {
        self.advance_loss_cursor(state, Instant::now());
        let probability = self.loss.entries()[state.loss.index].1;
        let mut rng = self.rng.lock().expect("trace emulator rng poisoned");
        rng.random::<f64>() < probability
    }

    /// Charges `packet` against the remaining window if it fits; otherwise
    /// consumes the rest of the window and parks the remainder as
    /// in-transit, to be charged against a future slot.
    fn charge_or_park(&self, state: &mut State, packet: Packet, on_enqueue: &dyn Fn(&Packet)) {
        let len = packet.len();
        if len <= state.bytes_left_in_window {
            state.bytes_left_in_window -= len;
            on_enqueue(&packet);
            let _ = self.output_tx.send(packet);
        } else {
            let leftover = len - state.bytes_left_in_window;
            state.bytes_left_in_window = 0;
            state.in_transit = Some(InTransit { packet, leftover });
        }
    }

    /// Opportunistically drains whatever is already queued while the
    /// current window still has room, splitting a packet across slots
    /// (via `charge_or_park`) rather than parking it untouched the moment
    /// it doesn't fit.
    fn drain_opportunistically(&self, state: &mut State, on_dequeue: &mut dyn FnMut(&mut Packet), on_enqueue: &dyn Fn(&Packet)) {
        while state.bytes_left_in_window > 0 {
            let mut packet = match self.input_rx.try_recv() {
                Ok(p) => p,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            on_dequeue(&mut packet);
            self.charge_or_park(state, packet, on_enqueue);
        }
    }
}

impl LinkEmulator for TraceEmulator {
    fn kind_name(&self) -> &'static str {
        "trace"
    }

    fn write_incoming(&self, packet: Packet) {
        let _ = self.input_tx.try_send(packet);
    }

    fn run_emulation_step(
        &self,
        on_dequeue: &mut dyn FnMut(&mut Packet),
        on_enqueue: &dyn Fn(&Packet),
        on_drop: &dyn Fn(&Packet),
    ) {
        let mut state = self.state.lock().expect("trace emulator state poisoned");

        if let Some(in_transit) = state.in_transit.take() {
            self.wait_and_consume_slot(&mut state);
            state.bytes_left_in_window = state.bytes_left_in_window.saturating_sub(in_transit.leftover);
            on_enqueue(&in_transit.packet);
            let _ = self.output_tx.send(in_transit.packet);
            self.drain_opportunistically(&mut state, on_dequeue, on_enqueue);
            return;
        }

        let mut packet = match self.input_rx.recv_timeout(POLL_INTERVAL) {
            Ok(p) => p,
            Err(_) => return,
        };
        on_dequeue(&mut packet);

        self.skip_unused_slots(&mut state);
        self.wait_and_consume_slot(&mut state);

        if self.roll_loss(&mut state) {
            on_drop(&packet);
            return;
        }

        self.charge_or_park(&mut state, packet, on_enqueue);
        self.drain_opportunistically(&mut state, on_dequeue, on_enqueue);
    }

    fn read_outgoing(&self, running: &AtomicBool) -> Option<Packet> {
        while running.load(Ordering::Relaxed) {
            match self.output_rx.recv_timeout(POLL_INTERVAL) {
                Ok(packet) => return Some(packet),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }
}
