use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::packet::Packet;

use super::{LinkEmulator, POLL_INTERVAL};

/// Fixed one-way delay, no loss, no throughput cap. The simplest link: every
/// packet that enters eventually leaves, FIFO, `delay` after it arrived —
/// not `delay` after this step happened to run, so a backlog never inflates
/// a packet's simulated transit time beyond `delay`.
pub struct DelayEmulator {
    delay: Duration,
    input_tx: Sender<Packet>,
    input_rx: Receiver<Packet>,
    output_tx: Sender<Packet>,
    output_rx: Receiver<Packet>,
}

impl DelayEmulator {
    pub fn new(delay: Duration) -> Self {
        Self::with_queue_capacity(delay, 256)
    }

    pub fn with_queue_capacity(delay: Duration, queue_capacity: usize) -> Self {
        let (input_tx, input_rx) = crossbeam_channel::bounded(queue_capacity.max(1));
        let (output_tx, output_rx) = crossbeam_channel::bounded(queue_capacity.max(1));
        Self {
            delay,
            input_tx,
            input_rx,
            output_tx,
            output_rx,
        }
    }
}

impl LinkEmulator for DelayEmulator {
    fn kind_name(&self) -> &'static str {
        "delay"
    }

    fn write_incoming(&self, packet: Packet) {
        let _ = self.input_tx.try_send(packet);
    }

    fn run_emulation_step(
        &self,
        on_dequeue: &mut dyn FnMut(&mut Packet),
        on_enqueue: &dyn Fn(&Packet),
        _on_drop: &dyn Fn(&Packet),
    ) {
        let mut packet = match self.input_rx.recv_timeout(POLL_INTERVAL) {
            Ok(p) => p,
            Err(_) => return,
        };
        on_dequeue(&mut packet);

        let release_time = packet.arrival_time + self.delay;
        let now = Instant::now();
        if release_time > now {
            std::thread::sleep(release_time - now);
        }

        on_enqueue(&packet);
        let _ = self.output_tx.send(packet);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Address, PacketKind};
    use bytes::Bytes;

    fn sample(id: u64) -> Packet {
        Packet {
            src: 0 as Address,
            dst: 1 as Address,
            hops_left: 4,
            payload: Bytes::from_static(b"hi"),
            arrival_time: Instant::now(),
            id,
            kind: PacketKind::Data,
        }
    }

    #[test]
    fn forwards_after_delay() {
        let link = DelayEmulator::new(Duration::from_millis(5));
        link.write_incoming(sample(1));
        let start = Instant::now();
        link.run_emulation_step(&mut |_| {}, &|_| {}, &|_| {});
        let out = link.read_outgoing(&AtomicBool::new(true)).unwrap();
        assert_eq!(out.id, 1);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn zero_delay_does_not_block() {
        let link = DelayEmulator::new(Duration::ZERO);
        link.write_incoming(sample(2));
        link.run_emulation_step(&mut |_| {}, &|_| {}, &|_| {});
        let out = link.read_outgoing(&AtomicBool::new(true)).unwrap();
        assert_eq!(out.id, 2);
    }

    #[test]
    fn sleeps_only_the_remaining_delay_not_the_full_delay_again() {
        let delay = Duration::from_millis(40);
        let link = DelayEmulator::new(delay);
        let mut packet = sample(3);
        // Pretend this packet already sat around for half the delay before
        // reaching this link's queue.
        packet.arrival_time = Instant::now() - Duration::from_millis(20);
        link.write_incoming(packet);

        let start = Instant::now();
        link.run_emulation_step(&mut |_| {}, &|_| {}, &|_| {});
        let elapsed = start.elapsed();
        assert!(elapsed < delay, "should not re-sleep the full delay: {elapsed:?}");
    }
}
