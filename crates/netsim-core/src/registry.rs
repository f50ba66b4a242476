//! The static link overlay: which drone addresses are neighbors, and the
//! link emulator instance that governs each directed edge between them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::link::{LinkEmulator, LinkId};
use crate::packet::Address;

#[derive(Default)]
pub struct LinkTable {
    links: HashMap<LinkId, Arc<dyn LinkEmulator>>,
    neighbors: HashMap<Address, Vec<Address>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: Address, to: Address, emulator: Arc<dyn LinkEmulator>) {
        self.links.insert((from, to), emulator);
        self.neighbors.entry(from).or_default().push(to);
    }

    pub fn neighbors_of(&self, addr: Address) -> &[Address] {
        self.neighbors
            .get(&addr)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn emulator(&self, id: LinkId) -> Option<&Arc<dyn LinkEmulator>> {
        self.links.get(&id)
    }

    pub fn link_ids(&self) -> impl Iterator<Item = &LinkId> {
        self.links.keys()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.neighbors.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::DelayEmulator;
    use std::time::Duration;

    #[test]
    fn tracks_neighbors_per_source() {
        let mut table = LinkTable::new();
        table.insert(0, 1, Arc::new(DelayEmulator::new(Duration::ZERO)));
        table.insert(0, 2, Arc::new(DelayEmulator::new(Duration::ZERO)));
        table.insert(1, 2, Arc::new(DelayEmulator::new(Duration::ZERO)));

        let mut zero_neighbors = table.neighbors_of(0).to_vec();
        zero_neighbors.sort();
        assert_eq!(zero_neighbors, vec![1, 2]);
        assert_eq!(table.neighbors_of(1), &[2]);
        assert!(table.neighbors_of(99).is_empty());
        assert!(table.emulator((0, 1)).is_some());
        assert!(table.emulator((1, 0)).is_none());
    }
}
