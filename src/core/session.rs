// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::sync::Mutex;

use core::SocketId;
use reactor::WorkerHandle;
use sequence::Sequence;
use transport::inproc::Registry;

/// State shared by the facade, the workers and the socket machines:
/// the worker pool handles, the socket handle table, the inproc name
/// registry and the endpoint id sequence. Each table is guarded by its
/// own mutex and none is held while posting signals.
pub struct SessionShared {
    pub seq: Sequence,
    pub handles: Mutex<HandleTable>,
    pub registry: Registry,
    pub workers: Vec<WorkerHandle>
}

impl SessionShared {
    pub fn new(workers: Vec<WorkerHandle>) -> SessionShared {
        SessionShared {
            seq: Sequence::new(),
            handles: Mutex::new(HandleTable::new()),
            registry: Registry::new(),
            workers: workers
        }
    }
}

/// Socket handle table with a free list: a socket id is the index of its
/// slot, and the slot records the worker the socket is pinned to.
pub struct HandleTable {
    slots: Vec<Option<usize>>,
    free: Vec<usize>
}

impl HandleTable {
    pub fn new() -> HandleTable {
        HandleTable {
            slots: Vec::new(),
            free: Vec::new()
        }
    }

    pub fn insert(&mut self, worker: usize) -> SocketId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(worker);
                SocketId(index)
            }
            None => {
                self.slots.push(Some(worker));
                SocketId(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, id: SocketId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            if slot.take().is_some() {
                self.free.push(id.0);
            }
        }
    }

    pub fn worker_of(&self, id: SocketId) -> Option<usize> {
        match self.slots.get(id.0) {
            Some(&Some(worker)) => Some(worker),
            _ => None
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use core::SocketId;
    use super::HandleTable;

    #[test]
    fn freed_handles_are_reused() {
        let mut table = HandleTable::new();
        let first = table.insert(0);
        let second = table.insert(1);

        assert_eq!(SocketId(0), first);
        assert_eq!(SocketId(1), second);
        assert_eq!(Some(1), table.worker_of(second));

        table.remove(first);
        assert_eq!(None, table.worker_of(first));
        assert_eq!(1, table.len());

        let third = table.insert(2);
        assert_eq!(first, third);
        assert_eq!(Some(2), table.worker_of(third));
    }

    #[test]
    fn double_remove_is_harmless() {
        let mut table = HandleTable::new();
        let id = table.insert(0);

        table.remove(id);
        table.remove(id);

        assert_eq!(0, table.len());

        let again = table.insert(4);
        assert_eq!(id, again);
    }
}
