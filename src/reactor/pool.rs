// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use core::session::SessionShared;
use reactor::{Signal, SessionCmd, WorkerHandle};
use reactor::worker::WorkerSeed;

/// Fixed set of workers. Sockets are assigned to a worker round-robin
/// at creation time and stay there.
pub struct Pool {
    handles: Vec<WorkerHandle>,
    threads: Vec<thread::JoinHandle<()>>,
    next: AtomicUsize
}

impl Pool {
    pub fn seeds(count: usize) -> Vec<WorkerSeed> {
        (0..count).map(WorkerSeed::new).collect()
    }

    pub fn launch(seeds: Vec<WorkerSeed>, shared: Arc<SessionShared>) -> io::Result<Pool> {
        let handles: Vec<WorkerHandle> = seeds.iter().map(|seed| seed.handle()).collect();
        let mut threads = Vec::with_capacity(seeds.len());

        for seed in seeds {
            threads.push(seed.spawn(shared.clone())?);
        }

        Ok(Pool {
            handles: handles,
            threads: threads,
            next: AtomicUsize::new(0)
        })
    }

    pub fn choose(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % self.handles.len()
    }

    pub fn handle(&self, index: usize) -> &WorkerHandle {
        &self.handles[index]
    }

    /// Asks every worker to close its sockets and waits for the threads.
    pub fn shutdown(&mut self) {
        for handle in &self.handles {
            let _ = handle.send(Signal::Session(SessionCmd::Shutdown));
        }
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}
