// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::cmp;
use std::io;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use core::{SocketId, SocketType};
use core::session::SessionShared;
use io_error::*;
use reactor::{Signal, SessionCmd, SocketCmd, SocketNotify, ProbeNotify, ProbeWaiter, WorkerHandle};
use reactor::pool::Pool;
use facade::socket::Socket;

/// Entry point of the library. A session owns the worker pool and the
/// tables shared by all sockets; dropping it closes every socket still
/// alive and joins the workers.
pub struct Session {
    shared: Arc<SessionShared>,
    pool: Pool
}

impl Session {
    pub fn new() -> io::Result<Session> {
        Session::with_workers(1)
    }

    pub fn with_workers(count: usize) -> io::Result<Session> {
        let seeds = Pool::seeds(cmp::max(1, count));
        let handles: Vec<WorkerHandle> = seeds.iter().map(|seed| seed.handle()).collect();
        let shared = Arc::new(SessionShared::new(handles));
        let pool = Pool::launch(seeds, shared.clone())?;

        Ok(Session {
            shared: shared,
            pool: pool
        })
    }

    /// Creates a socket of the given type, pinned to one of the pool's
    /// workers chosen round-robin.
    pub fn create_socket(&self, socket_type: SocketType) -> io::Result<Socket> {
        let worker = self.pool.choose();
        let id = self.shared.handles.lock().unwrap().insert(worker);
        let (tx, rx) = mpsc::channel();
        let handle = self.pool.handle(worker).clone();
        let send_res = handle.send(Signal::Session(SessionCmd::CreateSocket(id, socket_type, tx)));

        if let Err(e) = send_res {
            self.shared.handles.lock().unwrap().remove(id);
            return Err(e);
        }

        match rx.recv() {
            Ok(SocketNotify::Created) => Ok(Socket::new(id, socket_type, handle, rx)),
            Ok(SocketNotify::NotCreated(e)) => {
                self.shared.handles.lock().unwrap().remove(id);
                Err(e)
            }
            Ok(_) => Err(other_io_error("unexpected evt")),
            Err(_) => Err(other_io_error("evt channel closed"))
        }
    }

    /// Waits until at least one of the entries is ready in a direction
    /// it registered interest for, or the timeout elapses. Returns the
    /// number of ready entries.
    pub fn poll(&self, entries: &mut [PollEntry], timeout: Duration) -> io::Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        for entry in entries.iter() {
            if self.shared.handles.lock().unwrap().worker_of(entry.sid).is_none() {
                return Err(bad_handle_io_error("unknown socket"));
            }
        }

        let token = self.shared.seq.next() as u64;
        let (tx, rx) = mpsc::channel();

        for (index, entry) in entries.iter_mut().enumerate() {
            entry.readable = false;
            entry.writable = false;
            entry.cmd_sender.send(Signal::Socket(entry.sid, SocketCmd::Probe(ProbeWaiter {
                token: token,
                index: index,
                pollin: entry.pollin,
                pollout: entry.pollout,
                tx: tx.clone()
            })))?;
        }
        drop(tx);

        let deadline = Instant::now() + timeout;
        let mut count = 0;

        loop {
            let now = Instant::now();

            if now >= deadline {
                break;
            }

            match rx.recv_timeout(deadline - now) {
                Ok(update) => {
                    apply(entries, update, &mut count);
                    if count > 0 {
                        while let Ok(update) = rx.try_recv() {
                            apply(entries, update, &mut count);
                        }
                        break;
                    }
                }
                Err(_) => break
            }
        }

        for entry in entries.iter() {
            let _ = entry.cmd_sender.send(Signal::Socket(entry.sid, SocketCmd::Unprobe(token)));
        }

        Ok(count)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pool.shutdown();
    }
}

/// One socket's interest in a poll call and, after the call, its
/// observed readiness.
pub struct PollEntry {
    sid: SocketId,
    cmd_sender: WorkerHandle,
    pollin: bool,
    pollout: bool,
    readable: bool,
    writable: bool
}

impl PollEntry {
    pub fn new(socket: &Socket, pollin: bool, pollout: bool) -> PollEntry {
        PollEntry {
            sid: socket.get_id(),
            cmd_sender: socket.get_cmd_sender(),
            pollin: pollin,
            pollout: pollout,
            readable: false,
            writable: false
        }
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

fn apply(entries: &mut [PollEntry], update: ProbeNotify, count: &mut usize) {
    if let Some(entry) = entries.get_mut(update.index) {
        let readable = entry.pollin && update.can_recv;
        let writable = entry.pollout && update.can_send;

        if (readable || writable) && !(entry.readable || entry.writable) {
            *count += 1;
        }

        entry.readable = readable;
        entry.writable = writable;
    }
}
