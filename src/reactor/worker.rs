// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! One worker: a thread looping over its poller, its timer set and its
//! cross-thread event queue, dispatching into the machine kernel. Every
//! machine lives on exactly one worker for its whole life, so machine
//! state is only ever touched from that worker's thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use mio;

use core::{SocketId, SocketType};
use core::session::SessionShared;
use core::socket::Socket;
use io_error::*;
use proto;
use reactor::{Signal, SessionCmd, SocketCmd, SocketNotify, PipeEvt, WorkerEvent,
              Task, Directory, DirectoryEntry, WorkerHandle};
use reactor::fsm::{Kernel, Event, FsmId};
use reactor::poller::Poller;
use reactor::timer::TimerSet;
use reactor::wakeup::{self, EventQueue};

use std::sync::mpsc::Sender;

/// Everything needed to start one worker. The handle can be cloned and
/// shared before the thread is spawned.
pub struct WorkerSeed {
    index: usize,
    handle: WorkerHandle,
    queue: EventQueue<Signal>
}

impl WorkerSeed {
    pub fn new(index: usize) -> WorkerSeed {
        let (handle, queue) = wakeup::event_queue();

        WorkerSeed {
            index: index,
            handle: handle,
            queue: queue
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    pub fn spawn(self, shared: Arc<SessionShared>) -> io::Result<thread::JoinHandle<()>> {
        let index = self.index;

        thread::Builder::new()
            .name(format!("scalemq-worker-{}", index))
            .spawn(move || {
                match WorkerLoop::new(self.index, self.queue, shared) {
                    Ok(mut worker) => worker.run(),
                    Err(e) => error!("worker {} failed to start: '{:?}'", index, e)
                }
            })
    }
}

struct WorkerLoop {
    index: usize,
    poller: Poller,
    timers: Rc<RefCell<TimerSet<Task>>>,
    queue: EventQueue<Signal>,
    wakeup_token: mio::Token,
    kernel: Kernel<WorkerEvent>,
    directory: Rc<RefCell<Directory>>,
    shared: Arc<SessionShared>,
    stopping: bool
}

impl WorkerLoop {
    fn new(index: usize, queue: EventQueue<Signal>, shared: Arc<SessionShared>) -> io::Result<WorkerLoop> {
        let mut poller = Poller::new()?;
        let wakeup_token = queue.register(&mut poller)?;

        Ok(WorkerLoop {
            index: index,
            poller: poller,
            timers: Rc::new(RefCell::new(TimerSet::new())),
            queue: queue,
            wakeup_token: wakeup_token,
            kernel: Kernel::new(),
            directory: Rc::new(RefCell::new(HashMap::new())),
            shared: shared,
            stopping: false
        })
    }

    fn run(&mut self) {
        debug!("worker {} started", self.index);

        loop {
            if self.stopping && self.kernel.is_empty() {
                break;
            }

            let timeout = self.timers.borrow_mut().timeout();

            if let Err(e) = self.poller.wait(timeout) {
                error!("worker {} poll failed: '{:?}'", self.index, e);
                break;
            }

            let mut woken = false;

            while let Some(event) = self.poller.event() {
                if event.token == self.wakeup_token {
                    woken = true;
                }
            }

            if woken {
                self.queue.unsignal();
                self.drain();
            }

            self.fire_timers();
        }

        debug!("worker {} finished", self.index);
    }

    fn drain(&mut self) {
        while let Some(signal) = self.queue.try_recv() {
            self.process(signal);
            self.kernel.pump();
        }
    }

    fn fire_timers(&mut self) {
        loop {
            let task = self.timers.borrow_mut().event();

            match task {
                Some(task) => {
                    let target = self.fsm_of(task.socket);

                    if let Some(fsm_id) = target {
                        self.kernel.raiseto(fsm_id, Event::User(WorkerEvent::Timer(task.kind)));
                        self.kernel.pump();
                    }
                }
                None => return
            }
        }
    }

    fn fsm_of(&self, sid: SocketId) -> Option<FsmId> {
        self.directory.borrow().get(&sid).map(|entry| entry.fsm)
    }

    fn process(&mut self, signal: Signal) {
        trace!("worker {} got a '{}' signal", self.index, signal.name());

        match signal {
            Signal::Session(SessionCmd::CreateSocket(id, kind, notify_tx)) => {
                self.create_socket(id, kind, notify_tx);
            }
            Signal::Session(SessionCmd::Shutdown) => {
                debug!("worker {} shutting down", self.index);
                self.stopping = true;

                let machines: Vec<FsmId> = self.directory.borrow().values().map(|entry| entry.fsm).collect();

                for fsm_id in machines {
                    self.kernel.stop(fsm_id);
                }
            }
            Signal::Socket(sid, SocketCmd::Close) => {
                match self.fsm_of(sid) {
                    Some(fsm_id) => self.kernel.stop(fsm_id),
                    None => error!("worker {} cannot close unknown socket [{:?}]", self.index, sid)
                }
            }
            Signal::Socket(sid, cmd) => {
                match self.fsm_of(sid) {
                    Some(fsm_id) => self.kernel.raiseto(fsm_id, Event::User(WorkerEvent::Cmd(cmd))),
                    None => error!("worker {} got a '{}' command for unknown socket [{:?}]", self.index, cmd.name(), sid)
                }
            }
            Signal::Pipe(sid, eid, evt) => {
                match self.fsm_of(sid) {
                    Some(fsm_id) => self.kernel.raiseto(fsm_id, Event::User(WorkerEvent::Pipe(eid, evt))),
                    None => {
                        if let PipeEvt::Attached(conduit, _) = evt {
                            let mut refused = conduit;

                            refused.close(true);
                        }
                    }
                }
            }
        }
    }

    fn create_socket(&mut self, id: SocketId, kind: SocketType, notify_tx: Sender<SocketNotify>) {
        if self.stopping {
            let _ = notify_tx.send(SocketNotify::NotCreated(terminating_io_error()));
            return;
        }

        debug!("worker {} creating socket [{:?}] of type {:?}", self.index, id, kind);

        let notify = Rc::new(notify_tx.clone());
        let proto = proto::create_protocol(kind, notify.clone());
        let socket = Socket::new(
            id,
            kind,
            proto,
            notify.clone(),
            self.timers.clone(),
            self.shared.clone(),
            self.index,
            self.directory.clone());
        let fsm_id = self.kernel.insert(Box::new(socket), None);

        self.kernel.start(fsm_id);
        self.directory.borrow_mut().insert(id, DirectoryEntry {
            fsm: fsm_id,
            notify: notify_tx
        });

        let _ = notify.send(SocketNotify::Created);
    }
}
