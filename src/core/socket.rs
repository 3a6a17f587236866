// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The socket base: one machine per socket, pinned to a worker. It owns
//! the option storage, the endpoint and pipe tables and the protocol
//! instance, routes user commands and pipe events into the protocol,
//! arms the user visible deadlines and drives linger on close.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use core::{SocketId, EndpointId, SocketType};
use core::config::{Config, SocketOption, SocketOptionKind};
use core::endpoint::{Pipe, PipeMachine};
use core::session::SessionShared;
use io_error::*;
use proto::{self, Protocol, ProtoTimer};
use reactor::{Signal, SocketCmd, SocketNotify, PipeEvt, WorkerEvent, Task, TimerKind,
              ProbeNotify, ProbeWaiter, Directory};
use reactor::fsm::{self, Machine, Event, FsmId, Shutdown};
use reactor::timer::{TimerSet, TimerHandle};
use transport::{split_scheme, Conduit};
use transport::inproc::{self, PeerParams};

enum Endpoint {
    Listener { name: String },
    Connector { name: String }
}

struct PipeRecord {
    fsm: FsmId,
    parent: EndpointId,
    monitor: Box<dyn Conduit>,
    peer_gone: bool
}

pub struct Socket {
    id: SocketId,
    kind: SocketType,
    config: Config,
    proto: Box<dyn Protocol>,
    notify: Rc<Sender<SocketNotify>>,
    timers: Rc<RefCell<TimerSet<Task>>>,
    shared: Arc<SessionShared>,
    worker_index: usize,
    directory: Rc<RefCell<Directory>>,
    endpoints: HashMap<EndpointId, Endpoint>,
    pipes: HashMap<EndpointId, PipeRecord>,
    stopping_pipes: HashMap<EndpointId, FsmId>,
    probes: Vec<ProbeWaiter>,
    linger_timer: Option<TimerHandle>
}

/// Context handed to the protocol during a callback: timer scheduling
/// plus collection of the pipes the protocol found dead.
struct ProtoCtx {
    socket: SocketId,
    timers: Rc<RefCell<TimerSet<Task>>>,
    dead: Vec<EndpointId>
}

impl proto::Context for ProtoCtx {
    fn schedule(&mut self, timer: ProtoTimer, delay: Duration) -> TimerHandle {
        let kind = match timer {
            ProtoTimer::Resend => TimerKind::Resend,
            ProtoTimer::SurveyExpire => TimerKind::SurveyExpire
        };

        self.timers.borrow_mut().add(Task { socket: self.socket, kind: kind }, delay)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.borrow_mut().rm(handle);
    }

    fn pipe_failed(&mut self, eid: EndpointId) {
        if !self.dead.contains(&eid) {
            self.dead.push(eid);
        }
    }
}

impl Socket {
    pub fn new(
        id: SocketId,
        kind: SocketType,
        proto: Box<dyn Protocol>,
        notify: Rc<Sender<SocketNotify>>,
        timers: Rc<RefCell<TimerSet<Task>>>,
        shared: Arc<SessionShared>,
        worker_index: usize,
        directory: Rc<RefCell<Directory>>) -> Socket {
        Socket {
            id: id,
            kind: kind,
            config: Config::default(),
            proto: proto,
            notify: notify,
            timers: timers,
            shared: shared,
            worker_index: worker_index,
            directory: directory,
            endpoints: HashMap::new(),
            pipes: HashMap::new(),
            stopping_pipes: HashMap::new(),
            probes: Vec::new(),
            linger_timer: None
        }
    }

    fn send_notify(&self, evt: SocketNotify) {
        let send_res = self.notify.send(evt);

        if send_res.is_err() {
            error!("[{:?}] failed to notify the facade: '{:?}'", self.id, send_res.err());
        }
    }

    fn proto_ctx(&self) -> ProtoCtx {
        ProtoCtx {
            socket: self.id,
            timers: self.timers.clone(),
            dead: Vec::new()
        }
    }

    fn peer_params(&self, eid: EndpointId) -> PeerParams {
        PeerParams {
            socket: self.id,
            eid: eid,
            worker: self.shared.workers[self.worker_index].clone(),
            recv_buffer: self.config.recv_buffer,
            recv_max_size: self.config.recv_max_size,
            proto_ids: (self.proto.id(), self.proto.peer_id())
        }
    }

    fn arm(&self, kind: TimerKind, delay: Option<Duration>) -> Option<TimerHandle> {
        delay.map(|d| self.timers.borrow_mut().add(Task { socket: self.id, kind: kind }, d))
    }

    /// Removes the pipes the protocol reported dead; removal may make
    /// the protocol report more of them.
    fn reap(&mut self, ctx: &mut fsm::Context<WorkerEvent>, mut dead: Vec<EndpointId>) {
        while let Some(eid) = dead.pop() {
            let record = match self.pipes.remove(&eid) {
                Some(record) => record,
                None => continue
            };

            debug!("[{:?}] pipe [{:?}] removed", self.id, eid);

            let mut pctx = self.proto_ctx();

            self.proto.remove_pipe(&mut pctx, eid);
            dead.extend(pctx.dead);

            self.stopping_pipes.insert(eid, record.fsm);
            ctx.stop_child(record.fsm);

            // A connecting endpoint whose pipe died goes back to pending
            // once the reconnect interval elapses.
            if record.parent == eid && self.endpoints.contains_key(&eid) {
                let delay = self.config.reconnect_ivl;

                self.timers.borrow_mut().add(
                    Task { socket: self.id, kind: TimerKind::Reconnect(eid) },
                    delay);
            }
        }
    }

    fn attach(&mut self, ctx: &mut fsm::Context<WorkerEvent>, eid: EndpointId, parent: EndpointId, conduit: Box<dyn Conduit>) {
        let monitor = conduit.split();
        let lifecycle = conduit.split();
        let pipe = Pipe::new(eid, self.config.send_priority, self.config.recv_priority, conduit);

        match self.proto.add_pipe(eid, pipe) {
            Ok(()) => {
                let fsm_id = ctx.spawn_child(Box::new(PipeMachine::new(eid, lifecycle)));

                self.pipes.insert(eid, PipeRecord {
                    fsm: fsm_id,
                    parent: parent,
                    monitor: monitor,
                    peer_gone: false
                });

                debug!("[{:?}] pipe [{:?}] attached", self.id, eid);

                let mut pctx = self.proto_ctx();

                self.proto.on_send_ready(&mut pctx, eid);

                let dead = pctx.dead;

                self.reap(ctx, dead);
            }
            Err(e) => {
                debug!("[{:?}] pipe [{:?}] refused: '{:?}'", self.id, eid, e);

                let mut refused = monitor;

                refused.close(true);
            }
        }
    }

    fn establish(&mut self, ctx: &mut fsm::Context<WorkerEvent>, me: PeerParams, binder: PeerParams) {
        let mut binder_pipe = binder.clone();

        binder_pipe.eid = inproc::pipe_eid(&self.shared.seq);

        let (mine, theirs) = inproc::link(&me, &binder_pipe);
        let send_res = binder_pipe.worker.send(
            Signal::Pipe(binder_pipe.socket, binder_pipe.eid, PipeEvt::Attached(Box::new(theirs), binder.eid)));

        if send_res.is_err() {
            error!("[{:?}] failed to hand the pipe to the binder", self.id);
            return;
        }

        self.attach(ctx, me.eid, me.eid, Box::new(mine));
    }

    fn do_bind(&mut self, ctx: &mut fsm::Context<WorkerEvent>, addr: &str) -> io::Result<EndpointId> {
        let (scheme, name) = split_scheme(addr)?;

        if scheme != "inproc" {
            return Err(invalid_input_io_error("unknown transport"));
        }

        let eid = EndpointId(self.shared.seq.next());
        let parked = self.shared.registry.bind(name, self.peer_params(eid))?;

        self.endpoints.insert(eid, Endpoint::Listener { name: name.to_string() });
        debug!("[{:?}] endpoint [{:?}] bound to '{}'", self.id, eid, addr);

        for connector in parked {
            let my_pipe = self.peer_params(inproc::pipe_eid(&self.shared.seq));

            if !my_pipe.compatible(&connector) {
                debug!("[{:?}] parked connector refused, protocol mismatch", self.id);
                continue;
            }

            let (mine, theirs) = inproc::link(&my_pipe, &connector);
            let send_res = connector.worker.send(
                Signal::Pipe(connector.socket, connector.eid, PipeEvt::Attached(Box::new(theirs), connector.eid)));

            if send_res.is_err() {
                error!("[{:?}] failed to hand the pipe to a parked connector", self.id);
                continue;
            }

            self.attach(ctx, my_pipe.eid, eid, Box::new(mine));
        }

        Ok(eid)
    }

    fn do_connect(&mut self, ctx: &mut fsm::Context<WorkerEvent>, addr: &str) -> io::Result<EndpointId> {
        let (scheme, name) = split_scheme(addr)?;

        if scheme != "inproc" {
            return Err(invalid_input_io_error("unknown transport"));
        }

        let eid = EndpointId(self.shared.seq.next());
        let me = self.peer_params(eid);

        match self.shared.registry.lookup(name) {
            Some(binder) => {
                if !me.compatible(&binder) {
                    return Err(invalid_input_io_error("protocol mismatch"));
                }

                self.endpoints.insert(eid, Endpoint::Connector { name: name.to_string() });
                self.establish(ctx, me, binder);
            }
            None => {
                self.shared.registry.park(name.to_string(), me);
                self.endpoints.insert(eid, Endpoint::Connector { name: name.to_string() });
            }
        }

        debug!("[{:?}] endpoint [{:?}] connecting to '{}'", self.id, eid, addr);

        Ok(eid)
    }

    fn process_cmd(&mut self, ctx: &mut fsm::Context<WorkerEvent>, cmd: SocketCmd) {
        match cmd {
            SocketCmd::Bind(addr) => {
                let evt = match self.do_bind(ctx, &addr) {
                    Ok(eid) => SocketNotify::Bound(eid),
                    Err(e) => SocketNotify::NotBound(e)
                };

                self.send_notify(evt);
            }
            SocketCmd::Connect(addr) => {
                let evt = match self.do_connect(ctx, &addr) {
                    Ok(eid) => SocketNotify::Connected(eid),
                    Err(e) => SocketNotify::NotConnected(e)
                };

                self.send_notify(evt);
            }
            SocketCmd::SendMsg(msg, nonblock) => {
                debug!("[{:?}] send", self.id);
                if nonblock && !self.proto.can_send() {
                    self.send_notify(SocketNotify::MsgNotSent(would_block_io_error("send would block")));
                    return;
                }

                let timeout = self.arm(TimerKind::SendDeadline, self.config.send_timeout);
                let mut pctx = self.proto_ctx();

                self.proto.send(&mut pctx, msg, timeout);

                let dead = pctx.dead;

                self.reap(ctx, dead);
            }
            SocketCmd::RecvMsg(nonblock) => {
                debug!("[{:?}] recv", self.id);
                if nonblock && !self.proto.can_recv() {
                    self.send_notify(SocketNotify::MsgNotRecv(would_block_io_error("recv would block")));
                    return;
                }

                let timeout = self.arm(TimerKind::RecvDeadline, self.config.recv_timeout);
                let mut pctx = self.proto_ctx();

                self.proto.recv(&mut pctx, timeout);

                let dead = pctx.dead;

                self.reap(ctx, dead);
            }
            SocketCmd::SetOption(opt) => {
                let proto_res = self.proto.set_option(&opt);
                let conf_res = self.config.set(&opt);
                let evt = if proto_res.is_ok() || conf_res.is_ok() {
                    SocketNotify::OptionSet
                } else if is_pattern_option(&opt) {
                    SocketNotify::OptionNotSet(proto_res.err().unwrap_or_else(|| invalid_input_io_error("unknown option")))
                } else {
                    SocketNotify::OptionNotSet(conf_res.err().unwrap_or_else(|| invalid_input_io_error("unknown option")))
                };

                self.send_notify(evt);
            }
            SocketCmd::GetOption(kind) => {
                let evt = match self.get_option(kind) {
                    Ok(opt) => SocketNotify::OptionRetrieved(opt),
                    Err(e) => SocketNotify::OptionNotRetrieved(e)
                };

                self.send_notify(evt);
            }
            SocketCmd::CloseEndpoint(eid) => self.close_endpoint(ctx, eid),
            SocketCmd::Probe(waiter) => {
                let can_send = self.proto.can_send();
                let can_recv = self.proto.can_recv();

                if (waiter.pollin && can_recv) || (waiter.pollout && can_send) {
                    let _ = waiter.tx.send(ProbeNotify {
                        index: waiter.index,
                        can_send: can_send,
                        can_recv: can_recv
                    });
                } else {
                    self.probes.push(waiter);
                }
            }
            SocketCmd::Unprobe(token) => {
                self.probes.retain(|waiter| waiter.token != token);
            }
            SocketCmd::Close => {
                // Translated into a machine stop by the worker.
                error!("[{:?}] unexpected close command", self.id);
            }
        }
    }

    fn get_option(&self, kind: SocketOptionKind) -> io::Result<SocketOption> {
        self.config.get(kind)
    }

    fn close_endpoint(&mut self, ctx: &mut fsm::Context<WorkerEvent>, eid: EndpointId) {
        match self.endpoints.remove(&eid) {
            Some(Endpoint::Listener { name }) => {
                debug!("[{:?}] endpoint [{:?}] shut down", self.id, eid);
                self.shared.registry.unbind(&name, self.id);

                let children: Vec<EndpointId> = self.pipes.iter()
                    .filter(|&(_, record)| record.parent == eid)
                    .map(|(&pipe_eid, _)| pipe_eid)
                    .collect();

                self.reap(ctx, children);
            }
            Some(Endpoint::Connector { .. }) => {
                debug!("[{:?}] endpoint [{:?}] shut down", self.id, eid);
                self.shared.registry.unpark(self.id, eid);
                if self.pipes.contains_key(&eid) {
                    self.reap(ctx, vec![eid]);
                }
            }
            None => debug!("[{:?}] shutdown of an unknown endpoint [{:?}]", self.id, eid)
        }
    }

    fn process_pipe(&mut self, ctx: &mut fsm::Context<WorkerEvent>, eid: EndpointId, evt: PipeEvt) {
        trace!("[{:?}] pipe [{:?}] raised '{}'", self.id, eid, evt.name());

        match evt {
            PipeEvt::Attached(conduit, parent) => self.attach(ctx, eid, parent, conduit),
            PipeEvt::Readable => {
                if self.pipes.contains_key(&eid) {
                    let mut pctx = self.proto_ctx();

                    self.proto.on_recv_ready(&mut pctx, eid);

                    let dead = pctx.dead;

                    self.reap(ctx, dead);
                }
            }
            PipeEvt::Writable => {
                if self.pipes.contains_key(&eid) {
                    let mut pctx = self.proto_ctx();

                    self.proto.on_send_ready(&mut pctx, eid);

                    let dead = pctx.dead;

                    self.reap(ctx, dead);
                } else if let Some(&fsm_id) = self.stopping_pipes.get(&eid) {
                    // Drain progress for a pipe already on its way out.
                    ctx.raiseto(fsm_id, WorkerEvent::Pipe(eid, PipeEvt::Writable));
                }
            }
            PipeEvt::Closed => {
                let drain = match self.pipes.get_mut(&eid) {
                    Some(record) => {
                        record.peer_gone = true;
                        record.monitor.has_pending_recv()
                    }
                    None => {
                        if let Some(&fsm_id) = self.stopping_pipes.get(&eid) {
                            ctx.raiseto(fsm_id, WorkerEvent::Pipe(eid, PipeEvt::Closed));
                        }
                        return;
                    }
                };

                if drain {
                    debug!("[{:?}] pipe [{:?}] closed by peer, draining", self.id, eid);
                } else {
                    self.reap(ctx, vec![eid]);
                }
            }
        }
    }

    fn process_timer(&mut self, ctx: &mut fsm::Context<WorkerEvent>, kind: TimerKind) {
        match kind {
            TimerKind::SendDeadline => {
                let mut pctx = self.proto_ctx();

                self.proto.on_send_timeout(&mut pctx);
            }
            TimerKind::RecvDeadline => {
                let mut pctx = self.proto_ctx();

                self.proto.on_recv_timeout(&mut pctx);
            }
            TimerKind::Resend => {
                let mut pctx = self.proto_ctx();

                self.proto.on_timer(&mut pctx, ProtoTimer::Resend);

                let dead = pctx.dead;

                self.reap(ctx, dead);
            }
            TimerKind::SurveyExpire => {
                let mut pctx = self.proto_ctx();

                self.proto.on_timer(&mut pctx, ProtoTimer::SurveyExpire);
            }
            TimerKind::Reconnect(eid) => self.reconnect(ctx, eid),
            TimerKind::Linger => {}
        }
    }

    fn reconnect(&mut self, ctx: &mut fsm::Context<WorkerEvent>, eid: EndpointId) {
        let name = match self.endpoints.get(&eid) {
            Some(&Endpoint::Connector { ref name }) => name.clone(),
            _ => return
        };

        if self.pipes.contains_key(&eid) || self.stopping_pipes.contains_key(&eid) {
            return;
        }

        debug!("[{:?}] endpoint [{:?}] reconnecting to '{}'", self.id, eid, name);

        let me = self.peer_params(eid);

        match self.shared.registry.lookup(&name) {
            Some(binder) => {
                if me.compatible(&binder) {
                    self.establish(ctx, me, binder);
                } else {
                    debug!("[{:?}] reconnect refused, protocol mismatch", self.id);
                }
            }
            None => self.shared.registry.park(name, me)
        }
    }

    fn sweep_probes(&mut self) {
        if self.probes.is_empty() {
            return;
        }

        let can_send = self.proto.can_send();
        let can_recv = self.proto.can_recv();

        self.probes.retain(|waiter| {
            if (waiter.pollin && can_recv) || (waiter.pollout && can_send) {
                let _ = waiter.tx.send(ProbeNotify {
                    index: waiter.index,
                    can_send: can_send,
                    can_recv: can_recv
                });
                false
            } else {
                true
            }
        });
    }

    fn reply_closing(&self, cmd: SocketCmd) {
        match cmd {
            SocketCmd::Bind(_) => self.send_notify(SocketNotify::NotBound(interrupted_io_error("socket is closing"))),
            SocketCmd::Connect(_) => self.send_notify(SocketNotify::NotConnected(interrupted_io_error("socket is closing"))),
            SocketCmd::SendMsg(_, _) => self.send_notify(SocketNotify::MsgNotSent(interrupted_io_error("socket is closing"))),
            SocketCmd::RecvMsg(_) => self.send_notify(SocketNotify::MsgNotRecv(interrupted_io_error("socket is closing"))),
            SocketCmd::SetOption(_) => self.send_notify(SocketNotify::OptionNotSet(interrupted_io_error("socket is closing"))),
            SocketCmd::GetOption(_) => self.send_notify(SocketNotify::OptionNotRetrieved(interrupted_io_error("socket is closing"))),
            _ => {}
        }
    }

    fn finish(&mut self) {
        if let Some(handle) = self.linger_timer.take() {
            self.timers.borrow_mut().rm(handle);
        }

        self.probes.clear();
        self.send_notify(SocketNotify::Closed);
        self.directory.borrow_mut().remove(&self.id);
        self.shared.handles.lock().unwrap().remove(self.id);
        debug!("[{:?}] closed", self.id);
    }
}

fn is_pattern_option(opt: &SocketOption) -> bool {
    match *opt {
        SocketOption::Subscribe(_) |
        SocketOption::Unsubscribe(_) |
        SocketOption::SurveyDeadline(_) |
        SocketOption::ResendInterval(_) => true,
        _ => false
    }
}

impl Machine<WorkerEvent> for Socket {
    fn handle(&mut self, ctx: &mut fsm::Context<WorkerEvent>, ev: Event<WorkerEvent>) {
        match ev {
            Event::Start => debug!("[{:?}] socket of type {:?} started", self.id, self.kind),
            Event::Stop => {}
            Event::Stopped(fsm_id) => {
                self.stopping_pipes.retain(|_, &mut f| f != fsm_id);
            }
            Event::User(WorkerEvent::Cmd(cmd)) => self.process_cmd(ctx, cmd),
            Event::User(WorkerEvent::Pipe(eid, evt)) => self.process_pipe(ctx, eid, evt),
            Event::User(WorkerEvent::Timer(kind)) => self.process_timer(ctx, kind),
            Event::User(WorkerEvent::Abort) => {}
        }

        self.sweep_probes();
    }

    fn shutdown(&mut self, ctx: &mut fsm::Context<WorkerEvent>, ev: Event<WorkerEvent>) -> Shutdown {
        match ev {
            Event::Stop => {
                debug!("[{:?}] closing", self.id);

                let endpoints: Vec<(EndpointId, Endpoint)> = self.endpoints.drain().collect();

                for (eid, endpoint) in endpoints {
                    match endpoint {
                        Endpoint::Listener { name } => self.shared.registry.unbind(&name, self.id),
                        Endpoint::Connector { .. } => self.shared.registry.unpark(self.id, eid)
                    }
                }

                let mut pctx = self.proto_ctx();

                self.proto.close(&mut pctx);

                let records: Vec<(EndpointId, FsmId)> = self.pipes.drain()
                    .map(|(eid, record)| (eid, record.fsm))
                    .collect();

                for (eid, fsm_id) in records {
                    self.stopping_pipes.insert(eid, fsm_id);
                    ctx.stop_child(fsm_id);
                }

                if ctx.child_count() == 0 {
                    self.finish();
                    Shutdown::Done
                } else {
                    let delay = self.config.linger;

                    self.linger_timer = Some(self.timers.borrow_mut().add(
                        Task { socket: self.id, kind: TimerKind::Linger },
                        delay));
                    Shutdown::InProgress
                }
            }
            Event::Stopped(fsm_id) => {
                self.stopping_pipes.retain(|_, &mut f| f != fsm_id);
                if ctx.child_count() == 0 {
                    self.finish();
                    Shutdown::Done
                } else {
                    Shutdown::InProgress
                }
            }
            Event::User(WorkerEvent::Pipe(eid, evt)) => {
                match evt {
                    PipeEvt::Attached(conduit, _) => {
                        let mut refused = conduit;

                        refused.close(true);
                    }
                    PipeEvt::Writable | PipeEvt::Closed => {
                        if let Some(&fsm_id) = self.stopping_pipes.get(&eid) {
                            ctx.raiseto(fsm_id, WorkerEvent::Pipe(eid, evt));
                        }
                    }
                    PipeEvt::Readable => {}
                }
                Shutdown::InProgress
            }
            Event::User(WorkerEvent::Timer(TimerKind::Linger)) => {
                debug!("[{:?}] linger deadline elapsed", self.id);

                let lingering: Vec<FsmId> = self.stopping_pipes.values().cloned().collect();

                for fsm_id in lingering {
                    ctx.raiseto(fsm_id, WorkerEvent::Abort);
                }
                Shutdown::InProgress
            }
            Event::User(WorkerEvent::Cmd(cmd)) => {
                self.reply_closing(cmd);
                Shutdown::InProgress
            }
            _ => Shutdown::InProgress
        }
    }
}
