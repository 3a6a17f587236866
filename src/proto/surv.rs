// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};

use core::{EndpointId, SocketType};
use core::config::SocketOption;
use core::endpoint::Pipe;
use io_error::*;
use message::Message;
use reactor::SocketNotify;
use reactor::timer::TimerHandle;
use transport::{SendStatus, RecvStatus};
use super::{Protocol, Context, ProtoTimer, Timeout, clear_timeout};
use super::policy::broadcast::Distribution;
use super::policy::fair_queue::FairQueue;

/// Survey originator: each survey is broadcast to every writable pipe
/// with a fresh id, then responses carrying that id are fair-queued in
/// until the deadline elapses. Once expired, further responses are
/// discarded and receive reports a timeout.
pub struct Surveyor {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    dist: Distribution,
    fq: FairQueue,
    seq: u32,
    deadline: Duration,
    active: Option<u32>,
    expired: bool,
    timer: Option<TimerHandle>,
    pending_recv: Option<Timeout>
}

impl Surveyor {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> Surveyor {
        Surveyor {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
            dist: Distribution::new(),
            fq: FairQueue::new(),
            seq: 0,
            deadline: Duration::from_millis(1000),
            active: None,
            expired: false,
            timer: None,
            pending_recv: None
        }
    }

    fn send_notify(&self, evt: SocketNotify) {
        let send_res = self.notify.send(evt);

        if send_res.is_err() {
            error!("Failed to send notify to the facade: '{:?}'", send_res.err());
        }
    }

    fn broadcast(&mut self, ctx: &mut dyn Context, msg: &Message) {
        for eid in self.dist.targets() {
            let status = match self.pipes.get_mut(&eid) {
                Some(pipe) => pipe.send(msg.clone()),
                None => continue
            };

            match status {
                Ok(SendStatus::Sent) => {}
                Ok(SendStatus::Release) => self.dist.deactivate(eid),
                Err(_) => {
                    self.dist.deactivate(eid);
                    ctx.pipe_failed(eid);
                }
            }
        }
    }

    fn try_recv(&mut self, ctx: &mut dyn Context) {
        let expected = match self.active {
            Some(id) => id,
            None => return
        };

        if let Some(timeout) = self.pending_recv.take() {
            loop {
                let eid = match self.fq.pop() {
                    Some(eid) => eid,
                    None => {
                        self.pending_recv = Some(timeout);
                        return;
                    }
                };
                let status = match self.pipes.get_mut(&eid) {
                    Some(pipe) => pipe.recv(),
                    None => continue
                };
                let (mut msg, more) = match status {
                    Ok(RecvStatus::Recv(msg)) => (msg, true),
                    Ok(RecvStatus::Release(msg)) => (msg, false),
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(_) => {
                        ctx.pipe_failed(eid);
                        continue;
                    }
                };

                if more {
                    self.fq.activate(eid);
                }
                if msg.header.len() >= 4 && BigEndian::read_u32(&msg.header[..4]) == expected {
                    let rest = msg.header.split_off(4);

                    msg.header = rest;
                    clear_timeout(ctx, timeout);
                    self.send_notify(SocketNotify::MsgRecv(msg));
                    return;
                }

                trace!("response with a stale survey id dropped");
            }
        }
    }
}

impl Protocol for Surveyor {
    fn id(&self) -> u16 {
        self.kind.id()
    }

    fn peer_id(&self) -> u16 {
        self.kind.peer_id()
    }

    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()> {
        let prio = pipe.recv_prio();

        self.pipes.insert(eid, pipe);
        self.fq.insert(eid, prio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut dyn Context, eid: EndpointId) -> Option<Pipe> {
        self.dist.remove(eid);
        self.fq.remove(eid);
        self.pipes.remove(&eid)
    }

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout) {
        if let Some(handle) = self.timer.take() {
            ctx.cancel(handle);
        }

        self.seq = self.seq.wrapping_add(1);

        let id = self.seq | 0x8000_0000;
        let mut wire = msg;
        let mut header = vec![0u8; 4];

        BigEndian::write_u32(&mut header, id);
        wire.header = header;
        self.broadcast(ctx, &wire);
        self.active = Some(id);
        self.expired = false;
        self.timer = Some(ctx.schedule(ProtoTimer::SurveyExpire, self.deadline));
        clear_timeout(ctx, timeout);
        self.send_notify(SocketNotify::MsgSent);
    }

    fn on_send_ready(&mut self, _: &mut dyn Context, eid: EndpointId) {
        self.dist.activate(eid);
    }

    fn on_send_timeout(&mut self, _: &mut dyn Context) {
    }

    fn recv(&mut self, ctx: &mut dyn Context, timeout: Timeout) {
        if self.active.is_none() {
            let err = if self.expired {
                timedout_io_error("the survey has expired")
            } else {
                other_io_error("no active survey")
            };

            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotRecv(err));
            return;
        }

        self.pending_recv = Some(timeout);
        self.try_recv(ctx);
    }

    fn on_recv_ready(&mut self, ctx: &mut dyn Context, eid: EndpointId) {
        self.fq.activate(eid);
        if self.pending_recv.is_some() {
            self.try_recv(ctx);
        }
    }

    fn on_recv_timeout(&mut self, _: &mut dyn Context) {
        if self.pending_recv.take().is_some() {
            self.send_notify(SocketNotify::MsgNotRecv(timedout_io_error("recv timed out")));
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn Context, timer: ProtoTimer) {
        if timer != ProtoTimer::SurveyExpire {
            return;
        }

        debug!("survey deadline elapsed");
        self.active = None;
        self.expired = true;
        self.timer = None;
        if let Some(timeout) = self.pending_recv.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotRecv(timedout_io_error("the survey has expired")));
        }
    }

    fn set_option(&mut self, opt: &SocketOption) -> io::Result<()> {
        match *opt {
            SocketOption::SurveyDeadline(value) => {
                self.deadline = value;
                Ok(())
            }
            _ => Err(invalid_input_io_error("option not supported by the protocol"))
        }
    }

    fn can_send(&self) -> bool {
        true
    }

    fn can_recv(&self) -> bool {
        self.active.is_some() && self.fq.can_recv()
    }

    fn close(&mut self, ctx: &mut dyn Context) {
        if let Some(handle) = self.timer.take() {
            ctx.cancel(handle);
        }
        if let Some(timeout) = self.pending_recv.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotRecv(interrupted_io_error("socket is closing")));
        }
    }
}

/// Raw survey originator: the survey id header is owned by the user and
/// no deadline is armed. Outgoing messages are broadcast, responses are
/// fair-queued in untouched.
pub struct XSurveyor {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    dist: Distribution,
    fq: FairQueue,
    pending_recv: Option<Timeout>
}

impl XSurveyor {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> XSurveyor {
        XSurveyor {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
            dist: Distribution::new(),
            fq: FairQueue::new(),
            pending_recv: None
        }
    }

    fn send_notify(&self, evt: SocketNotify) {
        let send_res = self.notify.send(evt);

        if send_res.is_err() {
            error!("Failed to send notify to the facade: '{:?}'", send_res.err());
        }
    }

    fn try_recv(&mut self, ctx: &mut dyn Context) {
        if let Some(timeout) = self.pending_recv.take() {
            loop {
                let eid = match self.fq.pop() {
                    Some(eid) => eid,
                    None => {
                        self.pending_recv = Some(timeout);
                        return;
                    }
                };
                let status = match self.pipes.get_mut(&eid) {
                    Some(pipe) => pipe.recv(),
                    None => continue
                };

                match status {
                    Ok(RecvStatus::Recv(msg)) => {
                        self.fq.activate(eid);
                        clear_timeout(ctx, timeout);
                        self.send_notify(SocketNotify::MsgRecv(msg));
                        return;
                    }
                    Ok(RecvStatus::Release(msg)) => {
                        clear_timeout(ctx, timeout);
                        self.send_notify(SocketNotify::MsgRecv(msg));
                        return;
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(_) => {
                        ctx.pipe_failed(eid);
                        continue;
                    }
                }
            }
        }
    }
}

impl Protocol for XSurveyor {
    fn id(&self) -> u16 {
        self.kind.id()
    }

    fn peer_id(&self) -> u16 {
        self.kind.peer_id()
    }

    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()> {
        let prio = pipe.recv_prio();

        self.pipes.insert(eid, pipe);
        self.fq.insert(eid, prio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut dyn Context, eid: EndpointId) -> Option<Pipe> {
        self.dist.remove(eid);
        self.fq.remove(eid);
        self.pipes.remove(&eid)
    }

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout) {
        for eid in self.dist.targets() {
            let status = match self.pipes.get_mut(&eid) {
                Some(pipe) => pipe.send(msg.clone()),
                None => continue
            };

            match status {
                Ok(SendStatus::Sent) => {}
                Ok(SendStatus::Release) => self.dist.deactivate(eid),
                Err(_) => {
                    self.dist.deactivate(eid);
                    ctx.pipe_failed(eid);
                }
            }
        }

        clear_timeout(ctx, timeout);
        self.send_notify(SocketNotify::MsgSent);
    }

    fn on_send_ready(&mut self, _: &mut dyn Context, eid: EndpointId) {
        self.dist.activate(eid);
    }

    fn on_send_timeout(&mut self, _: &mut dyn Context) {
    }

    fn recv(&mut self, ctx: &mut dyn Context, timeout: Timeout) {
        self.pending_recv = Some(timeout);
        self.try_recv(ctx);
    }

    fn on_recv_ready(&mut self, ctx: &mut dyn Context, eid: EndpointId) {
        self.fq.activate(eid);
        self.try_recv(ctx);
    }

    fn on_recv_timeout(&mut self, _: &mut dyn Context) {
        if self.pending_recv.take().is_some() {
            self.send_notify(SocketNotify::MsgNotRecv(timedout_io_error("recv timed out")));
        }
    }

    fn can_send(&self) -> bool {
        true
    }

    fn can_recv(&self) -> bool {
        self.fq.can_recv()
    }

    fn close(&mut self, ctx: &mut dyn Context) {
        if let Some(timeout) = self.pending_recv.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotRecv(interrupted_io_error("socket is closing")));
        }
    }
}
