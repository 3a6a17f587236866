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
use super::policy::fair_queue::FairQueue;
use super::policy::load_balancer::LoadBalancer;

/// The request in flight: its id, the message as put on the wire so it
/// can be transmitted again, the pipe it went out on and the resend timer.
struct Active {
    id: u32,
    wire: Message,
    sent_on: Option<EndpointId>,
    timer: Option<TimerHandle>
}

/// Request side of the request/reply pattern. Each request gets a fresh
/// 31-bit id with the high bit set, load-balanced to one peer; replies
/// carrying any other id are dropped. A single request is in flight at a
/// time, a new send supersedes the previous one. When no reply shows up
/// within the resend interval, or when the chosen pipe dies, the request
/// is transmitted again, possibly over a different pipe.
pub struct Req {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    lb: LoadBalancer,
    fq: FairQueue,
    seq: u32,
    resend_ivl: Duration,
    active: Option<Active>,
    pending_send: Option<Timeout>,
    pending_recv: Option<Timeout>
}

impl Req {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> Req {
        Req {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
            lb: LoadBalancer::new(),
            fq: FairQueue::new(),
            seq: 0,
            resend_ivl: Duration::from_secs(60),
            active: None,
            pending_send: None,
            pending_recv: None
        }
    }

    fn send_notify(&self, evt: SocketNotify) {
        let send_res = self.notify.send(evt);

        if send_res.is_err() {
            error!("Failed to send notify to the facade: '{:?}'", send_res.err());
        }
    }

    fn drop_active(&mut self, ctx: &mut dyn Context) {
        if let Some(active) = self.active.take() {
            if let Some(handle) = active.timer {
                ctx.cancel(handle);
            }
        }
    }

    /// Puts the active request on the wire if it is not there already.
    /// `user` carries the deadline of a user send operation waiting for
    /// the handoff; retransmissions pass `None` and stay silent.
    fn try_send(&mut self, ctx: &mut dyn Context, user: Option<Timeout>) {
        let wire = match self.active {
            Some(ref active) if active.sent_on.is_none() => active.wire.clone(),
            _ => return
        };

        loop {
            let eid = match self.lb.pop() {
                Some(eid) => eid,
                None => {
                    if let Some(timeout) = user {
                        self.pending_send = Some(timeout);
                    }
                    return;
                }
            };
            let status = match self.pipes.get_mut(&eid) {
                Some(pipe) => pipe.send(wire.clone()),
                None => continue
            };

            match status {
                Ok(SendStatus::Sent) => self.lb.activate(eid),
                Ok(SendStatus::Release) => {}
                Err(_) => {
                    ctx.pipe_failed(eid);
                    continue;
                }
            }

            let handle = ctx.schedule(ProtoTimer::Resend, self.resend_ivl);

            if let Some(active) = self.active.as_mut() {
                active.sent_on = Some(eid);
                active.timer = Some(handle);
            }
            if let Some(timeout) = user {
                clear_timeout(ctx, timeout);
                self.send_notify(SocketNotify::MsgSent);
            }
            return;
        }
    }

    fn try_recv(&mut self, ctx: &mut dyn Context) {
        let expected = match self.active {
            Some(ref active) => active.id,
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
                    self.drop_active(ctx);

                    let rest = msg.header.split_off(4);

                    msg.header = rest;
                    clear_timeout(ctx, timeout);
                    self.send_notify(SocketNotify::MsgRecv(msg));
                    return;
                }

                trace!("reply with a stale request id dropped");
            }
        }
    }
}

impl Protocol for Req {
    fn id(&self) -> u16 {
        self.kind.id()
    }

    fn peer_id(&self) -> u16 {
        self.kind.peer_id()
    }

    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()> {
        let send_prio = pipe.send_prio();
        let recv_prio = pipe.recv_prio();

        self.pipes.insert(eid, pipe);
        self.lb.insert(eid, send_prio);
        self.fq.insert(eid, recv_prio);
        Ok(())
    }

    fn remove_pipe(&mut self, ctx: &mut dyn Context, eid: EndpointId) -> Option<Pipe> {
        self.lb.remove(eid);
        self.fq.remove(eid);

        let lost = self.active.as_ref().map_or(false, |active| active.sent_on == Some(eid));

        if lost {
            if let Some(active) = self.active.as_mut() {
                active.sent_on = None;
                if let Some(handle) = active.timer.take() {
                    ctx.cancel(handle);
                }
            }
        }

        let pipe = self.pipes.remove(&eid);

        if lost {
            // The request went out on the pipe that just died:
            // put it back on the wire right away.
            self.try_send(ctx, None);
        }

        pipe
    }

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout) {
        self.drop_active(ctx);
        self.pending_send = None;
        self.seq = self.seq.wrapping_add(1);

        let id = self.seq | 0x8000_0000;
        let mut wire = msg;
        let mut header = vec![0u8; 4];

        BigEndian::write_u32(&mut header, id);
        wire.header = header;
        self.active = Some(Active {
            id: id,
            wire: wire,
            sent_on: None,
            timer: None
        });
        self.try_send(ctx, Some(timeout));
    }

    fn on_send_ready(&mut self, ctx: &mut dyn Context, eid: EndpointId) {
        self.lb.activate(eid);
        if self.active.as_ref().map_or(false, |active| active.sent_on.is_none()) {
            let user = self.pending_send.take();

            self.try_send(ctx, user);
        }
    }

    fn on_send_timeout(&mut self, ctx: &mut dyn Context) {
        if self.pending_send.take().is_some() {
            self.drop_active(ctx);
            self.send_notify(SocketNotify::MsgNotSent(timedout_io_error("send timed out")));
        }
    }

    fn recv(&mut self, ctx: &mut dyn Context, timeout: Timeout) {
        if self.active.is_none() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotRecv(other_io_error("cannot receive without a pending request")));
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
        if timer != ProtoTimer::Resend {
            return;
        }
        match self.active.as_mut() {
            Some(active) => {
                active.sent_on = None;
                active.timer = None;
            }
            None => return
        }

        debug!("request timed out, transmitting it again");
        self.try_send(ctx, None);
    }

    fn set_option(&mut self, opt: &SocketOption) -> io::Result<()> {
        match *opt {
            SocketOption::ResendInterval(value) => {
                self.resend_ivl = value;
                Ok(())
            }
            _ => Err(invalid_input_io_error("option not supported by the protocol"))
        }
    }

    fn can_send(&self) -> bool {
        self.lb.can_send()
    }

    fn can_recv(&self) -> bool {
        self.active.is_some() && self.fq.can_recv()
    }

    fn close(&mut self, ctx: &mut dyn Context) {
        self.drop_active(ctx);
        if let Some(timeout) = self.pending_send.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotSent(interrupted_io_error("socket is closing")));
        }
        if let Some(timeout) = self.pending_recv.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotRecv(interrupted_io_error("socket is closing")));
        }
    }
}

/// Raw request socket: the id header is owned by the user, the message
/// is load-balanced out and replies are fair-queued in untouched. No
/// retransmission is performed.
pub struct XReq {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    lb: LoadBalancer,
    fq: FairQueue,
    pending_send: Option<(Message, Timeout)>,
    pending_recv: Option<Timeout>
}

impl XReq {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> XReq {
        XReq {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
            lb: LoadBalancer::new(),
            fq: FairQueue::new(),
            pending_send: None,
            pending_recv: None
        }
    }

    fn send_notify(&self, evt: SocketNotify) {
        let send_res = self.notify.send(evt);

        if send_res.is_err() {
            error!("Failed to send notify to the facade: '{:?}'", send_res.err());
        }
    }

    fn try_send(&mut self, ctx: &mut dyn Context) {
        if let Some((msg, timeout)) = self.pending_send.take() {
            loop {
                let eid = match self.lb.pop() {
                    Some(eid) => eid,
                    None => {
                        self.pending_send = Some((msg, timeout));
                        return;
                    }
                };
                let status = match self.pipes.get_mut(&eid) {
                    Some(pipe) => pipe.send(msg.clone()),
                    None => continue
                };

                match status {
                    Ok(SendStatus::Sent) => self.lb.activate(eid),
                    Ok(SendStatus::Release) => {}
                    Err(_) => {
                        ctx.pipe_failed(eid);
                        continue;
                    }
                }

                clear_timeout(ctx, timeout);
                self.send_notify(SocketNotify::MsgSent);
                return;
            }
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

impl Protocol for XReq {
    fn id(&self) -> u16 {
        self.kind.id()
    }

    fn peer_id(&self) -> u16 {
        self.kind.peer_id()
    }

    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()> {
        let send_prio = pipe.send_prio();
        let recv_prio = pipe.recv_prio();

        self.pipes.insert(eid, pipe);
        self.lb.insert(eid, send_prio);
        self.fq.insert(eid, recv_prio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut dyn Context, eid: EndpointId) -> Option<Pipe> {
        self.lb.remove(eid);
        self.fq.remove(eid);
        self.pipes.remove(&eid)
    }

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout) {
        self.pending_send = Some((msg, timeout));
        self.try_send(ctx);
    }

    fn on_send_ready(&mut self, ctx: &mut dyn Context, eid: EndpointId) {
        self.lb.activate(eid);
        self.try_send(ctx);
    }

    fn on_send_timeout(&mut self, _: &mut dyn Context) {
        if self.pending_send.take().is_some() {
            self.send_notify(SocketNotify::MsgNotSent(timedout_io_error("send timed out")));
        }
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
        self.lb.can_send()
    }

    fn can_recv(&self) -> bool {
        self.fq.can_recv()
    }

    fn close(&mut self, ctx: &mut dyn Context) {
        if let Some((_, timeout)) = self.pending_send.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotSent(interrupted_io_error("socket is closing")));
        }
        if let Some(timeout) = self.pending_recv.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotRecv(interrupted_io_error("socket is closing")));
        }
    }
}
