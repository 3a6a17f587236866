// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use core::{EndpointId, SocketType};
use core::endpoint::Pipe;
use io_error::*;
use message::Message;
use reactor::SocketNotify;
use transport::{SendStatus, RecvStatus};
use super::{Protocol, Context, Timeout, clear_timeout};
use super::policy::exclusive::Exclusive;

/// One-to-one pattern: exactly one peer pipe, messages both ways,
/// delivered verbatim. Covers the raw flavor as well, since there is no
/// envelope to add or strip.
pub struct Pair {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    excl: Exclusive,
    pending_send: Option<(Message, Timeout)>,
    pending_recv: Option<Timeout>
}

impl Pair {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> Pair {
        Pair {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
            excl: Exclusive::new(),
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
            let eid = match self.excl.active() {
                Some(eid) if self.excl.can_send() => eid,
                _ => {
                    self.pending_send = Some((msg, timeout));
                    return;
                }
            };
            let status = match self.pipes.get_mut(&eid) {
                Some(pipe) => pipe.send(msg),
                None => {
                    clear_timeout(ctx, timeout);
                    self.send_notify(SocketNotify::MsgNotSent(broken_pipe_io_error("peer has gone away")));
                    return;
                }
            };

            match status {
                Ok(SendStatus::Sent) => {}
                Ok(SendStatus::Release) => self.excl.set_send_ready(false),
                Err(_) => ctx.pipe_failed(eid)
            }

            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgSent);
        }
    }

    fn try_recv(&mut self, ctx: &mut dyn Context) {
        if let Some(timeout) = self.pending_recv.take() {
            let eid = match self.excl.active() {
                Some(eid) if self.excl.can_recv() => eid,
                _ => {
                    self.pending_recv = Some(timeout);
                    return;
                }
            };
            let status = match self.pipes.get_mut(&eid) {
                Some(pipe) => pipe.recv(),
                None => {
                    self.pending_recv = Some(timeout);
                    return;
                }
            };

            match status {
                Ok(RecvStatus::Recv(msg)) => {
                    clear_timeout(ctx, timeout);
                    self.send_notify(SocketNotify::MsgRecv(msg));
                }
                Ok(RecvStatus::Release(msg)) => {
                    self.excl.set_recv_ready(false);
                    clear_timeout(ctx, timeout);
                    self.send_notify(SocketNotify::MsgRecv(msg));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.excl.set_recv_ready(false);
                    self.pending_recv = Some(timeout);
                }
                Err(_) => {
                    ctx.pipe_failed(eid);
                    self.pending_recv = Some(timeout);
                }
            }
        }
    }
}

impl Protocol for Pair {
    fn id(&self) -> u16 {
        self.kind.id()
    }

    fn peer_id(&self) -> u16 {
        self.kind.peer_id()
    }

    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()> {
        if !self.excl.occupy(eid) {
            return Err(other_io_error("pair accepts a single peer"));
        }

        self.pipes.insert(eid, pipe);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut dyn Context, eid: EndpointId) -> Option<Pipe> {
        self.excl.vacate(eid);
        self.pipes.remove(&eid)
    }

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout) {
        self.pending_send = Some((msg, timeout));
        self.try_send(ctx);
    }

    fn on_send_ready(&mut self, ctx: &mut dyn Context, eid: EndpointId) {
        if self.excl.is(eid) {
            self.excl.set_send_ready(true);
            self.try_send(ctx);
        }
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
        if self.excl.is(eid) {
            self.excl.set_recv_ready(true);
            self.try_recv(ctx);
        }
    }

    fn on_recv_timeout(&mut self, _: &mut dyn Context) {
        if self.pending_recv.take().is_some() {
            self.send_notify(SocketNotify::MsgNotRecv(timedout_io_error("recv timed out")));
        }
    }

    fn can_send(&self) -> bool {
        self.excl.can_send()
    }

    fn can_recv(&self) -> bool {
        self.excl.can_recv()
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
