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
use core::config::SocketOption;
use core::endpoint::Pipe;
use io_error::*;
use message::Message;
use reactor::SocketNotify;
use transport::{SendStatus, RecvStatus};
use super::{Protocol, Context, Timeout, clear_timeout, push_route, peek_route, header_entries};
use super::policy::broadcast::Distribution;
use super::policy::fair_queue::FairQueue;

/// Bus pattern: every message goes to every other node. The raw flavor
/// tags incoming messages with the pipe they arrived on and, on send,
/// skips the pipe named by the leading header entry, which is what keeps
/// a forwarded message from bouncing back where it came from. Messages
/// whose hop list exceeds the configured maximum are discarded.
pub struct Bus {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    raw: bool,
    pipes: HashMap<EndpointId, Pipe>,
    dist: Distribution,
    fq: FairQueue,
    max_ttl: u8,
    pending_recv: Option<Timeout>
}

impl Bus {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>, raw: bool) -> Bus {
        Bus {
            kind: kind,
            notify: notify,
            raw: raw,
            pipes: HashMap::new(),
            dist: Distribution::new(),
            fq: FairQueue::new(),
            max_ttl: 8,
            pending_recv: None
        }
    }

    fn send_notify(&self, evt: SocketNotify) {
        let send_res = self.notify.send(evt);

        if send_res.is_err() {
            error!("Failed to send notify to the facade: '{:?}'", send_res.err());
        }
    }

    fn broadcast(&mut self, ctx: &mut dyn Context, msg: &Message, exclude: Option<EndpointId>) {
        for eid in self.dist.targets() {
            if Some(eid) == exclude {
                continue;
            }

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
                if self.raw {
                    push_route(&mut msg, eid);
                }
                clear_timeout(ctx, timeout);
                self.send_notify(SocketNotify::MsgRecv(msg));
                return;
            }
        }
    }
}

impl Protocol for Bus {
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
        let exclude = if self.raw {
            if header_entries(&msg) > self.max_ttl as usize {
                debug!("message dropped, hop count exceeded");
                clear_timeout(ctx, timeout);
                self.send_notify(SocketNotify::MsgSent);
                return;
            }
            peek_route(&msg)
        } else {
            None
        };

        self.broadcast(ctx, &msg, exclude);
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

    fn set_option(&mut self, opt: &SocketOption) -> io::Result<()> {
        match *opt {
            SocketOption::MaxTtl(value) => {
                self.max_ttl = value;
                Ok(())
            }
            _ => Err(invalid_input_io_error("option not supported by the protocol"))
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
