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
use transport::SendStatus;
use super::{Protocol, Context, Timeout, clear_timeout};
use super::policy::load_balancer::LoadBalancer;

/// Pipeline push: load-balances each message over the writable pipes.
/// When no pipe is writable the caller waits.
pub struct Push {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    lb: LoadBalancer,
    pending_send: Option<(Message, Timeout)>
}

impl Push {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> Push {
        Push {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
            lb: LoadBalancer::new(),
            pending_send: None
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
}

impl Protocol for Push {
    fn id(&self) -> u16 {
        self.kind.id()
    }

    fn peer_id(&self) -> u16 {
        self.kind.peer_id()
    }

    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()> {
        let prio = pipe.send_prio();

        self.pipes.insert(eid, pipe);
        self.lb.insert(eid, prio);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut dyn Context, eid: EndpointId) -> Option<Pipe> {
        self.lb.remove(eid);
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
        clear_timeout(ctx, timeout);
        self.send_notify(SocketNotify::MsgNotRecv(other_io_error("recv not supported by protocol")));
    }

    fn on_recv_ready(&mut self, _: &mut dyn Context, _: EndpointId) {
    }

    fn on_recv_timeout(&mut self, _: &mut dyn Context) {
    }

    fn can_send(&self) -> bool {
        self.lb.can_send()
    }

    fn can_recv(&self) -> bool {
        false
    }

    fn close(&mut self, ctx: &mut dyn Context) {
        if let Some((_, timeout)) = self.pending_send.take() {
            clear_timeout(ctx, timeout);
            self.send_notify(SocketNotify::MsgNotSent(interrupted_io_error("socket is closing")));
        }
    }
}
