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
use transport::RecvStatus;
use super::{Protocol, Context, Timeout, clear_timeout};
use super::policy::fair_queue::FairQueue;

/// Pipeline pull: fair-queues the readable pipes, one message per pipe
/// per turn.
pub struct Pull {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    fq: FairQueue,
    pending_recv: Option<Timeout>
}

impl Pull {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> Pull {
        Pull {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
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

impl Protocol for Pull {
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
        self.fq.remove(eid);
        self.pipes.remove(&eid)
    }

    fn send(&mut self, ctx: &mut dyn Context, _: Message, timeout: Timeout) {
        clear_timeout(ctx, timeout);
        self.send_notify(SocketNotify::MsgNotSent(other_io_error("send not supported by protocol")));
    }

    fn on_send_ready(&mut self, _: &mut dyn Context, _: EndpointId) {
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
        false
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
