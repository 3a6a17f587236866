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
use super::policy::broadcast::Distribution;

/// Publish side of the publish/subscribe pattern: every outgoing message
/// is distributed to each writable pipe and dropped for the others.
/// The send never blocks, even with no subscriber around.
pub struct Pub {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    pipes: HashMap<EndpointId, Pipe>,
    dist: Distribution
}

impl Pub {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> Pub {
        Pub {
            kind: kind,
            notify: notify,
            pipes: HashMap::new(),
            dist: Distribution::new()
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
}

impl Protocol for Pub {
    fn id(&self) -> u16 {
        self.kind.id()
    }

    fn peer_id(&self) -> u16 {
        self.kind.peer_id()
    }

    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()> {
        self.pipes.insert(eid, pipe);
        Ok(())
    }

    fn remove_pipe(&mut self, _: &mut dyn Context, eid: EndpointId) -> Option<Pipe> {
        self.dist.remove(eid);
        self.pipes.remove(&eid)
    }

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout) {
        self.broadcast(ctx, &msg);
        clear_timeout(ctx, timeout);
        self.send_notify(SocketNotify::MsgSent);
    }

    fn on_send_ready(&mut self, _: &mut dyn Context, eid: EndpointId) {
        self.dist.activate(eid);
    }

    fn on_send_timeout(&mut self, _: &mut dyn Context) {
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
        true
    }

    fn can_recv(&self) -> bool {
        false
    }

    fn close(&mut self, _: &mut dyn Context) {
    }
}
