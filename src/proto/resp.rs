// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::HashMap;
use std::io;
use std::mem;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use core::{EndpointId, SocketType};
use core::config::SocketOption;
use core::endpoint::Pipe;
use io_error::*;
use message::Message;
use reactor::SocketNotify;
use transport::{SendStatus, RecvStatus};
use super::{Protocol, Context, Timeout, clear_timeout, push_route, pop_route, header_entries};
use super::policy::broadcast::Distribution;
use super::policy::fair_queue::FairQueue;

/// Respondent side of the survey pattern: incoming surveys keep their id
/// and gain the pipe they arrived on in the header, the response is routed
/// back by that envelope. The regular flavor keeps the envelope internal,
/// the raw flavor exposes it. Surveys whose hop count exceeds the
/// configured maximum are discarded.
pub struct Respondent {
    kind: SocketType,
    notify: Rc<Sender<SocketNotify>>,
    raw: bool,
    pipes: HashMap<EndpointId, Pipe>,
    fq: FairQueue,
    writable: Distribution,
    saved: Option<Vec<u8>>,
    max_ttl: u8,
    pending_recv: Option<Timeout>
}

impl Respondent {
    pub fn new(kind: SocketType, notify: Rc<Sender<SocketNotify>>, raw: bool) -> Respondent {
        Respondent {
            kind: kind,
            notify: notify,
            raw: raw,
            pipes: HashMap::new(),
            fq: FairQueue::new(),
            writable: Distribution::new(),
            saved: None,
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

    fn route_back(&mut self, ctx: &mut dyn Context, eid: EndpointId, msg: Message) {
        if self.writable.has(eid) {
            let status = match self.pipes.get_mut(&eid) {
                Some(pipe) => pipe.send(msg),
                None => return
            };

            match status {
                Ok(SendStatus::Sent) => {}
                Ok(SendStatus::Release) => self.writable.deactivate(eid),
                Err(_) => {
                    self.writable.deactivate(eid);
                    ctx.pipe_failed(eid);
                }
            }
        } else {
            debug!("response dropped, surveyor is gone or congested");
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

                let entries = header_entries(&msg);

                if entries == 0 {
                    debug!("survey dropped, missing id");
                    continue;
                }
                if entries - 1 > self.max_ttl as usize {
                    debug!("survey dropped, hop count exceeded");
                    continue;
                }

                push_route(&mut msg, eid);
                if !self.raw {
                    self.saved = Some(mem::replace(&mut msg.header, Vec::new()));
                }
                clear_timeout(ctx, timeout);
                self.send_notify(SocketNotify::MsgRecv(msg));
                return;
            }
        }
    }
}

impl Protocol for Respondent {
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
        self.writable.remove(eid);
        self.pipes.remove(&eid)
    }

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout) {
        let mut msg = msg;

        if !self.raw {
            match self.saved.take() {
                Some(header) => msg.header = header,
                None => {
                    clear_timeout(ctx, timeout);
                    self.send_notify(SocketNotify::MsgNotSent(other_io_error("cannot respond before receiving a survey")));
                    return;
                }
            }
        }

        match pop_route(&mut msg) {
            Some(eid) => {
                self.route_back(ctx, eid, msg);
                clear_timeout(ctx, timeout);
                self.send_notify(SocketNotify::MsgSent);
            }
            None => {
                clear_timeout(ctx, timeout);
                self.send_notify(SocketNotify::MsgNotSent(invalid_input_io_error("missing route in the header")));
            }
        }
    }

    fn on_send_ready(&mut self, _: &mut dyn Context, eid: EndpointId) {
        self.writable.activate(eid);
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
        self.raw || self.saved.is_some()
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
