// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;

use core::EndpointId;
use message::Message;
use reactor::{WorkerEvent, PipeEvt};
use reactor::fsm::{self, Machine, Event, Shutdown};
use transport::{Conduit, SendStatus, RecvStatus};

/// Pipe handle owned by a protocol: an ordered duplex channel of whole
/// messages toward one remote peer, with the priorities the owning socket
/// assigned when the pipe was created.
pub struct Pipe {
    eid: EndpointId,
    send_prio: u8,
    recv_prio: u8,
    conduit: Box<dyn Conduit>
}

impl Pipe {
    pub fn new(eid: EndpointId, send_prio: u8, recv_prio: u8, conduit: Box<dyn Conduit>) -> Pipe {
        Pipe {
            eid: eid,
            send_prio: send_prio,
            recv_prio: recv_prio,
            conduit: conduit
        }
    }

    pub fn eid(&self) -> EndpointId {
        self.eid
    }

    pub fn send_prio(&self) -> u8 {
        self.send_prio
    }

    pub fn recv_prio(&self) -> u8 {
        self.recv_prio
    }

    pub fn send(&mut self, msg: Message) -> io::Result<SendStatus> {
        self.conduit.send(msg)
    }

    pub fn recv(&mut self) -> io::Result<RecvStatus> {
        self.conduit.recv()
    }
}

/// Lifecycle machine of one pipe, child of the socket machine. On stop it
/// drains the outgoing queue toward a live peer before tearing the channel
/// down; an abort (linger expired) or a dead peer closes it right away.
pub struct PipeMachine {
    eid: EndpointId,
    conduit: Box<dyn Conduit>
}

impl PipeMachine {
    pub fn new(eid: EndpointId, conduit: Box<dyn Conduit>) -> PipeMachine {
        PipeMachine {
            eid: eid,
            conduit: conduit
        }
    }

    fn try_drain(&mut self) -> Shutdown {
        if self.conduit.peer_alive() && self.conduit.has_pending_send() {
            self.conduit.close(false);
            Shutdown::InProgress
        } else {
            self.conduit.close(true);
            Shutdown::Done
        }
    }
}

impl Machine<WorkerEvent> for PipeMachine {
    fn handle(&mut self, _: &mut fsm::Context<WorkerEvent>, _: Event<WorkerEvent>) {
        // Live traffic is driven by the socket through the pipe handle.
    }

    fn shutdown(&mut self, _: &mut fsm::Context<WorkerEvent>, ev: Event<WorkerEvent>) -> Shutdown {
        match ev {
            Event::Stop => {
                trace!("[{:?}] pipe stopping", self.eid);
                self.try_drain()
            }
            Event::User(WorkerEvent::Pipe(_, PipeEvt::Writable)) => self.try_drain(),
            Event::User(WorkerEvent::Pipe(_, PipeEvt::Closed)) |
            Event::User(WorkerEvent::Abort) => {
                self.conduit.close(true);
                Shutdown::Done
            }
            _ => Shutdown::InProgress
        }
    }
}
