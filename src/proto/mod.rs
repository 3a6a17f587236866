// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! The protocol cores: one policy layer per scalability pattern, driven
//! by the socket base through pipe readiness events and user operations.

pub mod policy;

pub mod bus;
pub mod pair;
pub mod publ;
pub mod pull;
pub mod push;
pub mod rep;
pub mod req;
pub mod resp;
pub mod sub;
pub mod surv;

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

/// Deadline of the user operation a protocol is carrying out, armed by
/// the socket base; the protocol cancels it when the operation completes.
pub type Timeout = Option<TimerHandle>;

/// Timers a protocol can arm for its own policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProtoTimer {
    Resend,
    SurveyExpire
}

/// Services the socket base exposes to a protocol during a callback.
pub trait Context {
    fn schedule(&mut self, timer: ProtoTimer, delay: Duration) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);

    /// Reports a pipe the protocol found dead; the socket base removes it
    /// once the callback returns.
    fn pipe_failed(&mut self, eid: EndpointId);
}

pub trait Protocol {
    fn id(&self) -> u16;
    fn peer_id(&self) -> u16;

    /// Hands a freshly established pipe to the protocol. A protocol may
    /// refuse it, in which case it must not retain the pipe.
    fn add_pipe(&mut self, eid: EndpointId, pipe: Pipe) -> io::Result<()>;
    fn remove_pipe(&mut self, ctx: &mut dyn Context, eid: EndpointId) -> Option<Pipe>;

    fn send(&mut self, ctx: &mut dyn Context, msg: Message, timeout: Timeout);
    fn on_send_ready(&mut self, ctx: &mut dyn Context, eid: EndpointId);
    fn on_send_timeout(&mut self, ctx: &mut dyn Context);

    fn recv(&mut self, ctx: &mut dyn Context, timeout: Timeout);
    fn on_recv_ready(&mut self, ctx: &mut dyn Context, eid: EndpointId);
    fn on_recv_timeout(&mut self, ctx: &mut dyn Context);

    fn on_timer(&mut self, _ctx: &mut dyn Context, _timer: ProtoTimer) {}

    fn set_option(&mut self, _opt: &SocketOption) -> io::Result<()> {
        Err(invalid_input_io_error("option not supported by the protocol"))
    }

    fn can_send(&self) -> bool;
    fn can_recv(&self) -> bool;

    /// Interrupts whatever user operation is pending; called when the
    /// socket starts closing.
    fn close(&mut self, ctx: &mut dyn Context);
}

pub fn create_protocol(kind: SocketType, notify: Rc<Sender<SocketNotify>>) -> Box<dyn Protocol> {
    match kind {
        SocketType::Pair |
        SocketType::XPair => Box::new(pair::Pair::new(kind, notify)),
        SocketType::Pub |
        SocketType::XPub => Box::new(publ::Pub::new(kind, notify)),
        SocketType::Sub |
        SocketType::XSub => Box::new(sub::Sub::new(kind, notify)),
        SocketType::Req => Box::new(req::Req::new(kind, notify)),
        SocketType::XReq => Box::new(req::XReq::new(kind, notify)),
        SocketType::Rep => Box::new(rep::Rep::new(kind, notify, false)),
        SocketType::XRep => Box::new(rep::Rep::new(kind, notify, true)),
        SocketType::Push |
        SocketType::XPush => Box::new(push::Push::new(kind, notify)),
        SocketType::Pull |
        SocketType::XPull => Box::new(pull::Pull::new(kind, notify)),
        SocketType::Surveyor => Box::new(surv::Surveyor::new(kind, notify)),
        SocketType::XSurveyor => Box::new(surv::XSurveyor::new(kind, notify)),
        SocketType::Respondent => Box::new(resp::Respondent::new(kind, notify, false)),
        SocketType::XRespondent => Box::new(resp::Respondent::new(kind, notify, true)),
        SocketType::Bus => Box::new(bus::Bus::new(kind, notify, false)),
        SocketType::XBus => Box::new(bus::Bus::new(kind, notify, true))
    }
}

pub fn clear_timeout(ctx: &mut dyn Context, timeout: Timeout) {
    if let Some(handle) = timeout {
        ctx.cancel(handle);
    }
}

/// Prepends a route entry to the message header.
pub fn push_route(msg: &mut Message, eid: EndpointId) {
    let mut header = vec![0u8; 4];

    BigEndian::write_u32(&mut header, eid.0 as u32);
    header.extend_from_slice(&msg.header);
    msg.header = header;
}

/// Pops the leading route entry from the message header.
pub fn pop_route(msg: &mut Message) -> Option<EndpointId> {
    if msg.header.len() < 4 {
        return None;
    }

    let eid = BigEndian::read_u32(&msg.header[..4]);
    let rest = msg.header.split_off(4);

    msg.header = rest;

    Some(EndpointId(eid as usize))
}

/// Reads the leading route entry without removing it.
pub fn peek_route(msg: &Message) -> Option<EndpointId> {
    if msg.header.len() < 4 {
        return None;
    }

    Some(EndpointId(BigEndian::read_u32(&msg.header[..4]) as usize))
}

/// Number of 4-byte entries the header carries.
pub fn header_entries(msg: &Message) -> usize {
    msg.header.len() / 4
}

#[cfg(test)]
mod tests {
    use core::EndpointId;
    use message::Message;
    use super::{push_route, pop_route, header_entries};

    #[test]
    fn routes_stack_in_the_header() {
        let mut msg = Message::with_body(vec![1, 2, 3]);

        push_route(&mut msg, EndpointId(7));
        push_route(&mut msg, EndpointId(9));

        assert_eq!(2, header_entries(&msg));
        assert_eq!(Some(EndpointId(9)), pop_route(&mut msg));
        assert_eq!(Some(EndpointId(7)), pop_route(&mut msg));
        assert_eq!(None, pop_route(&mut msg));
        assert_eq!(vec![1, 2, 3], msg.to_buffer());
    }
}
