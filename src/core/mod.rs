// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

pub mod config;
pub mod endpoint;
pub mod session;
pub mod socket;

use std::fmt;

/// Defines the socket types, which in turn determines the exact semantics of the socket.
/// The `X` prefixed types are the raw flavor of the same patterns: the protocol neither
/// adds nor strips routing metadata, the envelope is exposed to the user instead.
/// Raw sockets compose well with bridging code.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SocketType {

    /// **One-to-one protocol**
    /// Socket for communication with exactly one peer.
    /// Each party can send messages at any time.
    /// If the peer is not available or its buffer is full, subsequent sends
    /// will block until it is possible to send the message.
    Pair,

    /// **Publish/subscribe protocol**
    /// Broadcasts messages to multiple destinations.
    /// Messages are sent from `Pub` sockets and will only be received
    /// by `Sub` sockets that have subscribed to the matching topic.
    /// Topic is an arbitrary sequence of bytes at the beginning of the message body.
    /// Since the filtering is performed on the subscriber side,
    /// all the messages are sent to every connected peer.
    /// This socket is used to distribute messages. Receive operation is not defined.
    Pub,

    /// Receives messages from the publisher.
    /// Only messages whose body starts with a subscribed topic are received.
    /// When the socket is created there are no subscriptions
    /// and thus no messages will be received.
    /// Send operation is not defined on this socket.
    Sub,

    /// **Request/reply protocol**
    /// Used to distribute the workload among multiple stateless workers.
    /// This socket implements the client: it sends requests and receives replies.
    /// If no reply arrives within the configured resend interval,
    /// the request is sent again, possibly over a different connection.
    Req,

    /// Used to implement the stateless worker that receives requests and sends replies.
    Rep,

    /// **Pipeline protocol**
    /// This socket is used to send messages to a cluster of load-balanced nodes.
    /// Receive operation is not implemented on this socket type.
    Push,

    /// This socket is used to receive a message from a cluster of nodes,
    /// fair-queued so that a fast peer cannot starve the slow ones.
    /// Send operation is not implemented on this socket type.
    Pull,

    /// **Survey protocol**
    /// Used to send the survey. The survey is delivered to all the connected respondents.
    /// Once the query is sent, the socket can be used to receive the responses.
    /// When the survey deadline expires, receive will return a timeout error.
    Surveyor,

    /// Use to respond to the survey.
    /// Survey is received using the receive function, response is sent using the send function.
    Respondent,

    /// **Message bus protocol**
    /// Broadcasts messages from any node to all other nodes in the topology.
    /// The socket should never receive messages that it sent itself.
    Bus,

    /// Raw flavor of `Pair`.
    XPair,

    /// Raw flavor of `Pub`.
    XPub,

    /// Raw flavor of `Sub`.
    XSub,

    /// Raw flavor of `Req`: the request id header is left to the user and
    /// no retransmission is performed.
    XReq,

    /// Raw flavor of `Rep`: incoming messages carry the routing envelope in
    /// their header, outgoing messages are routed by it.
    XRep,

    /// Raw flavor of `Push`.
    XPush,

    /// Raw flavor of `Pull`.
    XPull,

    /// Raw flavor of `Surveyor`: the survey id header is left to the user and
    /// no deadline is armed.
    XSurveyor,

    /// Raw flavor of `Respondent`: the routing envelope is exposed in the
    /// message header.
    XRespondent,

    /// Raw flavor of `Bus`: incoming messages are tagged with the pipe they
    /// arrived on, outgoing messages skip the pipe named by their header.
    XBus
}

impl SocketType {
    /// Wire-level protocol number, shared between the raw and regular flavors.
    pub fn id(&self) -> u16 {
        match *self {
            SocketType::Pair | SocketType::XPair => 16,
            SocketType::Pub | SocketType::XPub => 2 * 16,
            SocketType::Sub | SocketType::XSub => (2 * 16) + 1,
            SocketType::Req | SocketType::XReq => 3 * 16,
            SocketType::Rep | SocketType::XRep => (3 * 16) + 1,
            SocketType::Push | SocketType::XPush => 5 * 16,
            SocketType::Pull | SocketType::XPull => (5 * 16) + 1,
            SocketType::Surveyor | SocketType::XSurveyor => (6 * 16) + 2,
            SocketType::Respondent | SocketType::XRespondent => (6 * 16) + 3,
            SocketType::Bus | SocketType::XBus => 7 * 16
        }
    }

    pub fn peer(&self) -> SocketType {
        match *self {
            SocketType::Pair | SocketType::XPair => SocketType::Pair,
            SocketType::Pub | SocketType::XPub => SocketType::Sub,
            SocketType::Sub | SocketType::XSub => SocketType::Pub,
            SocketType::Req | SocketType::XReq => SocketType::Rep,
            SocketType::Rep | SocketType::XRep => SocketType::Req,
            SocketType::Push | SocketType::XPush => SocketType::Pull,
            SocketType::Pull | SocketType::XPull => SocketType::Push,
            SocketType::Surveyor | SocketType::XSurveyor => SocketType::Respondent,
            SocketType::Respondent | SocketType::XRespondent => SocketType::Surveyor,
            SocketType::Bus | SocketType::XBus => SocketType::Bus
        }
    }

    pub fn peer_id(&self) -> u16 {
        self.peer().id()
    }

    /// Two socket types can talk to each other when each one is the
    /// expected peer of the other, raw or not.
    pub fn matches(&self, other: SocketType) -> bool {
        self.peer_id() == other.id() && other.peer_id() == self.id()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SocketId(pub usize);

impl fmt::Debug for SocketId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(pub usize);

impl fmt::Debug for EndpointId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

#[cfg(test)]
mod tests {
    use super::SocketType;

    #[test]
    fn socket_types_match_their_peer() {
        assert!(SocketType::Pair.matches(SocketType::Pair));
        assert!(SocketType::Push.matches(SocketType::Pull));
        assert!(SocketType::Pub.matches(SocketType::Sub));
        assert!(SocketType::Req.matches(SocketType::Rep));
        assert!(SocketType::Surveyor.matches(SocketType::Respondent));
        assert!(SocketType::Bus.matches(SocketType::Bus));

        assert!(!SocketType::Push.matches(SocketType::Push));
        assert!(!SocketType::Req.matches(SocketType::Sub));
    }

    #[test]
    fn raw_flavors_share_the_wire_identity() {
        assert_eq!(SocketType::Req.id(), SocketType::XReq.id());
        assert!(SocketType::XReq.matches(SocketType::Rep));
        assert!(SocketType::XSurveyor.matches(SocketType::XRespondent));
    }
}
