// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

pub mod fsm;
pub mod poller;
pub mod pool;
pub mod timer;
pub mod wakeup;
pub mod worker;

use std::collections::HashMap;
use std::io;
use std::sync::mpsc;

use core::{SocketId, EndpointId, SocketType};
use core::config::{SocketOption, SocketOptionKind};
use message::Message;
use transport::Conduit;

/// Cross-thread signal pushed into a worker's event queue so facade
/// components and remote pipe halves can communicate with the machines
/// living on that worker.
pub enum Signal {
    Session(SessionCmd),
    Socket(SocketId, SocketCmd),
    Pipe(SocketId, EndpointId, PipeEvt)
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match *self {
            Signal::Session(_) => "Session",
            Signal::Socket(_, _) => "Socket",
            Signal::Pipe(_, _, _) => "Pipe"
        }
    }
}

/// Commands sent to a worker on behalf of the session.
pub enum SessionCmd {
    CreateSocket(SocketId, SocketType, mpsc::Sender<SocketNotify>),
    Shutdown
}

/// Commands sent to a socket machine.
pub enum SocketCmd {
    Bind(String),
    Connect(String),
    SendMsg(Message, bool),
    RecvMsg(bool),
    SetOption(SocketOption),
    GetOption(SocketOptionKind),
    CloseEndpoint(EndpointId),
    Probe(ProbeWaiter),
    Unprobe(u64),
    Close
}

impl SocketCmd {
    pub fn name(&self) -> &'static str {
        match *self {
            SocketCmd::Bind(_) => "Bind",
            SocketCmd::Connect(_) => "Connect",
            SocketCmd::SendMsg(_, _) => "SendMsg",
            SocketCmd::RecvMsg(_) => "RecvMsg",
            SocketCmd::SetOption(_) => "SetOption",
            SocketCmd::GetOption(_) => "GetOption",
            SocketCmd::CloseEndpoint(_) => "CloseEndpoint",
            SocketCmd::Probe(_) => "Probe",
            SocketCmd::Unprobe(_) => "Unprobe",
            SocketCmd::Close => "Close"
        }
    }
}

/// Events raised by a pipe toward the socket owning its other half.
pub enum PipeEvt {
    /// A freshly established pipe, with the endpoint it was born from.
    Attached(Box<dyn Conduit>, EndpointId),
    Readable,
    Writable,
    Closed
}

impl PipeEvt {
    pub fn name(&self) -> &'static str {
        match *self {
            PipeEvt::Attached(_, _) => "Attached",
            PipeEvt::Readable => "Readable",
            PipeEvt::Writable => "Writable",
            PipeEvt::Closed => "Closed"
        }
    }
}

/// Notifications sent by the backend socket as reply to the commands
/// sent by the facade socket.
pub enum SocketNotify {
    Created,
    NotCreated(io::Error),
    Bound(EndpointId),
    NotBound(io::Error),
    Connected(EndpointId),
    NotConnected(io::Error),
    MsgSent,
    MsgNotSent(io::Error),
    MsgRecv(Message),
    MsgNotRecv(io::Error),
    OptionSet,
    OptionNotSet(io::Error),
    OptionRetrieved(SocketOption),
    OptionNotRetrieved(io::Error),
    Closed
}

/// Readiness snapshot sent to a pending poll call.
pub struct ProbeNotify {
    pub index: usize,
    pub can_send: bool,
    pub can_recv: bool
}

/// One registered interest of a poll call; fires at most once.
pub struct ProbeWaiter {
    pub token: u64,
    pub index: usize,
    pub pollin: bool,
    pub pollout: bool,
    pub tx: mpsc::Sender<ProbeNotify>
}

/// Deadlines a socket machine can arm on its worker's timer set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerKind {
    SendDeadline,
    RecvDeadline,
    Resend,
    SurveyExpire,
    Linger,
    Reconnect(EndpointId)
}

pub struct Task {
    pub socket: SocketId,
    pub kind: TimerKind
}

/// Events delivered to the machines hosted on a worker.
pub enum WorkerEvent {
    Cmd(SocketCmd),
    Pipe(EndpointId, PipeEvt),
    Timer(TimerKind),
    Abort
}

pub type WorkerHandle = wakeup::EventQueueHandle<Signal>;

pub struct DirectoryEntry {
    pub fsm: fsm::FsmId,
    pub notify: mpsc::Sender<SocketNotify>
}

/// Worker-local map from socket id to its machine; socket machines remove
/// themselves from it when they finish closing.
pub type Directory = HashMap<SocketId, DirectoryEntry>;
