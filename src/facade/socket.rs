// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use core::{SocketId, SocketType};
use core::config::{SocketOption, SocketOptionKind};
use io_error::*;
use message::Message;
use reactor::{Signal, SocketCmd, SocketNotify, WorkerHandle};
use facade::endpoint::Endpoint;

pub struct Socket {
    id: SocketId,
    socket_type: SocketType,
    cmd_sender: WorkerHandle,
    evt_receiver: Receiver<SocketNotify>,
    closed: bool
}

impl Socket {

    #[doc(hidden)]
    pub fn new(
        id: SocketId,
        socket_type: SocketType,
        cmd_tx: WorkerHandle,
        evt_rx: Receiver<SocketNotify>) -> Socket {
        Socket {
            id: id,
            socket_type: socket_type,
            cmd_sender: cmd_tx,
            evt_receiver: evt_rx,
            closed: false
        }
    }

    #[doc(hidden)]
    pub fn get_id(&self) -> SocketId {
        self.id
    }

    #[doc(hidden)]
    pub fn get_cmd_sender(&self) -> WorkerHandle {
        self.cmd_sender.clone()
    }

    pub fn get_socket_type(&self) -> SocketType {
        self.socket_type
    }

    fn send_cmd(&self, cmd: SocketCmd) -> io::Result<()> {
        self.cmd_sender.send(Signal::Socket(self.id, cmd))
    }

    /// Adds a remote endpoint to the socket.
    /// The library would then try to connect to the specified remote endpoint.
    /// The addr argument consists of two parts as follows: transport://address.
    /// Note that bind and connect may be called multiple times on the same socket,
    /// thus allowing the socket to communicate with multiple heterogeneous endpoints.
    /// On success, returns an [Endpoint](struct.Endpoint.html) that can be later used
    /// to remove the endpoint from the socket.
    pub fn connect(&mut self, addr: &str) -> io::Result<Endpoint> {
        self.send_cmd(SocketCmd::Connect(addr.to_owned()))?;

        match self.evt_receiver.recv() {
            Ok(SocketNotify::Connected(eid)) => Ok(Endpoint::new(self.id, eid, self.cmd_sender.clone())),
            Ok(SocketNotify::NotConnected(e)) => Err(e),
            Ok(_) => Err(other_io_error("unexpected evt")),
            Err(_) => Err(other_io_error("evt channel closed"))
        }
    }

    /// Adds a local endpoint to the socket.
    /// The endpoint can be then used by other applications to connect to.
    pub fn bind(&mut self, addr: &str) -> io::Result<Endpoint> {
        self.send_cmd(SocketCmd::Bind(addr.to_owned()))?;

        match self.evt_receiver.recv() {
            Ok(SocketNotify::Bound(eid)) => Ok(Endpoint::new(self.id, eid, self.cmd_sender.clone())),
            Ok(SocketNotify::NotBound(e)) => Err(e),
            Ok(_) => Err(other_io_error("unexpected evt")),
            Err(_) => Err(other_io_error("evt channel closed"))
        }
    }

    pub fn send(&mut self, buffer: Vec<u8>) -> io::Result<()> {
        self.send_msg(Message::with_body(buffer))
    }

    pub fn send_msg(&mut self, msg: Message) -> io::Result<()> {
        self.do_send(msg, false)
    }

    /// Non-blocking send: fails with a `WouldBlock` error instead of
    /// waiting for the protocol to become ready.
    pub fn try_send(&mut self, buffer: Vec<u8>) -> io::Result<()> {
        self.try_send_msg(Message::with_body(buffer))
    }

    pub fn try_send_msg(&mut self, msg: Message) -> io::Result<()> {
        self.do_send(msg, true)
    }

    fn do_send(&mut self, msg: Message, nonblock: bool) -> io::Result<()> {
        self.send_cmd(SocketCmd::SendMsg(msg, nonblock))?;

        match self.evt_receiver.recv() {
            Ok(SocketNotify::MsgSent) => Ok(()),
            Ok(SocketNotify::MsgNotSent(e)) => Err(e),
            Ok(_) => Err(other_io_error("unexpected evt")),
            Err(_) => Err(other_io_error("evt channel closed"))
        }
    }

    pub fn recv(&mut self) -> io::Result<Vec<u8>> {
        self.recv_msg().map(|msg| msg.to_buffer())
    }

    pub fn recv_msg(&mut self) -> io::Result<Message> {
        self.do_recv(false)
    }

    /// Non-blocking receive: fails with a `WouldBlock` error instead of
    /// waiting for a message to show up.
    pub fn try_recv(&mut self) -> io::Result<Vec<u8>> {
        self.try_recv_msg().map(|msg| msg.to_buffer())
    }

    pub fn try_recv_msg(&mut self) -> io::Result<Message> {
        self.do_recv(true)
    }

    fn do_recv(&mut self, nonblock: bool) -> io::Result<Message> {
        self.send_cmd(SocketCmd::RecvMsg(nonblock))?;

        match self.evt_receiver.recv() {
            Ok(SocketNotify::MsgRecv(msg)) => Ok(msg),
            Ok(SocketNotify::MsgNotRecv(e)) => Err(e),
            Ok(_) => Err(other_io_error("unexpected evt")),
            Err(_) => Err(other_io_error("evt channel closed"))
        }
    }

    /// Set a socket option.
    /// See [SocketOption](enum.SocketOption.html) to get the list of options.
    pub fn set_option(&mut self, option: SocketOption) -> io::Result<()> {
        self.send_cmd(SocketCmd::SetOption(option))?;

        match self.evt_receiver.recv() {
            Ok(SocketNotify::OptionSet) => Ok(()),
            Ok(SocketNotify::OptionNotSet(e)) => Err(e),
            Ok(_) => Err(other_io_error("unexpected evt")),
            Err(_) => Err(other_io_error("evt channel closed"))
        }
    }

    pub fn get_option(&mut self, kind: SocketOptionKind) -> io::Result<SocketOption> {
        self.send_cmd(SocketCmd::GetOption(kind))?;

        match self.evt_receiver.recv() {
            Ok(SocketNotify::OptionRetrieved(option)) => Ok(option),
            Ok(SocketNotify::OptionNotRetrieved(e)) => Err(e),
            Ok(_) => Err(other_io_error("unexpected evt")),
            Err(_) => Err(other_io_error("evt channel closed"))
        }
    }

    pub fn set_send_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_option(SocketOption::SendTimeout(Some(timeout)))
    }

    pub fn set_recv_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_option(SocketOption::RecvTimeout(Some(timeout)))
    }

    pub fn set_send_priority(&mut self, priority: u8) -> io::Result<()> {
        self.set_option(SocketOption::SendPriority(priority))
    }

    pub fn set_recv_priority(&mut self, priority: u8) -> io::Result<()> {
        self.set_option(SocketOption::RecvPriority(priority))
    }

    pub fn set_linger(&mut self, linger: Duration) -> io::Result<()> {
        self.set_option(SocketOption::Linger(linger))
    }

    /// Closes the socket, flushing pending sends for at most the linger
    /// duration, and waits until every pipe is torn down.
    pub fn close(mut self) -> io::Result<()> {
        self.closed = true;
        self.send_cmd(SocketCmd::Close)?;

        loop {
            match self.evt_receiver.recv() {
                Ok(SocketNotify::Closed) => return Ok(()),
                Ok(_) => continue,
                Err(_) => return Err(other_io_error("evt channel closed"))
            }
        }
    }

    #[doc(hidden)]
    pub fn matches(&self, other: &Socket) -> bool {
        self.socket_type.matches(other.socket_type)
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.send_cmd(SocketCmd::Close);
        }
    }
}
