// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;

use core::{SocketId, EndpointId};
use reactor::{Signal, SocketCmd, WorkerHandle};

/// One bind or connect instance of a socket, usable to remove that
/// endpoint without touching the rest of the socket.
pub struct Endpoint {
    socket: SocketId,
    eid: EndpointId,
    cmd_sender: WorkerHandle
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("socket", &self.socket)
            .field("eid", &self.eid)
            .finish()
    }
}

impl Endpoint {

    #[doc(hidden)]
    pub fn new(socket: SocketId, eid: EndpointId, cmd_tx: WorkerHandle) -> Endpoint {
        Endpoint {
            socket: socket,
            eid: eid,
            cmd_sender: cmd_tx
        }
    }

    #[doc(hidden)]
    pub fn get_id(&self) -> EndpointId {
        self.eid
    }

    /// Removes the endpoint from its socket; pipes born from it are
    /// closed along the way.
    pub fn shutdown(self) -> io::Result<()> {
        self.cmd_sender.send(Signal::Socket(self.socket, SocketCmd::CloseEndpoint(self.eid)))
    }
}
