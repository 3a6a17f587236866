// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use core::{SocketId, EndpointId};
use io_error::*;
use message::Message;
use reactor::{Signal, PipeEvt, WorkerHandle};
use transport::{Conduit, SendStatus, RecvStatus};
use super::queue::{MsgQueue, Pushed, Popped};

/// Address of the remote half of a pipe: enough to post pipe events into
/// the worker queue of the socket owning it.
#[derive(Clone)]
pub struct PeerHandle {
    pub worker: WorkerHandle,
    pub socket: SocketId,
    pub eid: EndpointId
}

impl PeerHandle {
    fn notify(&self, evt: PipeEvt) {
        let _ = self.worker.send(Signal::Pipe(self.socket, self.eid, evt));
    }
}

/// One side of an established inproc pipe: an outgoing and an incoming
/// message queue plus the peer to signal on readiness transitions.
pub struct InprocPipe {
    tx: Arc<MsgQueue>,
    rx: Arc<MsgQueue>,
    peer: PeerHandle,
    hup_sent: Arc<AtomicBool>
}

impl InprocPipe {
    pub fn new(tx: Arc<MsgQueue>, rx: Arc<MsgQueue>, peer: PeerHandle) -> InprocPipe {
        InprocPipe {
            tx: tx,
            rx: rx,
            peer: peer,
            hup_sent: Arc::new(AtomicBool::new(false))
        }
    }
}

impl Conduit for InprocPipe {
    fn send(&mut self, msg: Message) -> io::Result<SendStatus> {
        match self.tx.push(msg) {
            Pushed::Delivered { was_empty, now_full } => {
                if was_empty {
                    self.peer.notify(PipeEvt::Readable);
                }
                if now_full {
                    Ok(SendStatus::Release)
                } else {
                    Ok(SendStatus::Sent)
                }
            }
            Pushed::TooBig => {
                debug!("[{:?}] message dropped at the pipe boundary: too large", self.peer.eid);
                Ok(SendStatus::Sent)
            }
            Pushed::Closed => Err(broken_pipe_io_error("peer has gone away"))
        }
    }

    fn recv(&mut self) -> io::Result<RecvStatus> {
        match self.rx.pop() {
            Popped::Msg { msg, more, was_full, now_empty } => {
                // `more && now_empty` means the writer has closed and is
                // waiting for its queue to drain: tell it we are done.
                if was_full || (more && now_empty) {
                    self.peer.notify(PipeEvt::Writable);
                }
                if more {
                    Ok(RecvStatus::Recv(msg))
                } else {
                    Ok(RecvStatus::Release(msg))
                }
            }
            Popped::Empty { closed: true } => Err(broken_pipe_io_error("end of pipe")),
            Popped::Empty { closed: false } => Err(would_block_io_error("no message ready"))
        }
    }

    fn has_pending_send(&self) -> bool {
        self.tx.has_items()
    }

    fn has_pending_recv(&self) -> bool {
        self.rx.has_items()
    }

    fn peer_alive(&self) -> bool {
        !self.rx.is_closed()
    }

    fn close(&mut self, hard: bool) {
        self.tx.close();
        if hard {
            self.rx.close();
        }
        if !self.hup_sent.swap(true, Ordering::AcqRel) {
            self.peer.notify(PipeEvt::Closed);
        }
    }

    fn split(&self) -> Box<dyn Conduit> {
        Box::new(InprocPipe {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            peer: self.peer.clone(),
            hup_sent: self.hup_sent.clone()
        })
    }
}
