// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! In-process transport: a session-wide name registry plus pairs of
//! bounded message queues attached to pipes on both sides. A connect
//! issued before the matching bind stays parked until the bind occurs.

pub mod pipe;
pub mod queue;

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use core::{SocketId, EndpointId};
use io_error::*;
use reactor::WorkerHandle;
use sequence::Sequence;
use self::pipe::{InprocPipe, PeerHandle};
use self::queue::MsgQueue;

/// Everything one side contributes to an inproc pipe: where to signal,
/// how much to buffer toward it, and which protocol it speaks.
#[derive(Clone)]
pub struct PeerParams {
    pub socket: SocketId,
    pub eid: EndpointId,
    pub worker: WorkerHandle,
    pub recv_buffer: usize,
    pub recv_max_size: usize,
    pub proto_ids: (u16, u16)
}

impl PeerParams {
    pub fn compatible(&self, other: &PeerParams) -> bool {
        let (my_id, my_peer_id) = self.proto_ids;
        let (other_id, other_peer_id) = other.proto_ids;

        my_id == other_peer_id && other_id == my_peer_id
    }
}

/// Name registry of the inproc transport. Guarded by its own mutex,
/// which is never held while posting signals.
pub struct Registry {
    state: Mutex<State>
}

struct State {
    bindings: HashMap<String, PeerParams>,
    parked: Vec<(String, PeerParams)>
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            state: Mutex::new(State {
                bindings: HashMap::new(),
                parked: Vec::new()
            })
        }
    }

    /// Registers a listening endpoint and returns the parked connectors
    /// waiting for that name.
    pub fn bind(&self, name: &str, binder: PeerParams) -> io::Result<Vec<PeerParams>> {
        let mut state = self.state.lock().unwrap();

        if state.bindings.contains_key(name) {
            return Err(addr_in_use_io_error("name is already bound"));
        }

        state.bindings.insert(name.to_string(), binder);

        let mut matched = Vec::new();

        state.parked.retain(|&(ref parked_name, ref params)| {
            if parked_name == name {
                matched.push(params.clone());
                false
            } else {
                true
            }
        });

        Ok(matched)
    }

    pub fn unbind(&self, name: &str, socket: SocketId) {
        let mut state = self.state.lock().unwrap();
        let owned = match state.bindings.get(name) {
            Some(params) => params.socket == socket,
            None => false
        };

        if owned {
            state.bindings.remove(name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<PeerParams> {
        self.state.lock().unwrap().bindings.get(name).cloned()
    }

    /// Parks a connector until a matching bind shows up. Re-parking the
    /// same endpoint replaces the previous entry.
    pub fn park(&self, name: String, connector: PeerParams) {
        let mut state = self.state.lock().unwrap();

        state.parked.retain(|&(_, ref params)| {
            !(params.socket == connector.socket && params.eid == connector.eid)
        });
        state.parked.push((name, connector));
    }

    pub fn unpark(&self, socket: SocketId, eid: EndpointId) {
        let mut state = self.state.lock().unwrap();

        state.parked.retain(|&(_, ref params)| {
            !(params.socket == socket && params.eid == eid)
        });
    }
}

/// Builds the queue pair linking two peers and returns a pipe for each.
/// Each direction is bounded by the receive buffer of the side reading
/// from it, and enforces that side's maximum message size.
pub fn link(a: &PeerParams, b: &PeerParams) -> (InprocPipe, InprocPipe) {
    let a_to_b = Arc::new(MsgQueue::new(b.recv_buffer, b.recv_max_size));
    let b_to_a = Arc::new(MsgQueue::new(a.recv_buffer, a.recv_max_size));
    let a_side = InprocPipe::new(a_to_b.clone(), b_to_a.clone(), PeerHandle {
        worker: b.worker.clone(),
        socket: b.socket,
        eid: b.eid
    });
    let b_side = InprocPipe::new(b_to_a, a_to_b, PeerHandle {
        worker: a.worker.clone(),
        socket: a.socket,
        eid: a.eid
    });

    (a_side, b_side)
}

/// Fresh endpoint id for the binder-side pipe of a new link.
pub fn pipe_eid(seq: &Sequence) -> EndpointId {
    EndpointId(seq.next())
}

#[cfg(test)]
mod tests {
    use core::{SocketId, EndpointId};
    use reactor::{Signal, wakeup};
    use super::{Registry, PeerParams};

    fn params(socket: usize, eid: usize, proto_ids: (u16, u16)) -> PeerParams {
        let (handle, _queue) = wakeup::event_queue::<Signal>();

        PeerParams {
            socket: SocketId(socket),
            eid: EndpointId(eid),
            worker: handle,
            recv_buffer: 128 * 1024,
            recv_max_size: 1024 * 1024,
            proto_ids: proto_ids
        }
    }

    #[test]
    fn a_name_can_be_bound_once() {
        let registry = Registry::new();

        registry.bind("queue", params(1, 1, (80, 81))).expect("bind");
        assert!(registry.bind("queue", params(2, 2, (80, 81))).is_err());

        registry.unbind("queue", SocketId(1));
        registry.bind("queue", params(2, 2, (80, 81))).expect("bind after unbind");
    }

    #[test]
    fn unbind_checks_the_owner() {
        let registry = Registry::new();

        registry.bind("queue", params(1, 1, (80, 81))).expect("bind");
        registry.unbind("queue", SocketId(9));

        assert!(registry.lookup("queue").is_some());
    }

    #[test]
    fn parked_connectors_wait_for_the_matching_bind() {
        let registry = Registry::new();

        registry.park("queue".to_string(), params(1, 1, (81, 80)));
        registry.park("other".to_string(), params(2, 2, (81, 80)));

        let matched = registry.bind("queue", params(3, 3, (80, 81))).expect("bind");

        assert_eq!(1, matched.len());
        assert_eq!(SocketId(1), matched[0].socket);

        let matched = registry.bind("other", params(4, 4, (80, 81))).expect("bind");

        assert_eq!(1, matched.len());
        assert_eq!(SocketId(2), matched[0].socket);
    }

    #[test]
    fn parking_again_replaces_the_previous_entry() {
        let registry = Registry::new();

        registry.park("queue".to_string(), params(1, 1, (81, 80)));
        registry.park("queue".to_string(), params(1, 1, (81, 80)));

        let matched = registry.bind("queue", params(3, 3, (80, 81))).expect("bind");

        assert_eq!(1, matched.len());
    }

    #[test]
    fn unparked_connectors_are_forgotten() {
        let registry = Registry::new();

        registry.park("queue".to_string(), params(1, 1, (81, 80)));
        registry.unpark(SocketId(1), EndpointId(1));

        let matched = registry.bind("queue", params(3, 3, (80, 81))).expect("bind");

        assert!(matched.is_empty());
    }

    #[test]
    fn compatibility_is_mutual() {
        let push = params(1, 1, (80, 81));
        let pull = params(2, 2, (81, 80));
        let pair = params(3, 3, (16, 16));

        assert!(push.compatible(&pull));
        assert!(pull.compatible(&push));
        assert!(!push.compatible(&pair));
        assert!(pair.compatible(&pair));
    }
}
