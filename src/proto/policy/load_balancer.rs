// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use core::EndpointId;
use super::priolist::PrioList;

/// Round-robin send discipline over the writable pipes,
/// honoring the per-pipe send priority.
pub struct LoadBalancer {
    list: PrioList
}

impl LoadBalancer {
    pub fn new() -> LoadBalancer {
        LoadBalancer { list: PrioList::new() }
    }

    pub fn insert(&mut self, eid: EndpointId, prio: u8) {
        self.list.insert(eid, prio);
    }

    pub fn remove(&mut self, eid: EndpointId) {
        self.list.remove(eid);
    }

    pub fn activate(&mut self, eid: EndpointId) {
        self.list.activate(eid);
    }

    pub fn pop(&mut self) -> Option<EndpointId> {
        self.list.pop()
    }

    pub fn can_send(&self) -> bool {
        self.list.has_ready()
    }
}
