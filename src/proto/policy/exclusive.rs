// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use core::EndpointId;

/// Single pipe slot used by the pair pattern: at most one active peer,
/// with one readiness flag per direction.
pub struct Exclusive {
    eid: Option<EndpointId>,
    send_ready: bool,
    recv_ready: bool
}

impl Exclusive {
    pub fn new() -> Exclusive {
        Exclusive {
            eid: None,
            send_ready: false,
            recv_ready: false
        }
    }

    /// Claims the slot; fails when another pipe already holds it.
    pub fn occupy(&mut self, eid: EndpointId) -> bool {
        if self.eid.is_some() {
            false
        } else {
            self.eid = Some(eid);
            true
        }
    }

    pub fn vacate(&mut self, eid: EndpointId) -> bool {
        if self.eid == Some(eid) {
            self.eid = None;
            self.send_ready = false;
            self.recv_ready = false;
            true
        } else {
            false
        }
    }

    pub fn is(&self, eid: EndpointId) -> bool {
        self.eid == Some(eid)
    }

    pub fn active(&self) -> Option<EndpointId> {
        self.eid
    }

    pub fn set_send_ready(&mut self, ready: bool) {
        self.send_ready = ready;
    }

    pub fn set_recv_ready(&mut self, ready: bool) {
        self.recv_ready = ready;
    }

    pub fn can_send(&self) -> bool {
        self.send_ready
    }

    pub fn can_recv(&self) -> bool {
        self.recv_ready
    }
}

#[cfg(test)]
mod tests {
    use core::EndpointId;
    use super::Exclusive;

    #[test]
    fn the_slot_holds_a_single_pipe() {
        let mut excl = Exclusive::new();
        let first = EndpointId(1);
        let second = EndpointId(2);

        assert!(excl.occupy(first));
        assert!(!excl.occupy(second));
        assert!(excl.is(first));

        assert!(!excl.vacate(second));
        assert!(excl.vacate(first));
        assert!(excl.occupy(second));
    }

    #[test]
    fn vacating_clears_the_readiness() {
        let mut excl = Exclusive::new();
        let eid = EndpointId(1);

        excl.occupy(eid);
        excl.set_send_ready(true);
        excl.set_recv_ready(true);
        excl.vacate(eid);

        assert!(!excl.can_send());
        assert!(!excl.can_recv());
    }
}
