// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io;
use std::sync::mpsc;

use mio;

use io_error::*;
use reactor::poller::Poller;

/// Cross-thread wakeup primitive. The pollable half becomes readable as
/// soon as `signal` is called from any thread, and stays readable until
/// `unsignal` clears it. `signal` is lock-free and idempotent between an
/// `unsignal` and the next `signal`.
pub struct Wakeup {
    registration: mio::Registration,
    readiness: mio::SetReadiness
}

#[derive(Clone, Debug)]
pub struct WakeupHandle {
    readiness: mio::SetReadiness
}

pub fn wakeup_pair() -> (Wakeup, WakeupHandle) {
    let (registration, readiness) = mio::Registration::new2();
    let wakeup = Wakeup {
        registration: registration,
        readiness: readiness.clone()
    };

    (wakeup, WakeupHandle { readiness: readiness })
}

impl Wakeup {
    pub fn register(&self, poller: &mut Poller) -> io::Result<mio::Token> {
        let token = poller.add(&self.registration)?;

        poller.set_in(&self.registration, token)?;

        Ok(token)
    }

    pub fn unsignal(&self) {
        let _ = self.readiness.set_readiness(mio::Ready::empty());
    }
}

impl WakeupHandle {
    pub fn signal(&self) {
        let _ = self.readiness.set_readiness(mio::Ready::readable());
    }
}

/// Unbounded queue of work items paired with a wakeup, so producers can
/// push onto another worker's poll loop. Sending signals the wakeup; the
/// consumer clears it and drains.
pub struct EventQueue<T> {
    rx: mpsc::Receiver<T>,
    wakeup: Wakeup
}

pub struct EventQueueHandle<T> {
    tx: mpsc::Sender<T>,
    wakeup: WakeupHandle
}

impl<T> Clone for EventQueueHandle<T> {
    fn clone(&self) -> Self {
        EventQueueHandle {
            tx: self.tx.clone(),
            wakeup: self.wakeup.clone()
        }
    }
}

pub fn event_queue<T>() -> (EventQueueHandle<T>, EventQueue<T>) {
    let (tx, rx) = mpsc::channel();
    let (wakeup, handle) = wakeup_pair();
    let queue = EventQueue {
        rx: rx,
        wakeup: wakeup
    };

    (EventQueueHandle { tx: tx, wakeup: handle }, queue)
}

impl<T> EventQueueHandle<T> {
    pub fn send(&self, item: T) -> io::Result<()> {
        self.tx.send(item).map_err(|_| terminating_io_error())?;
        self.wakeup.signal();

        Ok(())
    }
}

impl<T> EventQueue<T> {
    pub fn register(&self, poller: &mut Poller) -> io::Result<mio::Token> {
        self.wakeup.register(poller)
    }

    pub fn unsignal(&self) {
        self.wakeup.unsignal();
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reactor::poller::Poller;
    use super::*;

    #[test]
    fn signal_wakes_the_poll_loop() {
        let mut poller = Poller::new().expect("create poller");
        let (handle, queue) = event_queue::<usize>();
        let token = queue.register(&mut poller).expect("register");

        handle.send(42).expect("send");
        poller.wait(Some(Duration::from_millis(250))).expect("wait");

        let event = poller.event().expect("one event");
        assert_eq!(token, event.token);
        assert_eq!(Some(42), queue.try_recv());
    }

    #[test]
    fn unsignal_clears_the_readiness() {
        let mut poller = Poller::new().expect("create poller");
        let (handle, queue) = event_queue::<usize>();
        let _ = queue.register(&mut poller).expect("register");

        handle.send(1).expect("send");
        queue.unsignal();
        poller.wait(Some(Duration::from_millis(50))).expect("wait");

        assert!(poller.event().is_none());
        assert_eq!(Some(1), queue.try_recv());
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn signal_is_idempotent_until_unsignaled() {
        let mut poller = Poller::new().expect("create poller");
        let (handle, queue) = event_queue::<usize>();
        let _ = queue.register(&mut poller).expect("register");

        handle.send(1).expect("send");
        handle.send(2).expect("send");
        poller.wait(Some(Duration::from_millis(250))).expect("wait");

        assert!(poller.event().is_some());
        assert_eq!(Some(1), queue.try_recv());
        assert_eq!(Some(2), queue.try_recv());
    }
}
