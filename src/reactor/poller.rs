// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use mio;
use mio::Evented;

/// Readiness of one registered handle, as seen at the last `wait`.
#[derive(Debug, Copy, Clone)]
pub struct PollEvent {
    pub token: mio::Token,
    pub readable: bool,
    pub writable: bool,
    pub closed: bool
}

/// Multiplexes an arbitrary number of I/O handles on readability and
/// writability. The registration is level-triggered, so enabling interest
/// on a handle that is already ready is reported by the next `wait`.
pub struct Poller {
    poll: mio::Poll,
    events: mio::Events,
    cursor: usize,
    interests: HashMap<mio::Token, mio::Ready>,
    next_token: usize
}

impl Poller {
    pub fn new() -> io::Result<Poller> {
        Ok(Poller {
            poll: mio::Poll::new()?,
            events: mio::Events::with_capacity(1024),
            cursor: 0,
            interests: HashMap::new(),
            next_token: 0
        })
    }

    pub fn add(&mut self, io: &dyn Evented) -> io::Result<mio::Token> {
        let token = mio::Token(self.next_token);

        self.next_token += 1;
        self.poll.register(io, token, mio::Ready::empty(), mio::PollOpt::level())?;
        self.interests.insert(token, mio::Ready::empty());

        Ok(token)
    }

    pub fn rm(&mut self, io: &dyn Evented, token: mio::Token) -> io::Result<()> {
        self.interests.remove(&token);
        self.poll.deregister(io)
    }

    pub fn set_in(&mut self, io: &dyn Evented, token: mio::Token) -> io::Result<()> {
        self.update(io, token, mio::Ready::readable(), true)
    }

    pub fn reset_in(&mut self, io: &dyn Evented, token: mio::Token) -> io::Result<()> {
        self.update(io, token, mio::Ready::readable(), false)
    }

    pub fn set_out(&mut self, io: &dyn Evented, token: mio::Token) -> io::Result<()> {
        self.update(io, token, mio::Ready::writable(), true)
    }

    pub fn reset_out(&mut self, io: &dyn Evented, token: mio::Token) -> io::Result<()> {
        self.update(io, token, mio::Ready::writable(), false)
    }

    fn update(&mut self, io: &dyn Evented, token: mio::Token, ready: mio::Ready, enable: bool) -> io::Result<()> {
        let interest = {
            let current = self.interests.entry(token).or_insert_with(mio::Ready::empty);

            if enable {
                current.insert(ready);
            } else {
                current.remove(ready);
            }

            *current
        };

        self.poll.reregister(io, token, interest, mio::PollOpt::level())
    }

    /// Blocks until at least one handle is ready or the timeout expires.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.cursor = 0;
        self.poll.poll(&mut self.events, timeout).map(|_| ())
    }

    /// Returns the next event observed by the last `wait`, if any.
    pub fn event(&mut self) -> Option<PollEvent> {
        let event = self.events.get(self.cursor);

        self.cursor += 1;
        event.map(|e| PollEvent {
            token: e.token(),
            readable: e.readiness().is_readable(),
            writable: e.readiness().is_writable(),
            closed: is_closed(e.readiness())
        })
    }
}

#[cfg(unix)]
fn is_closed(ready: mio::Ready) -> bool {
    mio::unix::UnixReady::from(ready).is_hup()
}

#[cfg(not(unix))]
fn is_closed(_: mio::Ready) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mio;

    use super::Poller;

    #[test]
    fn set_in_on_an_already_ready_handle_is_reported() {
        let mut poller = Poller::new().expect("create poller");
        let (registration, readiness) = mio::Registration::new2();
        let token = poller.add(&registration).expect("register");

        readiness.set_readiness(mio::Ready::readable()).expect("mark readable");
        poller.set_in(&registration, token).expect("set_in");
        poller.wait(Some(Duration::from_millis(250))).expect("wait");

        let event = poller.event().expect("one event");
        assert_eq!(token, event.token);
        assert!(event.readable);
    }

    #[test]
    fn reset_in_mutes_the_handle() {
        let mut poller = Poller::new().expect("create poller");
        let (registration, readiness) = mio::Registration::new2();
        let token = poller.add(&registration).expect("register");

        poller.set_in(&registration, token).expect("set_in");
        poller.reset_in(&registration, token).expect("reset_in");
        readiness.set_readiness(mio::Ready::readable()).expect("mark readable");
        poller.wait(Some(Duration::from_millis(50))).expect("wait");

        assert!(poller.event().is_none());
    }

    #[test]
    fn wait_times_out_when_nothing_is_ready() {
        let mut poller = Poller::new().expect("create poller");
        let (registration, _readiness) = mio::Registration::new2();
        let token = poller.add(&registration).expect("register");

        poller.set_in(&registration, token).expect("set_in");
        poller.wait(Some(Duration::from_millis(50))).expect("wait");

        assert!(poller.event().is_none());
    }
}
