// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

pub mod inproc;

use std::io;

use message::Message;
use io_error::*;

/// Outcome of handing a message to a pipe. The message is accepted either
/// way; `Release` tells the caller the pipe is no longer writable until
/// the transport signals `Writable` again.
pub enum SendStatus {
    Sent,
    Release
}

/// Outcome of taking a message from a pipe. `Release` tells the caller the
/// pipe is no longer readable until the transport signals `Readable` again.
pub enum RecvStatus {
    Recv(Message),
    Release(Message)
}

/// Contract a transport endpoint fulfills toward the core: deliver whole
/// messages, accept whole messages, and report readiness transitions to
/// the owning socket through its worker queue. Additional handles onto the
/// same underlying channel are obtained with `split`.
pub trait Conduit: Send {
    fn send(&mut self, msg: Message) -> io::Result<SendStatus>;
    fn recv(&mut self) -> io::Result<RecvStatus>;
    fn has_pending_send(&self) -> bool;
    fn has_pending_recv(&self) -> bool;
    fn peer_alive(&self) -> bool;

    /// Stops the outgoing direction; messages already queued stay
    /// deliverable. A hard close tears down the incoming direction too.
    fn close(&mut self, hard: bool);

    fn split(&self) -> Box<dyn Conduit>;
}

/// Splits `transport://rest` into its scheme and transport specific parts.
pub fn split_scheme(addr: &str) -> io::Result<(&str, &str)> {
    match addr.find("://") {
        Some(pos) => Ok((&addr[..pos], &addr[pos + 3..])),
        None => Err(invalid_input_io_error("malformed address"))
    }
}

#[cfg(test)]
mod tests {
    use super::split_scheme;

    #[test]
    fn addresses_have_a_scheme_and_a_rest() {
        let (scheme, rest) = split_scheme("inproc://test").expect("split");

        assert_eq!("inproc", scheme);
        assert_eq!("test", rest);
        assert!(split_scheme("no-scheme").is_err());
    }
}
