// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! Scalability protocols messaging runtime.
//!
//! A [Session](struct.Session.html) owns a pool of workers, each running
//! a poll loop over an event queue, a timer set and the state machines
//! pinned to it. [Sockets](struct.Socket.html) implement one of the
//! scalability patterns (request/reply, publish/subscribe, pipeline,
//! pair, bus, survey) as a policy layer over pipes, the ordered duplex
//! message channels provided by the transports. The in-process transport
//! ships with the library; other transports plug in behind the same pipe
//! contract.
//!
//! ```no_run
//! use scalemq::{Session, SocketType};
//!
//! let session = Session::new().unwrap();
//! let mut pull = session.create_socket(SocketType::Pull).unwrap();
//! let mut push = session.create_socket(SocketType::Push).unwrap();
//!
//! pull.bind("inproc://pipeline").unwrap();
//! push.connect("inproc://pipeline").unwrap();
//!
//! push.send(vec![65, 66, 67]).unwrap();
//! let received = pull.recv().unwrap();
//! ```

#[macro_use]
extern crate log;
extern crate byteorder;
extern crate mio;
extern crate time;

mod core;
mod facade;
mod io_error;
mod message;
mod proto;
mod reactor;
mod sequence;
mod transport;

pub use core::{SocketId, EndpointId, SocketType};
pub use core::config::{SocketOption, SocketOptionKind};
pub use facade::endpoint::Endpoint;
pub use facade::session::{Session, PollEntry};
pub use facade::socket::Socket;
pub use message::{Chunk, Message};
