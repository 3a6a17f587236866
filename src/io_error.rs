// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::io::{Error, ErrorKind};

pub fn other_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::Other, msg)
}

pub fn would_block_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::WouldBlock, msg)
}

pub fn invalid_data_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::InvalidData, msg)
}

pub fn invalid_input_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::InvalidInput, msg)
}

pub fn timedout_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::TimedOut, msg)
}

pub fn interrupted_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::Interrupted, msg)
}

pub fn broken_pipe_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::BrokenPipe, msg)
}

pub fn addr_in_use_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::AddrInUse, msg)
}

pub fn bad_handle_io_error(msg: &'static str) -> Error {
    Error::new(ErrorKind::NotFound, msg)
}

pub fn terminating_io_error() -> Error {
    Error::new(ErrorKind::Other, "session is terminating")
}

pub fn msg_size_io_error() -> Error {
    Error::new(ErrorKind::InvalidData, "message too large")
}
