// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::ops::Deref;
use std::sync::Arc;

/// Reference counted byte region holding a message body.
/// Cloning a chunk shares the underlying storage instead of copying it,
/// so fan-out protocols can hand the same payload to many pipes.
/// The storage is freed when the last reference goes away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    data: Arc<Vec<u8>>
}

impl Chunk {
    pub fn new(data: Vec<u8>) -> Chunk {
        Chunk { data: Arc::new(data) }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Takes the bytes out, copying only if the storage is still shared.
    pub fn into_vec(self) -> Vec<u8> {
        match Arc::try_unwrap(self.data) {
            Ok(vec) => vec,
            Err(arc) => (*arc).clone()
        }
    }
}

impl Deref for Chunk {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

/// A message is made of two ordered byte regions: a header and a body.
/// Either may be empty. Messages carry no addressing of their own;
/// protocols that need routing information push it into the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub header: Vec<u8>,
    body: Chunk
}

impl Message {
    pub fn new() -> Message {
        Message::with_body(Vec::new())
    }

    pub fn with_body(body: Vec<u8>) -> Message {
        Message {
            header: Vec::new(),
            body: Chunk::new(body)
        }
    }

    pub fn with_header_and_body(header: Vec<u8>, body: Vec<u8>) -> Message {
        Message {
            header: header,
            body: Chunk::new(body)
        }
    }

    pub fn from_chunk(chunk: Chunk) -> Message {
        Message {
            header: Vec::new(),
            body: chunk
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    /// Discards the header and returns the body bytes.
    pub fn to_buffer(self) -> Vec<u8> {
        self.body.into_vec()
    }

    /// Splits the message into its header and its shared body chunk.
    pub fn explode(self) -> (Vec<u8>, Chunk) {
        (self.header, self.body)
    }
}

impl Default for Message {
    fn default() -> Self {
        Message::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_is_shared_between_clones() {
        let msg = Message::with_body(vec![1, 2, 3]);
        let other = msg.clone();

        assert_eq!(msg.body(), other.body());
        assert_eq!(vec![1, 2, 3], other.to_buffer());
        assert_eq!(vec![1, 2, 3], msg.to_buffer());
    }

    #[test]
    fn header_and_body_are_preserved() {
        let msg = Message::with_header_and_body(vec![9], vec![1, 2, 3]);
        let (header, body) = msg.explode();

        assert_eq!(vec![9], header);
        assert_eq!(3, body.len());
    }

    #[test]
    fn to_buffer_drops_the_header() {
        let msg = Message::with_header_and_body(vec![9, 9], vec![4, 2]);

        assert_eq!(vec![4, 2], msg.to_buffer());
    }
}
