// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::cmp;
use std::collections::VecDeque;
use std::sync::Mutex;

use message::Message;

/// One direction of an inproc pipe: a bounded queue of whole messages.
/// The bound is expressed in bytes and at least one message is always
/// admitted, so a message larger than the bound still goes through.
/// Once closed the queue refuses new messages but keeps delivering the
/// ones already queued.
pub struct MsgQueue {
    inner: Mutex<Inner>
}

struct Inner {
    items: VecDeque<Message>,
    bytes: usize,
    capacity: usize,
    max_msg: usize,
    full: bool,
    closed: bool
}

pub enum Pushed {
    Delivered {
        was_empty: bool,
        now_full: bool
    },
    TooBig,
    Closed
}

pub enum Popped {
    Msg {
        msg: Message,
        more: bool,
        was_full: bool,
        now_empty: bool
    },
    Empty {
        closed: bool
    }
}

impl MsgQueue {
    pub fn new(capacity: usize, max_msg: usize) -> MsgQueue {
        MsgQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                bytes: 0,
                capacity: capacity,
                max_msg: max_msg,
                full: false,
                closed: false
            })
        }
    }

    pub fn push(&self, msg: Message) -> Pushed {
        let mut inner = self.inner.lock().unwrap();

        if inner.closed {
            return Pushed::Closed;
        }
        if msg.len() > inner.max_msg {
            return Pushed::TooBig;
        }

        let was_empty = inner.items.is_empty();
        let weight = cmp::max(1, msg.len());

        inner.bytes += weight;
        inner.items.push_back(msg);
        if inner.bytes >= inner.capacity {
            inner.full = true;
        }

        Pushed::Delivered {
            was_empty: was_empty,
            now_full: inner.full
        }
    }

    pub fn pop(&self) -> Popped {
        let mut inner = self.inner.lock().unwrap();

        match inner.items.pop_front() {
            None => Popped::Empty { closed: inner.closed },
            Some(msg) => {
                let weight = cmp::max(1, msg.len());

                inner.bytes -= weight;

                let mut was_full = false;
                if inner.full && inner.bytes < inner.capacity {
                    inner.full = false;
                    was_full = true;
                }

                // A closed queue stays readable so the reader comes back
                // and observes the end of the pipe after the last message.
                let now_empty = inner.items.is_empty();
                let more = !now_empty || inner.closed;

                Popped::Msg {
                    msg: msg,
                    more: more,
                    was_full: was_full,
                    now_empty: now_empty
                }
            }
        }
    }

    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }

    pub fn has_items(&self) -> bool {
        !self.inner.lock().unwrap().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

#[cfg(test)]
mod tests {
    use message::Message;
    use super::*;

    fn push_ok(queue: &MsgQueue, msg: Message) -> (bool, bool) {
        match queue.push(msg) {
            Pushed::Delivered { was_empty, now_full } => (was_empty, now_full),
            _ => panic!("message refused")
        }
    }

    #[test]
    fn filling_and_draining_reports_the_transitions() {
        let queue = MsgQueue::new(4, 1024);

        let (was_empty, now_full) = push_ok(&queue, Message::with_body(vec![0; 3]));
        assert!(was_empty);
        assert!(!now_full);

        let (was_empty, now_full) = push_ok(&queue, Message::with_body(vec![0; 3]));
        assert!(!was_empty);
        assert!(now_full);

        match queue.pop() {
            Popped::Msg { was_full, more, .. } => {
                assert!(was_full);
                assert!(more);
            }
            _ => panic!("expected a message")
        }
        match queue.pop() {
            Popped::Msg { more, .. } => assert!(!more),
            _ => panic!("expected a message")
        }
    }

    #[test]
    fn closed_queue_drains_then_reports_the_end() {
        let queue = MsgQueue::new(64, 1024);

        push_ok(&queue, Message::with_body(vec![1]));
        queue.close();

        match queue.push(Message::with_body(vec![2])) {
            Pushed::Closed => {}
            _ => panic!("push should be refused")
        }
        match queue.pop() {
            Popped::Msg { more, .. } => assert!(more),
            _ => panic!("expected the queued message")
        }
        match queue.pop() {
            Popped::Empty { closed } => assert!(closed),
            _ => panic!("expected the end of the queue")
        }
    }

    #[test]
    fn oversize_messages_are_refused() {
        let queue = MsgQueue::new(64, 2);

        match queue.push(Message::with_body(vec![0; 3])) {
            Pushed::TooBig => {}
            _ => panic!("oversize message should be refused")
        }
        match queue.pop() {
            Popped::Empty { closed } => assert!(!closed),
            _ => panic!("queue should be empty")
        }
    }
}
