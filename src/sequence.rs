// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Monotonic id generator shared across threads.
/// Clones hand out ids from the same underlying counter.
#[derive(Clone)]
pub struct Sequence {
    value: Arc<AtomicUsize>
}

impl Sequence {
    pub fn new() -> Sequence {
        Sequence { value: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn next(&self) -> usize {
        self.value.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Sequence;

    #[test]
    fn sequence_can_be_cloned() {
        let seq = Sequence::new();
        let other = seq.clone();

        assert_eq!(0, other.next());
        assert_eq!(1, seq.next());
        assert_eq!(2, seq.next());
        assert_eq!(3, other.next());
    }
}
