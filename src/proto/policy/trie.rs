// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::collections::HashMap;
use std::mem;

/// Compressed prefix trie holding the subscriptions of a socket.
/// Each node carries a subscription count so the same prefix can be
/// subscribed several times; unsubscribing compacts the structure back,
/// so a subscribe followed by the matching unsubscribe leaves the trie
/// exactly as it was.
#[derive(Debug, PartialEq)]
pub struct Trie {
    root: Node
}

#[derive(Debug, PartialEq)]
struct Node {
    count: u32,
    children: HashMap<u8, Edge>
}

#[derive(Debug, PartialEq)]
struct Edge {
    label: Vec<u8>,
    node: Node
}

impl Node {
    fn new() -> Node {
        Node {
            count: 0,
            children: HashMap::new()
        }
    }
}

fn common_prefix(left: &[u8], right: &[u8]) -> usize {
    left.iter().zip(right.iter()).take_while(|&(l, r)| l == r).count()
}

impl Trie {
    pub fn new() -> Trie {
        Trie { root: Node::new() }
    }

    pub fn subscribe(&mut self, prefix: &[u8]) {
        Trie::add(&mut self.root, prefix);
    }

    fn add(node: &mut Node, prefix: &[u8]) {
        if prefix.is_empty() {
            node.count += 1;
            return;
        }

        let first = prefix[0];

        if !node.children.contains_key(&first) {
            let mut leaf = Node::new();

            leaf.count = 1;
            node.children.insert(first, Edge {
                label: prefix.to_vec(),
                node: leaf
            });
            return;
        }

        let edge = node.children.get_mut(&first).unwrap();
        let common = common_prefix(&edge.label, prefix);

        if common == edge.label.len() {
            Trie::add(&mut edge.node, &prefix[common..]);
            return;
        }

        // The new prefix diverges inside the edge: split it.
        let tail = edge.label.split_off(common);
        let grandchild = mem::replace(&mut edge.node, Node::new());

        edge.node.children.insert(tail[0], Edge {
            label: tail,
            node: grandchild
        });
        Trie::add(&mut edge.node, &prefix[common..]);
    }

    /// Removes one subscription; returns false when the prefix was
    /// not subscribed.
    pub fn unsubscribe(&mut self, prefix: &[u8]) -> bool {
        Trie::del(&mut self.root, prefix)
    }

    fn del(node: &mut Node, prefix: &[u8]) -> bool {
        if prefix.is_empty() {
            if node.count > 0 {
                node.count -= 1;
                return true;
            }
            return false;
        }

        let first = prefix[0];
        let (removed, drop_child, merge_child) = match node.children.get_mut(&first) {
            None => return false,
            Some(edge) => {
                if prefix.len() < edge.label.len() || prefix[..edge.label.len()] != edge.label[..] {
                    return false;
                }

                let removed = Trie::del(&mut edge.node, &prefix[edge.label.len()..]);
                let vacant = edge.node.count == 0;

                (removed,
                 vacant && edge.node.children.is_empty(),
                 vacant && edge.node.children.len() == 1)
            }
        };

        if drop_child {
            node.children.remove(&first);
        } else if merge_child {
            // Fold the single grandchild back into the edge.
            if let Some(edge) = node.children.get_mut(&first) {
                let key = *edge.node.children.keys().next().unwrap();
                let grandchild = edge.node.children.remove(&key).unwrap();

                edge.label.extend_from_slice(&grandchild.label);
                edge.node = grandchild.node;
            }
        }

        removed
    }

    /// Walks the trie along the message body and reports whether any
    /// visited node holds a subscription. O(k) in the matched prefix.
    pub fn matches(&self, data: &[u8]) -> bool {
        let mut node = &self.root;
        let mut rest = data;

        loop {
            if node.count > 0 {
                return true;
            }
            if rest.is_empty() {
                return false;
            }
            match node.children.get(&rest[0]) {
                Some(edge) if rest.len() >= edge.label.len() && rest[..edge.label.len()] == edge.label[..] => {
                    node = &edge.node;
                    rest = &rest[edge.label.len()..];
                }
                _ => return false
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.count == 0 && self.root.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Trie;

    #[test]
    fn matching_is_by_prefix() {
        let mut trie = Trie::new();

        trie.subscribe(b"BTC");

        assert!(trie.matches(b"BTC:10"));
        assert!(trie.matches(b"BTC"));
        assert!(!trie.matches(b"ETH:2"));
        assert!(!trie.matches(b"BT"));
        assert!(!trie.matches(b""));
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let mut trie = Trie::new();

        assert!(!trie.matches(b"anything"));

        trie.subscribe(b"");

        assert!(trie.matches(b"anything"));
        assert!(trie.matches(b""));
    }

    #[test]
    fn shared_prefixes_split_and_merge() {
        let mut trie = Trie::new();

        trie.subscribe(b"topic.a");
        trie.subscribe(b"topic.b");

        assert!(trie.matches(b"topic.a.sub"));
        assert!(trie.matches(b"topic.b"));
        assert!(!trie.matches(b"topic.c"));

        assert!(trie.unsubscribe(b"topic.a"));
        assert!(!trie.matches(b"topic.a"));
        assert!(trie.matches(b"topic.b"));
    }

    #[test]
    fn unsubscribe_restores_the_previous_trie() {
        let mut reference = Trie::new();
        reference.subscribe(b"BTC");

        let mut trie = Trie::new();
        trie.subscribe(b"BTC");
        trie.subscribe(b"B");
        assert!(trie.unsubscribe(b"B"));

        assert_eq!(reference, trie);

        trie.subscribe(b"BTCUSD");
        assert!(trie.unsubscribe(b"BTCUSD"));

        assert_eq!(reference, trie);
    }

    #[test]
    fn unsubscribe_round_trip_leaves_the_trie_empty() {
        let mut trie = Trie::new();

        trie.subscribe(b"news");
        assert!(trie.unsubscribe(b"news"));
        assert!(!trie.unsubscribe(b"news"));
        assert!(trie.is_empty());
        assert_eq!(Trie::new(), trie);
    }

    #[test]
    fn counted_subscriptions_need_as_many_unsubscribes() {
        let mut trie = Trie::new();

        trie.subscribe(b"dup");
        trie.subscribe(b"dup");

        assert!(trie.unsubscribe(b"dup"));
        assert!(trie.matches(b"duplicate"));
        assert!(trie.unsubscribe(b"dup"));
        assert!(!trie.matches(b"duplicate"));
    }
}
