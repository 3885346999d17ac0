// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recency list backing the store.
//!
//! Entries live in a slab of slots and are chained into a doubly-linked list by index, so
//! promotion and removal are O(1) without per-node allocations. The head is the most recently
//! used entry, the tail the least recently used one.

/// Index of a slot in the slab.
pub(crate) type NodeIndex = usize;

#[derive(Debug)]
pub(crate) struct Node<V> {
    pub(crate) key: String,
    pub(crate) value: V,
    prev: Option<NodeIndex>,
    next: Option<NodeIndex>,
}

#[derive(Debug)]
pub(crate) struct RecencyList<V> {
    slots: Vec<Option<Node<V>>>,

    /// Slots vacated by removals, reused before growing the slab.
    free: Vec<NodeIndex>,

    head: Option<NodeIndex>,
    tail: Option<NodeIndex>,
    len: usize,
}

impl<V> RecencyList<V> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> Option<&Node<V>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut Node<V>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Inserts a new entry as the most recently used one.
    pub(crate) fn push_front(&mut self, key: String, value: V) -> NodeIndex {
        let node = Node {
            key,
            value,
            prev: None,
            next: self.head,
        };

        let idx = if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(node);
            idx
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        };

        if let Some(old_head) = self.head
            && let Some(old) = self.node_mut(old_head)
        {
            old.prev = Some(idx);
        }
        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        self.len += 1;
        idx
    }

    /// Promotes an existing entry to most recently used.
    pub(crate) fn move_to_front(&mut self, idx: NodeIndex) {
        if self.head == Some(idx) || self.node(idx).is_none() {
            return;
        }

        self.unlink(idx);

        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(old_head) = old_head
            && let Some(old) = self.node_mut(old_head)
        {
            old.prev = Some(idx);
        }
        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Removes the least recently used entry.
    pub(crate) fn pop_back(&mut self) -> Option<(String, V)> {
        let tail = self.tail?;
        self.remove(tail)
    }

    pub(crate) fn remove(&mut self, idx: NodeIndex) -> Option<(String, V)> {
        self.node(idx)?;
        self.unlink(idx);

        let node = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.len -= 1;
        Some((node.key, node.value))
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates from most to least recently used.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Node<V>> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.node(cursor?)?;
            cursor = node.next;
            Some(node)
        })
    }

    /// Detaches a node from its neighbors without freeing its slot.
    fn unlink(&mut self, idx: NodeIndex) {
        let Some(node) = self.node(idx) else {
            return;
        };
        let (prev, next) = (node.prev, node.next);

        match prev {
            Some(prev) => {
                if let Some(p) = self.node_mut(prev) {
                    p.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next) => {
                if let Some(n) = self.node_mut(next) {
                    n.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(list: &RecencyList<V>) -> Vec<&str> {
        list.iter().map(|n| n.key.as_str()).collect()
    }

    #[test]
    fn push_front_orders_most_recent_first() {
        let mut list = RecencyList::new();
        list.push_front("a".to_string(), 1);
        list.push_front("b".to_string(), 2);
        list.push_front("c".to_string(), 3);

        assert_eq!(list.len(), 3);
        assert_eq!(keys(&list), ["c", "b", "a"]);
    }

    #[test]
    fn move_to_front_from_tail_and_middle() {
        let mut list = RecencyList::new();
        let a = list.push_front("a".to_string(), 1);
        let b = list.push_front("b".to_string(), 2);
        list.push_front("c".to_string(), 3);

        list.move_to_front(a);
        assert_eq!(keys(&list), ["a", "c", "b"]);

        list.move_to_front(b);
        assert_eq!(keys(&list), ["b", "a", "c"]);

        // Promoting the head is a no-op.
        list.move_to_front(b);
        assert_eq!(keys(&list), ["b", "a", "c"]);
    }

    #[test]
    fn pop_back_returns_oldest() {
        let mut list = RecencyList::new();
        list.push_front("a".to_string(), 1);
        list.push_front("b".to_string(), 2);

        assert_eq!(list.pop_back(), Some(("a".to_string(), 1)));
        assert_eq!(list.pop_back(), Some(("b".to_string(), 2)));
        assert_eq!(list.pop_back(), None);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut list = RecencyList::new();
        let a = list.push_front("a".to_string(), 1);
        list.push_front("b".to_string(), 2);

        list.remove(a);
        let c = list.push_front("c".to_string(), 3);

        assert_eq!(a, c);
        assert_eq!(list.slots.len(), 2);
        assert_eq!(keys(&list), ["c", "b"]);
    }

    #[test]
    fn remove_single_entry_resets_ends() {
        let mut list = RecencyList::new();
        let a = list.push_front("a".to_string(), 1);

        assert!(list.remove(a).is_some());
        assert!(list.head.is_none());
        assert!(list.tail.is_none());
        assert!(list.remove(a).is_none());
    }
}
