//! Recency-ordered map backed by an index-linked arena.
//!
//! Nodes live in a `Vec` and link to each other by slot index, so promotion,
//! insertion and eviction are all O(1) and no node is ever shared or aliased.

use std::collections::HashMap;

#[derive(Debug)]
struct Node<T> {
    key: String,
    value: T,
    /// Towards the most recently used end.
    prev: Option<usize>,
    /// Towards the least recently used end.
    next: Option<usize>,
}

/// A map whose entries are kept in most-recently-used order.
///
/// - `head` = most recently used
/// - `tail` = least recently used, the next eviction victim
#[derive(Debug)]
pub struct LruList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LruList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        let idx = *self.index.get(key)?;
        if self.head != Some(idx) {
            self.unlink(idx);
            self.link_front(idx);
        }
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Inserts `value` as the most recently used entry.
    ///
    /// An existing entry under the same key is removed first and its value
    /// returned.
    pub fn push_front(&mut self, key: String, value: T) -> Option<T> {
        let replaced = self.remove(&key);

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.link_front(idx);
        replaced
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_back(&mut self) -> Option<(String, T)> {
        let idx = self.tail?;
        let node = self.release(idx);
        Some((node.key, node.value))
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let idx = *self.index.get(key)?;
        Some(self.release(idx).value)
    }

    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn release(&mut self, idx: usize) -> Node<T> {
        self.unlink(idx);
        let node = self.slots[idx]
            .take()
            .unwrap_or_else(|| unreachable!("linked slot {idx} is vacant"));
        self.index.remove(&node.key);
        self.free.push(idx);
        node
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<T> {
        self.slots[idx]
            .as_mut()
            .unwrap_or_else(|| unreachable!("linked slot {idx} is vacant"))
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node_mut(idx);
            let links = (node.prev, node.next);
            node.prev = None;
            node.next = None;
            links
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

/// Most-recent-first iterator over an [`LruList`].
pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a str, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.slots[self.cursor?].as_ref()?;
        self.cursor = node.next;
        Some((node.key.as_str(), &node.value))
    }
}
