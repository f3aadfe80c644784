// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! A fixed-capacity, O(1) LRU index: recency order over a set of keys,
//! with no value storage of its own. Callers that want an LRU cache pair
//! this with their own map from key to value and call `remove_oldest`
//! when they decide capacity has been reached.
//!
//! Nodes live in a dense `Vec`, linked into a doubly linked list via
//! indices rather than pointers; removed slots are threaded onto a free
//! list so the backing storage never shrinks or reallocates once warm.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

struct Node<K> {
    key: K,
    prev: usize,
    next: usize,
}

/// An O(1) insert/touch/remove LRU index over keys of type `K`. Holds no
/// values, only key ordering.
pub struct LruIndex<K> {
    nodes: Vec<Option<Node<K>>>,
    index: HashMap<K, usize>,
    free: Vec<usize>,
    head: usize, // most recently used
    tail: usize, // least recently used
    capacity: usize,
}

impl<K: Eq + Hash + Clone> LruIndex<K> {
    /// Create an index that evicts nothing on its own; callers call
    /// [`Self::remove_oldest`] when they decide capacity has been reached.
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
        }
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The configured capacity hint (informational; not enforced here).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.nodes[slot].as_ref().unwrap();
            (node.prev, node.next)
        };
        if prev != NIL {
            self.nodes[prev].as_mut().unwrap().next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].as_mut().unwrap().prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn push_front(&mut self, slot: usize) {
        let node = self.nodes[slot].as_mut().unwrap();
        node.prev = NIL;
        node.next = self.head;
        if self.head != NIL {
            self.nodes[self.head].as_mut().unwrap().prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }

    /// Insert `key`, marking it most recently used. Returns `false`
    /// without changing recency if it was already present, `true` if it
    /// was newly added — use [`Self::touch`] to re-mark an existing key.
    pub fn insert(&mut self, key: K) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(Node { key: key.clone(), prev: NIL, next: NIL });
                slot
            }
            None => {
                self.nodes.push(Some(Node { key: key.clone(), prev: NIL, next: NIL }));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.push_front(slot);
        true
    }

    /// Mark `key` as most recently used. No-op if the key is absent.
    pub fn touch(&mut self, key: &K) {
        if let Some(&slot) = self.index.get(key) {
            self.detach(slot);
            self.push_front(slot);
        }
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(slot) = self.index.remove(key) else {
            return false;
        };
        self.detach(slot);
        self.nodes[slot] = None;
        self.free.push(slot);
        true
    }

    /// Evict and return the least recently used key.
    pub fn remove_oldest(&mut self) -> Option<K> {
        if self.tail == NIL {
            return None;
        }
        let slot = self.tail;
        let key = self.nodes[slot].as_ref().unwrap().key.clone();
        self.detach(slot);
        self.nodes[slot] = None;
        self.index.remove(&key);
        self.free.push(slot);
        Some(key)
    }

    /// Iterate from most to least recently used.
    pub fn iter_mru_to_lru(&self) -> impl Iterator<Item = &K> {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            if cur == NIL {
                return None;
            }
            let node = self.nodes[cur].as_ref().unwrap();
            cur = node.next;
            Some(&node.key)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let mut lru: LruIndex<u32> = LruIndex::new(4);
        lru.insert(1);
        lru.insert(2);
        assert!(lru.contains(&1));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn touch_moves_to_front() {
        let mut lru: LruIndex<u32> = LruIndex::new(4);
        lru.insert(1);
        lru.insert(2);
        lru.insert(3);
        lru.touch(&1);
        let order: Vec<u32> = lru.iter_mru_to_lru().copied().collect();
        assert_eq!(order, vec![1, 3, 2]);
    }

    #[test]
    fn remove_oldest_evicts_tail() {
        let mut lru: LruIndex<u32> = LruIndex::new(2);
        lru.insert(1);
        lru.insert(2);
        let evicted = lru.remove_oldest().unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(lru.len(), 1);
        assert!(lru.contains(&2));
    }

    #[test]
    fn remove_reuses_free_slots() {
        let mut lru: LruIndex<u32> = LruIndex::new(4);
        lru.insert(1);
        lru.insert(2);
        lru.remove(&1);
        lru.insert(3);
        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(&1));
        assert!(lru.contains(&3));
    }

    #[test]
    fn reinserting_an_existing_key_does_not_change_recency() {
        let mut lru: LruIndex<u32> = LruIndex::new(4);
        lru.insert(1);
        lru.insert(2);
        assert!(!lru.insert(1));
        let order: Vec<u32> = lru.iter_mru_to_lru().copied().collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn empty_index_remove_oldest_is_none() {
        let mut lru: LruIndex<u32> = LruIndex::new(4);
        assert_eq!(lru.remove_oldest(), None);
    }
}
