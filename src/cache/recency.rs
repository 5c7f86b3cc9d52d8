//! Slab-backed recency list.
//!
//! Entries live in a `Vec` of slots and link to each other by index, so
//! moving an entry to the most-recently-used end is O(1) without pointer
//! juggling. Vacant slots are recycled through a free list.

/// Index of a slot in the list's slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(u32);

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// Doubly linked list ordered from least to most recently used.
#[derive(Debug)]
pub(crate) struct RecencyList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<u32>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl<T> RecencyList<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Append at the most-recently-used end.
    pub(crate) fn push_back(&mut self, value: T) -> SlotId {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(free) => {
                self.slots[free as usize] = Some(node);
                SlotId(free)
            }
            None => {
                // u32 slots cover far more entries than any tile cache holds
                let raw = self.slots.len() as u32;
                self.slots.push(Some(node));
                SlotId(raw)
            }
        };

        match self.tail {
            Some(old_tail) => {
                if let Some(n) = self.node_mut(old_tail) {
                    n.next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
        idx
    }

    /// Unlink a slot and return its value.
    pub(crate) fn remove(&mut self, idx: SlotId) -> Option<T> {
        let node = self.slots.get_mut(idx.0 as usize)?.take()?;
        self.link(node.prev, node.next);
        self.free.push(idx.0);
        self.len -= 1;
        Some(node.value)
    }

    /// Remove and return the least-recently-used value.
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.remove(head)
    }

    /// Move an existing slot to the most-recently-used end.
    pub(crate) fn move_to_back(&mut self, idx: SlotId) {
        if self.tail == Some(idx) {
            return;
        }
        let Some((prev, next)) = self.node(idx).map(|n| (n.prev, n.next)) else {
            return;
        };

        self.link(prev, next);

        let old_tail = self.tail;
        if let Some(t) = old_tail {
            if let Some(n) = self.node_mut(t) {
                n.next = Some(idx);
            }
        }
        if let Some(n) = self.node_mut(idx) {
            n.prev = old_tail;
            n.next = None;
        }
        self.tail = Some(idx);
    }

    pub(crate) fn get(&self, idx: SlotId) -> Option<&T> {
        self.node(idx).map(|n| &n.value)
    }

    pub(crate) fn get_mut(&mut self, idx: SlotId) -> Option<&mut T> {
        self.node_mut(idx).map(|n| &mut n.value)
    }

    /// Iterate from least to most recently used.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            current: self.head,
        }
    }

    /// Drop every slot and release the slab's capacity.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.head = None;
        self.tail = None;
        self.len = 0;
        self.free.clear();
        self.free.shrink_to_fit();
        self.slots.drain(..).flatten().map(|n| n.value)
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
    }

    /// Join `prev` and `next` around a slot that is being unlinked.
    fn link(&mut self, prev: Option<SlotId>, next: Option<SlotId>) {
        match prev {
            Some(p) => {
                if let Some(n) = self.node_mut(p) {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.node_mut(nx) {
                    n.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    #[inline]
    fn node(&self, idx: SlotId) -> Option<&Node<T>> {
        self.slots.get(idx.0 as usize)?.as_ref()
    }

    #[inline]
    fn node_mut(&mut self, idx: SlotId) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx.0 as usize)?.as_mut()
    }
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    current: Option<SlotId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SlotId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        let node = self.list.node(idx)?;
        self.current = node.next;
        Some((idx, &node.value))
    }
}
