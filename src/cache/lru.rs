//! LRU List Module
//!
//! Recency ordering for cache eviction, stored as a doubly linked list whose
//! nodes live in a slot arena and link to each other by index.
//!
//! ```text
//!   head (most recent) ─► [3] ◄──► [0] ◄──► [2] ◄── tail (least recent)
//! ```
//!
//! Freed slots are recycled, so a `NodeId` is only meaningful while its node
//! is still in the list.

// == Node Id ==
/// Handle to a node in an [`LruList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

// == LRU List ==
/// Access-ordered list with O(1) insert, promote, remove and evict.
///
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug)]
pub struct LruList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<T> LruList<T> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts `value` as the most recently used node.
    pub fn push_front(&mut self, value: T) -> NodeId {
        let node = Node {
            value,
            prev: None,
            next: self.head,
        };
        let id = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                NodeId(idx)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };

        match self.head {
            Some(old_head) => {
                if let Some(node) = self.node_mut(old_head) {
                    node.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
        id
    }

    // == Touch ==
    /// Marks a node as recently used (moves it to the front).
    ///
    /// Returns false if `id` is not in the list.
    pub fn touch(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.head == Some(id) {
            return true;
        }
        self.detach(id);

        let old_head = self.head;
        if let Some(node) = self.node_mut(id) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(old_head) => {
                if let Some(node) = self.node_mut(old_head) {
                    node.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        true
    }

    // == Remove ==
    /// Unlinks a node and returns its value.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        self.detach(id);
        let node = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some(node.value)
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used value.
    ///
    /// Returns None if the list is empty.
    pub fn evict_oldest(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(tail)
    }

    // == Peek Oldest ==
    /// Returns the least recently used value without removing it.
    pub fn peek_oldest(&self) -> Option<&T> {
        self.tail.and_then(|id| self.get(id))
    }

    /// Returns the value stored at `id`.
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.node(id).map(|node| &node.value)
    }

    /// Returns a mutable reference to the value stored at `id`.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id).map(|node| &mut node.value)
    }

    /// Iterates from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            current: self.head,
        }
    }

    // == Length ==
    /// Returns the number of nodes in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Contains ==
    /// Checks if `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Unlinks `id` from its neighbours; the node itself stays allocated.
    fn detach(&mut self, id: NodeId) {
        let (prev, next) = match self.node(id) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev) => {
                if let Some(node) = self.node_mut(prev) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(node) = self.node_mut(next) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

// == Iterator ==
/// Front-to-back iterator over an [`LruList`].
pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    current: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.list.node(id)?;
        self.current = node.next;
        Some((id, &node.value))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn order<T: Clone>(list: &LruList<T>) -> Vec<T> {
        list.iter().map(|(_, v)| v.clone()).collect()
    }

    #[test]
    fn test_lru_new() {
        let lru: LruList<&str> = LruList::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_lru_push_front_order() {
        let mut lru = LruList::new();

        lru.push_front("key1");
        lru.push_front("key2");
        lru.push_front("key3");

        assert_eq!(lru.len(), 3);
        // key1 is oldest (added first)
        assert_eq!(lru.peek_oldest(), Some(&"key1"));
        assert_eq!(order(&lru), vec!["key3", "key2", "key1"]);
    }

    #[test]
    fn test_lru_touch_existing() {
        let mut lru = LruList::new();

        let a = lru.push_front("key1");
        lru.push_front("key2");
        lru.push_front("key3");

        assert!(lru.touch(a));

        assert_eq!(lru.len(), 3);
        // key2 is now oldest
        assert_eq!(lru.peek_oldest(), Some(&"key2"));
        assert_eq!(order(&lru), vec!["key1", "key3", "key2"]);
    }

    #[test]
    fn test_lru_touch_head_and_tail() {
        let mut lru = LruList::new();
        let a = lru.push_front("a");
        let b = lru.push_front("b");

        assert!(lru.touch(b));
        assert_eq!(order(&lru), vec!["b", "a"]);

        assert!(lru.touch(a));
        assert_eq!(order(&lru), vec!["a", "b"]);
        assert_eq!(lru.peek_oldest(), Some(&"b"));
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = LruList::new();

        lru.push_front("key1");
        lru.push_front("key2");
        lru.push_front("key3");

        assert_eq!(lru.evict_oldest(), Some("key1"));
        assert_eq!(lru.len(), 2);

        assert_eq!(lru.evict_oldest(), Some("key2"));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_evict_empty() {
        let mut lru: LruList<u8> = LruList::new();
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove_middle() {
        let mut lru = LruList::new();

        lru.push_front("key1");
        let b = lru.push_front("key2");
        lru.push_front("key3");

        assert_eq!(lru.remove(b), Some("key2"));

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(b));
        assert_eq!(order(&lru), vec!["key3", "key1"]);
    }

    #[test]
    fn test_lru_remove_stale_id() {
        let mut lru = LruList::new();
        let a = lru.push_front("a");
        lru.push_front("b");

        assert_eq!(lru.remove(a), Some("a"));
        // Removing again should not panic or affect existing nodes
        assert_eq!(lru.remove(a), None);
        assert!(!lru.touch(a));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_slot_reuse() {
        let mut lru = LruList::new();
        let a = lru.push_front("a");
        lru.push_front("b");
        lru.remove(a);

        let c = lru.push_front("c");
        assert_eq!(c, a, "freed slot should be recycled");
        assert_eq!(order(&lru), vec!["c", "b"]);
        assert_eq!(lru.peek_oldest(), Some(&"b"));
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruList::new();

        let a = lru.push_front("a");
        let b = lru.push_front("b");
        let c = lru.push_front("c");

        // [c, b, a] -> touch a -> [a, c, b] -> touch c -> [c, a, b] -> touch b -> [b, c, a]
        lru.touch(a);
        lru.touch(c);
        lru.touch(b);

        assert_eq!(lru.evict_oldest(), Some("a"));
        assert_eq!(lru.evict_oldest(), Some("c"));
        assert_eq!(lru.evict_oldest(), Some("b"));
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruList::new();
        let a = lru.push_front(1);
        lru.push_front(2);

        lru.clear();

        assert!(lru.is_empty());
        assert!(!lru.contains(a));
        assert_eq!(lru.iter().count(), 0);
    }

    #[test]
    fn test_lru_get_mut() {
        let mut lru = LruList::new();
        let a = lru.push_front(1);
        if let Some(v) = lru.get_mut(a) {
            *v = 10;
        }
        assert_eq!(lru.get(a), Some(&10));
    }
}
