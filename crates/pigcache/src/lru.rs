//! Byte-bounded LRU (Least Recently Used) cache
//!
//! Uses an index-linked list for O(1) promotion and eviction. Capacity is
//! measured in bytes: every entry costs `key.len() + value.size()`.
//! Not synchronized; callers wrap it in a lock.

use std::collections::HashMap;

use ahash::RandomState;

/// A value that can report how many bytes it occupies
pub trait Value {
    /// Size of the value in bytes
    fn size(&self) -> usize;
}

impl Value for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }
}

impl Value for String {
    fn size(&self) -> usize {
        self.len()
    }
}

impl Value for bytes::Bytes {
    fn size(&self) -> usize {
        self.len()
    }
}

/// Invoked synchronously with every evicted entry
///
/// Must not call back into the cache that invoked it.
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Node in the LRU doubly-linked list
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU cache bounded by total entry bytes
///
/// `max_bytes == 0` means unbounded.
pub struct LruCache<V> {
    map: HashMap<String, usize, RandomState>,
    nodes: Vec<Option<Node<V>>>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    free_list: Vec<usize>,
    max_bytes: usize,
    used_bytes: usize,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: Value> LruCache<V> {
    /// Create a new LRU cache holding at most `max_bytes` bytes
    pub fn new(max_bytes: usize) -> Self {
        Self {
            map: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            head: None,
            tail: None,
            free_list: Vec::new(),
            max_bytes,
            used_bytes: 0,
            on_evicted: None,
        }
    }

    /// Create a cache that reports every eviction to `on_evicted`
    pub fn with_eviction_callback<F>(max_bytes: usize, on_evicted: F) -> Self
    where
        F: FnMut(&str, &V) + Send + 'static,
    {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(Box::new(on_evicted));
        cache
    }

    /// Look up a key, marking it most recently used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Insert or replace a value, then evict until within budget
    pub fn add(&mut self, key: &str, value: V) {
        if let Some(&idx) = self.map.get(key) {
            if let Some(node) = &mut self.nodes[idx] {
                let old_size = node.value.size();
                self.used_bytes = self.used_bytes - old_size + value.size();
                node.value = value;
            }
            self.move_to_front(idx);
        } else {
            self.used_bytes += key.len() + value.size();

            let idx = self.alloc_node();
            self.nodes[idx] = Some(Node {
                key: key.to_string(),
                value,
                prev: None,
                next: self.head,
            });

            if let Some(head_idx) = self.head {
                if let Some(head) = &mut self.nodes[head_idx] {
                    head.prev = Some(idx);
                }
            }

            self.head = Some(idx);
            if self.tail.is_none() {
                self.tail = Some(idx);
            }

            self.map.insert(key.to_string(), idx);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Remove the least recently used entry, if any
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let tail_idx = self.tail?;
        self.unlink(tail_idx);
        let node = self.nodes[tail_idx].take()?;
        self.free_node(tail_idx);
        self.map.remove(&node.key);
        self.used_bytes -= node.key.len() + node.value.size();

        if let Some(on_evicted) = &mut self.on_evicted {
            on_evicted(&node.key, &node.value);
        }

        Some((node.key, node.value))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bytes currently accounted to resident entries
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Byte budget (0 = unbounded)
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &self.nodes[idx] {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }
}
