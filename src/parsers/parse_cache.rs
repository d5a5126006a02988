//! Syntax tree caching for completion requests
//!
//! Every completion request needs a fresh parse of the current document text,
//! but consecutive requests (caret moves, Ctrl+Space after typing) very often
//! see identical text. Trees are keyed by file name and the blake3 hash of
//! the text; a hit is only returned when the frozen tree's own text matches.
//!
//! When full, the least recently touched tenth of the entries is evicted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::parsers::SyntaxTree;

struct Entry {
    tree: Arc<SyntaxTree>,
    last_used: AtomicU64,
}

pub struct ParseCache {
    entries: DashMap<(String, blake3::Hash), Entry>,
    clock: AtomicU64,
    max_size: usize,
}

impl ParseCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_size),
            clock: AtomicU64::new(0),
            max_size: max_size.max(1),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, path: &str, text: &str) -> Option<Arc<SyntaxTree>> {
        let key = (path.to_string(), blake3::hash(text.as_bytes()));
        let entry = self.entries.get(&key)?;
        if entry.tree.text() != text {
            return None;
        }
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.tree.clone())
    }

    pub fn insert(&self, path: &str, text: &str, tree: Arc<SyntaxTree>) {
        if self.entries.len() >= self.max_size {
            self.evict_oldest((self.max_size / 10).max(1));
        }
        let entry = Entry {
            tree,
            last_used: AtomicU64::new(self.tick()),
        };
        self.entries.insert((path.to_string(), blake3::hash(text.as_bytes())), entry);
    }

    fn evict_oldest(&self, count: usize) {
        let mut stamps: Vec<u64> = self
            .entries
            .iter()
            .map(|e| e.last_used.load(Ordering::Relaxed))
            .collect();
        stamps.sort_unstable();
        let Some(&cutoff) = stamps.get(count - 1) else {
            self.entries.clear();
            return;
        };
        self.entries.retain(|_, e| e.last_used.load(Ordering::Relaxed) > cutoff);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::SourceOutline;

    fn tree(path: &str, content: &str) -> Arc<SyntaxTree> {
        Arc::new(SyntaxTree::freeze(path, content, None, SourceOutline::default()))
    }

    #[test]
    fn test_hit_requires_same_path_and_text() {
        let cache = ParseCache::new(10);
        assert!(cache.get("a.cs", "class A {}").is_none());

        cache.insert("a.cs", "class A {}", tree("a.cs", "class A {}"));
        assert!(cache.get("a.cs", "class A {}").is_some());
        assert!(cache.get("b.cs", "class A {}").is_none());
        assert!(cache.get("a.cs", "class B {}").is_none());
    }

    #[test]
    fn test_full_cache_evicts_least_recently_used() {
        let cache = ParseCache::new(10);
        for i in 0..10 {
            let content = format!("class C{} {{}}", i);
            cache.insert("a.cs", &content, tree("a.cs", &content));
        }
        assert_eq!(cache.len(), 10);

        // C0 is the oldest insert, touch it so C1 becomes the eviction victim
        assert!(cache.get("a.cs", "class C0 {}").is_some());
        cache.insert("a.cs", "class Last {}", tree("a.cs", "class Last {}"));

        assert_eq!(cache.len(), 10);
        assert!(cache.get("a.cs", "class Last {}").is_some());
        assert!(cache.get("a.cs", "class C0 {}").is_some());
        assert!(cache.get("a.cs", "class C1 {}").is_none());
    }

    #[test]
    fn test_cache_clear() {
        let cache = ParseCache::default();
        cache.insert("a.cs", "x", tree("a.cs", "x"));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 64);
    }
}
