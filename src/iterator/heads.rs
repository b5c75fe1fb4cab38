use std::collections::BTreeMap;

/// Sorted multimap from a child's current value to the children sitting on it.
#[derive(Debug, Clone)]
pub struct HeadMap<T> {
    heads: BTreeMap<T, Vec<usize>>,
}

impl<T: Ord + Clone> Default for HeadMap<T> {
    fn default() -> Self {
        Self {
            heads: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Clone> HeadMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: T, child: usize) {
        let children = self.heads.entry(key).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    /// Detach every child sitting on `key`
    pub fn remove_all(&mut self, key: &T) -> Vec<usize> {
        self.heads.remove(key).unwrap_or_default()
    }

    pub fn get(&self, key: &T) -> &[usize] {
        self.heads.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self) -> Option<&T> {
        self.heads.keys().next()
    }

    pub fn last(&self) -> Option<&T> {
        self.heads.keys().next_back()
    }

    /// Keys strictly below `bound`, ascending
    pub fn keys_below(&self, bound: &T) -> Vec<T> {
        self.heads.range(..bound).map(|(k, _)| k.clone()).collect()
    }

    pub fn contains(&self, key: &T) -> bool {
        self.heads.contains_key(key)
    }

    /// Every child index, in key order
    pub fn children(&self) -> impl Iterator<Item = usize> + '_ {
        self.heads.values().flatten().copied()
    }

    pub fn clear(&mut self) {
        self.heads.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.heads.len()
    }
}
