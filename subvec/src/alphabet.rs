use std::collections::HashMap;

/// A string interner that also counts how often each string was added.
///
/// Ids are dense: the `n` strings in the table have ids `0..n`, in order of
/// first insertion. Pruning keeps that order and renumbers the survivors so
/// there are no gaps, since every array derived from the table is indexed
/// by id.
#[derive(Clone, Debug)]
pub struct Alphabet {
    strings: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, usize>,
    capacity: usize,
}

impl Alphabet {
    pub fn new(capacity: usize) -> Self {
        Alphabet {
            strings: Vec::new(),
            counts: Vec::new(),
            index: HashMap::new(),
            capacity,
        }
    }

    /// A table that never fills up.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Count one more occurrence of `s`, adding it if it is new.
    ///
    /// Returns `None` when `s` is new and the table is full.
    pub fn add(&mut self, s: &str) -> Option<usize> {
        self.add_count(s, 1)
    }

    /// Add `count` occurrences of `s` at once.
    pub fn add_count(&mut self, s: &str, count: u64) -> Option<usize> {
        if let Some(&id) = self.index.get(s) {
            self.counts[id] += count;
            return Some(id);
        }
        if self.is_full() {
            return None;
        }
        let id = self.strings.len();
        self.strings.push(s.to_string());
        self.counts.push(count);
        self.index.insert(s.to_string(), id);
        Some(id)
    }

    pub fn id(&self, s: &str) -> Option<usize> {
        self.index.get(s).copied()
    }

    /// The string with the given id. Panics if `id` is out of range.
    pub fn string(&self, id: usize) -> &str {
        &self.strings[id]
    }

    pub fn count(&self, id: usize) -> u64 {
        self.counts[id]
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.strings.len() >= self.capacity
    }

    /// Remove every string counted fewer than `min_count` times.
    pub fn prune(&mut self, min_count: u64) {
        let strings = std::mem::take(&mut self.strings);
        let counts = std::mem::take(&mut self.counts);
        self.index.clear();
        for (s, count) in strings.into_iter().zip(counts) {
            if count >= min_count {
                self.index.insert(s.clone(), self.strings.len());
                self.strings.push(s);
                self.counts.push(count);
            }
        }
    }

    /// `(string, count)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.strings
            .iter()
            .map(String::as_str)
            .zip(self.counts.iter().copied())
    }
}
