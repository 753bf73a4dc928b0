//! Sequence name table for the concatenated coordinate axis.
//!
//! Every input sequence is assigned a start offset in a single virtual
//! sequence assembled left to right in first-seen order. The running total
//! length doubles as the end boundary of the axis.

use std::collections::HashMap;

/// One named input sequence placed on the concatenated axis.
#[derive(Debug, Clone)]
struct Sequence {
    name: String,
    start: u64,
}

/// First-seen registry of input sequences and their start offsets.
#[derive(Debug, Clone, Default)]
pub struct SequenceSpace {
    index: HashMap<String, usize>,
    seqs: Vec<Sequence>,
    total: u64,
}

impl SequenceSpace {
    /// Create an empty space of total length zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the start offset for `name`, registering it at the current end
    /// of the axis (and growing the axis by `size`) if it is new.
    pub fn intern(&mut self, name: &str, size: u64) -> u64 {
        if let Some(&idx) = self.index.get(name) {
            return self.seqs[idx].start;
        }
        let start = self.total;
        self.index.insert(name.to_string(), self.seqs.len());
        self.seqs.push(Sequence {
            name: name.to_string(),
            start,
        });
        self.total += size;
        start
    }

    /// Start offset of a known sequence.
    pub fn offset(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|&idx| self.seqs[idx].start)
    }

    /// Total length of the concatenated axis.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of registered sequences.
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    /// True when no sequence has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// All sequence boundaries: every start offset plus the total length.
    ///
    /// Sorted ascending; sequences are laid out in registration order, so the
    /// starts are already monotone.
    pub fn boundaries(&self) -> Vec<u64> {
        let mut bounds: Vec<u64> = self.seqs.iter().map(|s| s.start).collect();
        bounds.push(self.total);
        bounds
    }

    /// Locate the sequence owning `pos`, returning its name, start offset and
    /// end boundary (the next sequence's start, or the total length).
    pub fn locate(&self, pos: u64) -> Option<(&str, u64, u64)> {
        if self.seqs.is_empty() {
            return None;
        }
        let idx = self
            .seqs
            .partition_point(|s| s.start <= pos)
            .saturating_sub(1);
        let end = self
            .seqs
            .get(idx + 1)
            .map_or(self.total, |next| next.start);
        Some((self.seqs[idx].name.as_str(), self.seqs[idx].start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_assigns_offsets_in_first_seen_order() {
        let mut space = SequenceSpace::new();
        assert_eq!(space.intern("chrA", 100), 0);
        assert_eq!(space.intern("chrB", 50), 100);
        assert_eq!(space.intern("chrA", 100), 0, "re-interning keeps offset");
        assert_eq!(space.total(), 150);
        assert_eq!(space.len(), 2);
    }

    #[test]
    fn boundaries_include_total() {
        let mut space = SequenceSpace::new();
        space.intern("a", 10);
        space.intern("b", 20);
        assert_eq!(space.boundaries(), vec![0, 10, 30]);
    }

    #[test]
    fn locate_finds_owning_sequence() {
        let mut space = SequenceSpace::new();
        space.intern("a", 10);
        space.intern("b", 20);
        assert_eq!(space.locate(0), Some(("a", 0, 10)));
        assert_eq!(space.locate(9), Some(("a", 0, 10)));
        assert_eq!(space.locate(10), Some(("b", 10, 30)));
        assert_eq!(space.locate(29), Some(("b", 10, 30)));
    }

    #[test]
    fn locate_on_empty_space_is_none() {
        assert_eq!(SequenceSpace::new().locate(0), None);
    }
}
