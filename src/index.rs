//! Bucket index over the target axis.
//!
//! A fixed-width spatial index: bucket `k` holds every alignment whose target
//! span touches the slice `[k * B, (k + 1) * B)`. Built once after parsing and
//! read-only afterwards; the IMP loop and the classifier use it to find the
//! alignments covering an atom's midpoint.

use crate::model::{AlignmentSet, AlnId};

/// Read-only spatial index from target positions to alignment ids.
#[derive(Debug)]
pub struct BucketIndex {
    bucket_size: u64,
    buckets: Vec<Vec<AlnId>>,
}

impl BucketIndex {
    /// Build the index for a concatenated axis of `total_len` positions.
    pub fn build(set: &AlignmentSet, bucket_size: u64, total_len: u64) -> Self {
        let mut buckets = vec![Vec::new(); (total_len / bucket_size) as usize + 1];
        for (id, record) in set.iter().enumerate() {
            let first = (record.t_start / bucket_size) as usize;
            let last = (record.t_end / bucket_size) as usize;
            for bucket in &mut buckets[first..=last] {
                bucket.push(id as AlnId);
            }
        }
        Self {
            bucket_size,
            buckets,
        }
    }

    /// Ids of the alignments whose target span may contain `pos`.
    pub fn covering(&self, pos: u64) -> &[AlnId] {
        &self.buckets[(pos / self.bucket_size) as usize]
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Width of one bucket.
    pub fn bucket_size(&self) -> u64 {
        self.bucket_size
    }

    /// The dynamic program's cost for opening a new atom, chosen small enough
    /// to never outweigh merging two waste positions one coordinate apart.
    pub fn epsilon(&self) -> f64 {
        1.0 / (self.bucket_size as f64 * self.buckets.len() as f64)
    }
}
