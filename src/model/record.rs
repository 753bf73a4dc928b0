//! Alignment records, the shared arena and coordinate mapping.
//!
//! Each record keeps its per-block starts as narrow local offsets from the
//! record's own span start; the public accessors always speak global
//! coordinates. Every record is stored next to its symmetric inverse in an
//! [`AlignmentSet`] arena and refers to it by index, so the pair shares one
//! lifetime without an ownership cycle.

use thiserror::Error;

use crate::model::Region;

/// Index of a record inside an [`AlignmentSet`].
pub type AlnId = u32;

/// Orientation of the query relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    /// Query and target run in the same direction.
    Forward,
    /// Query runs against the target direction.
    Reverse,
}

impl Strand {
    /// PSL strand character.
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }

    /// Edge sign contributed to the atom graph.
    pub fn sign(self) -> i32 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

/// Errors raised while building alignment records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A block offset does not fit the narrow per-block representation.
    #[error("block offset {0} does not fit the narrow block representation")]
    OffsetTooLarge(u64),
    /// A block start precedes the record's span start.
    #[error("block start {0} lies before the record span")]
    BlockBeforeSpan(u64),
    /// A record must carry at least one block.
    #[error("alignment record without blocks")]
    NoBlocks,
}

/// In-memory form of one pairwise alignment.
///
/// Spans are inclusive-start, exclusive-end positions on the concatenated
/// axis. On the reverse strand the per-block query starts denote the
/// *end + 1* of each block in forward query orientation, so query
/// coordinates decrease with the block index.
#[derive(Debug, Clone)]
pub struct AlignmentRecord {
    /// Strand of the alignment.
    pub strand: Strand,
    /// Query span start.
    pub q_start: u64,
    /// Query span end (exclusive).
    pub q_end: u64,
    /// Target span start.
    pub t_start: u64,
    /// Target span end (exclusive).
    pub t_end: u64,
    block_sizes: Vec<u32>,
    q_starts: Vec<u32>,
    t_starts: Vec<u32>,
    sym: AlnId,
}

fn narrow(value: u64) -> Result<u32, RecordError> {
    u32::try_from(value).map_err(|_| RecordError::OffsetTooLarge(value))
}

impl AlignmentRecord {
    /// Build a record from global block coordinates.
    ///
    /// Block starts are narrowed to offsets from the record's span start;
    /// values that do not fit are a fatal input error.
    pub fn new(
        strand: Strand,
        q_start: u64,
        q_end: u64,
        t_start: u64,
        t_end: u64,
        block_sizes: &[u32],
        q_starts: &[u64],
        t_starts: &[u64],
    ) -> Result<Self, RecordError> {
        if block_sizes.is_empty() {
            return Err(RecordError::NoBlocks);
        }
        let q_local = q_starts
            .iter()
            .map(|&q| {
                let offset = q
                    .checked_sub(q_start)
                    .ok_or(RecordError::BlockBeforeSpan(q))?;
                narrow(offset)
            })
            .collect::<Result<Vec<u32>, _>>()?;
        let t_local = t_starts
            .iter()
            .map(|&t| {
                let offset = t
                    .checked_sub(t_start)
                    .ok_or(RecordError::BlockBeforeSpan(t))?;
                narrow(offset)
            })
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(Self {
            strand,
            q_start,
            q_end,
            t_start,
            t_end,
            block_sizes: block_sizes.to_vec(),
            q_starts: q_local,
            t_starts: t_local,
            sym: 0,
        })
    }

    /// Number of ungapped blocks.
    pub fn block_count(&self) -> usize {
        self.block_sizes.len()
    }

    /// Size of block `i`.
    pub fn block_size_at(&self, i: usize) -> u64 {
        u64::from(self.block_sizes[i])
    }

    /// Global query start of block `i` (block end + 1 on the reverse strand).
    pub fn q_start_at(&self, i: usize) -> u64 {
        self.q_start + u64::from(self.q_starts[i])
    }

    /// Global target start of block `i`.
    pub fn t_start_at(&self, i: usize) -> u64 {
        self.t_start + u64::from(self.t_starts[i])
    }

    /// Target span length.
    pub fn length(&self) -> u64 {
        self.t_end - self.t_start
    }

    /// Arena index of the symmetric inverse record.
    pub fn sym(&self) -> AlnId {
        self.sym
    }

    /// True when the target span encloses `region` entirely.
    pub fn covers(&self, region: Region) -> bool {
        self.t_start <= region.first && self.t_end >= region.last
    }

    /// Index of the rightmost block whose target start does not exceed `pos`,
    /// clamped to the first block.
    fn block_index(&self, pos: u64) -> usize {
        let base = self.t_start;
        self.t_starts
            .partition_point(|&off| base + u64::from(off) <= pos)
            .saturating_sub(1)
    }

    /// Map a target position into query coordinates.
    ///
    /// Positions inside a gap clamp to the nearest block boundary.
    pub fn map_breakpoint(&self, pos: u64) -> u64 {
        let i = self.block_index(pos);
        let dist = pos
            .saturating_sub(self.t_start_at(i))
            .min(self.block_size_at(i));
        match self.strand {
            Strand::Forward => self.q_start_at(i) + dist,
            Strand::Reverse => self.q_start_at(i) - dist,
        }
    }

    /// Map both endpoints of a target region into query space, normalized so
    /// that `first <= last`.
    pub fn map_region(&self, region: Region) -> Region {
        let a = self.map_breakpoint(region.first);
        let b = self.map_breakpoint(region.last);
        Region::new(a.min(b), a.max(b))
    }

    /// Compute the symmetric inverse: query and target swap roles.
    ///
    /// On the reverse strand block order is reversed and block-relative
    /// endpoints swap, keeping target starts monotone in the result.
    pub fn revert(&self) -> Result<Self, RecordError> {
        let n = self.block_count();
        let mut sizes = Vec::with_capacity(n);
        let mut q_starts = Vec::with_capacity(n);
        let mut t_starts = Vec::with_capacity(n);
        match self.strand {
            Strand::Forward => {
                for i in 0..n {
                    q_starts.push(self.t_start_at(i));
                    t_starts.push(self.q_start_at(i));
                    sizes.push(self.block_sizes[i]);
                }
            }
            Strand::Reverse => {
                for i in (0..n).rev() {
                    let forward_start = self
                        .q_start_at(i)
                        .checked_sub(self.block_size_at(i))
                        .ok_or(RecordError::BlockBeforeSpan(self.q_start_at(i)))?;
                    q_starts.push(self.t_start_at(i) + self.block_size_at(i));
                    t_starts.push(forward_start);
                    sizes.push(self.block_sizes[i]);
                }
            }
        }
        Self::new(
            self.strand,
            self.t_start,
            self.t_end,
            self.q_start,
            self.q_end,
            &sizes,
            &q_starts,
            &t_starts,
        )
    }
}

/// Arena owning every alignment record for the whole run.
///
/// Records are pushed in symmetric pairs and immutable afterwards; all other
/// stages refer to them by [`AlnId`].
#[derive(Debug, Default)]
pub struct AlignmentSet {
    records: Vec<AlignmentRecord>,
}

impl AlignmentSet {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` together with its computed symmetric inverse and link
    /// the two; returns both ids.
    pub fn push_pair(&mut self, mut record: AlignmentRecord) -> Result<(AlnId, AlnId), RecordError> {
        let mut inverse = record.revert()?;
        let id = self.records.len() as AlnId;
        record.sym = id + 1;
        inverse.sym = id;
        self.records.push(record);
        self.records.push(inverse);
        Ok((id, id + 1))
    }

    /// Number of stored records (symmetric inverses count separately).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record has been stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AlignmentRecord> {
        self.records.iter()
    }
}

impl std::ops::Index<AlnId> for AlignmentSet {
    type Output = AlignmentRecord;

    fn index(&self, id: AlnId) -> &AlignmentRecord {
        &self.records[id as usize]
    }
}
