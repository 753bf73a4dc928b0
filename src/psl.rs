//! PSL alignment input.
//!
//! Reads 21-column PSL text, applies the identity filter, strips zero-sized
//! blocks, splits records at long gaps and stores every surviving fragment
//! together with its symmetric inverse. Sequence names are interned into the
//! concatenated axis on first sight, which happens as soon as a line passes
//! the identity filter even when splitting later drops every fragment.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{AlignmentRecord, AlignmentSet, RecordError, Strand};
use crate::species::SequenceSpace;

/// Number of tab-separated fields in a PSL line.
pub const PSL_COLUMNS: usize = 21;

/// Input filters applied while reading PSL lines.
#[derive(Debug, Clone)]
pub struct PslOptions {
    /// Maximum gap length inside an alignment before it is split in two.
    pub max_gap: u64,
    /// Fragments with a target span this short or shorter are dropped.
    pub min_aln_length: u64,
    /// Minimum identity fraction an alignment must reach to be considered.
    pub min_identity: f32,
    /// Drop alignments whose query and target spans coincide.
    pub drop_self_alignments: bool,
}

impl Default for PslOptions {
    fn default() -> Self {
        Self {
            max_gap: 13,
            min_aln_length: 13,
            min_identity: 0.8,
            drop_self_alignments: false,
        }
    }
}

/// Errors raised while reading PSL input.
#[derive(Debug, Error)]
pub enum PslError {
    /// The input could not be read.
    #[error("{path}: {source}")]
    Io {
        /// Offending input.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A line did not carry exactly 21 fields.
    #[error("{path}:{line}: expected {PSL_COLUMNS} tab-separated fields, found {found}")]
    ColumnCount {
        /// Offending input.
        path: String,
        /// 1-based line number.
        line: u64,
        /// Number of fields found.
        found: usize,
    },
    /// A numeric field failed to parse.
    #[error("{path}:{line}: invalid number in field {field}: {value:?}")]
    InvalidNumber {
        /// Offending input.
        path: String,
        /// 1-based line number.
        line: u64,
        /// PSL field name.
        field: &'static str,
        /// Raw field content.
        value: String,
    },
    /// The strand field held something other than `+` or `-`.
    #[error("{path}:{line}: invalid strand {value:?}")]
    InvalidStrand {
        /// Offending input.
        path: String,
        /// 1-based line number.
        line: u64,
        /// Raw field content.
        value: String,
    },
    /// The block lists disagree with the declared block count.
    #[error("{path}:{line}: block lists hold {found} entries, blockCount says {expected}")]
    BlockMismatch {
        /// Offending input.
        path: String,
        /// 1-based line number.
        line: u64,
        /// Declared block count.
        expected: usize,
        /// Entries actually present.
        found: usize,
    },
    /// A block lies outside the record's declared spans.
    #[error("{path}:{line}: block coordinates fall outside the alignment span")]
    BlockOutOfRange {
        /// Offending input.
        path: String,
        /// 1-based line number.
        line: u64,
    },
    /// A record could not be represented in memory.
    #[error("{path}:{line}: {source}")]
    Record {
        /// Offending input.
        path: String,
        /// 1-based line number.
        line: u64,
        /// Underlying record error.
        source: RecordError,
    },
}

/// One parsed PSL record in global coordinates, before narrowing.
#[derive(Debug, Clone)]
struct RawRecord {
    strand: Strand,
    q_start: u64,
    q_end: u64,
    t_start: u64,
    t_end: u64,
    sizes: Vec<u32>,
    q_starts: Vec<u64>,
    t_starts: Vec<u64>,
}

impl RawRecord {
    fn size(&self, i: usize) -> u64 {
        u64::from(self.sizes[i])
    }

    fn length(&self) -> u64 {
        self.t_end - self.t_start
    }

    fn is_self_alignment(&self) -> bool {
        self.t_start == self.q_start && self.t_end == self.q_end
    }

    /// Sub-record spanning blocks `start..=end`.
    fn cut(&self, start: usize, end: usize) -> RawRecord {
        if start == 0 && end == self.sizes.len() - 1 {
            return self.clone();
        }
        let t_start = self.t_starts[start];
        let t_end = self.t_starts[end] + self.size(end);
        let (q_start, q_end) = match self.strand {
            Strand::Forward => (self.q_starts[start], self.q_starts[end] + self.size(end)),
            Strand::Reverse => (self.q_starts[end] - self.size(end), self.q_starts[start]),
        };
        RawRecord {
            strand: self.strand,
            q_start,
            q_end,
            t_start,
            t_end,
            sizes: self.sizes[start..=end].to_vec(),
            q_starts: self.q_starts[start..=end].to_vec(),
            t_starts: self.t_starts[start..=end].to_vec(),
        }
    }
}

struct LineContext<'a> {
    path: &'a str,
    line: u64,
}

impl LineContext<'_> {
    fn number<T: FromStr>(&self, raw: &str, field: &'static str) -> Result<T, PslError> {
        raw.parse().map_err(|_| PslError::InvalidNumber {
            path: self.path.to_string(),
            line: self.line,
            field,
            value: raw.to_string(),
        })
    }

    fn number_list<T: FromStr>(&self, raw: &str, field: &'static str) -> Result<Vec<T>, PslError> {
        raw.split(',')
            .filter(|part| !part.is_empty())
            .map(|part| self.number(part, field))
            .collect()
    }
}

/// Parse every file in `paths`, appending to `species` and `set`.
pub fn parse_files(
    paths: &[PathBuf],
    options: &PslOptions,
    species: &mut SequenceSpace,
    set: &mut AlignmentSet,
) -> Result<(), PslError> {
    for path in paths {
        let path_display = path.display().to_string();
        let file = File::open(path).map_err(|source| PslError::Io {
            path: path_display.clone(),
            source,
        })?;
        debug!(path = %path_display, "reading alignments");
        parse_reader(BufReader::new(file), &path_display, options, species, set)?;
    }
    Ok(())
}

/// Parse one PSL stream, appending to `species` and `set`.
pub fn parse_reader<R: BufRead>(
    reader: R,
    path: &str,
    options: &PslOptions,
    species: &mut SequenceSpace,
    set: &mut AlignmentSet,
) -> Result<(), PslError> {
    for_each_record(reader, path, options, species, &mut |raw, line| {
        for piece in split_record(&raw, options) {
            let record = AlignmentRecord::new(
                piece.strand,
                piece.q_start,
                piece.q_end,
                piece.t_start,
                piece.t_end,
                &piece.sizes,
                &piece.q_starts,
                &piece.t_starts,
            )
            .map_err(|source| PslError::Record {
                path: path.to_string(),
                line,
                source,
            })?;
            set.push_pair(record).map_err(|source| PslError::Record {
                path: path.to_string(),
                line,
                source,
            })?;
        }
        Ok(())
    })
}

/// Scan inputs and report the maximum block size and maximum local block
/// start offset seen, for validating the narrow per-block storage width.
pub fn max_block_extent(
    paths: &[PathBuf],
    options: &PslOptions,
) -> Result<(u64, u64), PslError> {
    let mut species = SequenceSpace::new();
    let mut max_size = 0u64;
    let mut max_start = 0u64;
    for path in paths {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| PslError::Io {
            path: display.clone(),
            source,
        })?;
        for_each_record(
            BufReader::new(file),
            &display,
            options,
            &mut species,
            &mut |raw, _line| {
                for i in 0..raw.sizes.len() {
                    max_size = max_size.max(raw.size(i));
                    max_start = max_start
                        .max(raw.q_starts[i] - raw.q_start)
                        .max(raw.t_starts[i] - raw.t_start);
                }
                Ok(())
            },
        )?;
    }
    Ok((max_size, max_start))
}

/// Drive `consume` with every raw record that survives the line filters,
/// handing it the record and its 1-based line number.
fn for_each_record<R: BufRead>(
    reader: R,
    path: &str,
    options: &PslOptions,
    species: &mut SequenceSpace,
    consume: &mut dyn FnMut(RawRecord, u64) -> Result<(), PslError>,
) -> Result<(), PslError> {
    let mut zero_block_lines = 0u64;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| PslError::Io {
            path: path.to_string(),
            source,
        })?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ctx = LineContext {
            path,
            line: idx as u64 + 1,
        };
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != PSL_COLUMNS {
            return Err(PslError::ColumnCount {
                path: path.to_string(),
                line: ctx.line,
                found: fields.len(),
            });
        }
        let matches: u64 = ctx.number(fields[0], "matches")?;
        let mismatches: u64 = ctx.number(fields[1], "misMatches")?;
        let rep_matches: u64 = ctx.number(fields[2], "repMatches")?;
        let matched = matches + rep_matches;
        if matched == 0 {
            continue;
        }
        if (matched as f32) / ((matched + mismatches) as f32) < options.min_identity {
            continue;
        }
        let (raw, removed_blocks) = raw_record(&fields, species, &ctx)?;
        if removed_blocks > 0 {
            zero_block_lines += 1;
        }
        if raw.sizes.is_empty() {
            warn!(path = %ctx.path, line = ctx.line, "record contains only zero-sized blocks");
            continue;
        }
        if options.drop_self_alignments && raw.is_self_alignment() {
            continue;
        }
        consume(raw, ctx.line)?;
    }
    if zero_block_lines > 0 {
        warn!(path = %path, lines = zero_block_lines, "stripped zero-sized blocks");
    }
    Ok(())
}

/// Turn one PSL line into a raw record with concatenated-axis coordinates.
///
/// Registers both sequence names in `species`. Returns the record plus the
/// number of zero-sized blocks stripped from it. On the reverse strand the
/// per-block query starts are rewritten so that each denotes the block's
/// end + 1 in forward query orientation.
fn raw_record(
    fields: &[&str],
    species: &mut SequenceSpace,
    ctx: &LineContext,
) -> Result<(RawRecord, usize), PslError> {
    let strand = match fields[8].chars().next() {
        Some('+') => Strand::Forward,
        Some('-') => Strand::Reverse,
        _ => {
            return Err(PslError::InvalidStrand {
                path: ctx.path.to_string(),
                line: ctx.line,
                value: fields[8].to_string(),
            })
        }
    };
    let q_name = fields[9];
    let t_name = fields[13];
    let q_size: u64 = ctx.number(fields[10], "qSize")?;
    let t_size: u64 = ctx.number(fields[14], "tSize")?;
    let q_offset = species.intern(q_name, q_size);
    let t_offset = species.intern(t_name, t_size);

    let q_start = ctx.number::<u64>(fields[11], "qStart")? + q_offset;
    let q_end = ctx.number::<u64>(fields[12], "qEnd")? + q_offset;
    let t_start = ctx.number::<u64>(fields[15], "tStart")? + t_offset;
    let t_end = ctx.number::<u64>(fields[16], "tEnd")? + t_offset;

    let block_count: usize = ctx.number(fields[17], "blockCount")?;
    let mut sizes: Vec<u32> = ctx.number_list(fields[18], "blockSizes")?;
    let mut q_starts: Vec<u64> = ctx.number_list(fields[19], "qStarts")?;
    let mut t_starts: Vec<u64> = ctx.number_list(fields[20], "tStarts")?;
    if sizes.len() != block_count || q_starts.len() != block_count || t_starts.len() != block_count
    {
        return Err(PslError::BlockMismatch {
            path: ctx.path.to_string(),
            line: ctx.line,
            expected: block_count,
            found: sizes.len().min(q_starts.len()).min(t_starts.len()),
        });
    }

    // strip zero-sized blocks in place
    let mut kept = 0usize;
    for i in 0..sizes.len() {
        if sizes[i] == 0 {
            continue;
        }
        sizes[kept] = sizes[i];
        q_starts[kept] = q_starts[i];
        t_starts[kept] = t_starts[i];
        kept += 1;
    }
    let removed = sizes.len() - kept;
    sizes.truncate(kept);
    q_starts.truncate(kept);
    t_starts.truncate(kept);

    match strand {
        Strand::Forward => {
            for q in &mut q_starts {
                *q += q_offset;
            }
        }
        Strand::Reverse => {
            // rewrite reverse-complement starts as forward block ends + 1
            for q in &mut q_starts {
                *q = q_size.checked_sub(*q).ok_or(PslError::BlockOutOfRange {
                    path: ctx.path.to_string(),
                    line: ctx.line,
                })? + q_offset;
            }
        }
    }
    for t in &mut t_starts {
        *t += t_offset;
    }

    let raw = RawRecord {
        strand,
        q_start,
        q_end,
        t_start,
        t_end,
        sizes,
        q_starts,
        t_starts,
    };
    for i in 0..raw.sizes.len() {
        let size = raw.size(i);
        let t_ok = raw.t_starts[i] >= raw.t_start && raw.t_starts[i] + size <= raw.t_end;
        let q_ok = match raw.strand {
            Strand::Forward => {
                raw.q_starts[i] >= raw.q_start && raw.q_starts[i] + size <= raw.q_end
            }
            Strand::Reverse => {
                raw.q_starts[i] <= raw.q_end && raw.q_starts[i] >= raw.q_start + size
            }
        };
        if !t_ok || !q_ok {
            return Err(PslError::BlockOutOfRange {
                path: ctx.path.to_string(),
                line: ctx.line,
            });
        }
    }

    Ok((raw, removed))
}

/// Split a record at every gap longer than `max_gap` on either side and drop
/// fragments whose target span does not exceed `min_aln_length`.
fn split_record(raw: &RawRecord, options: &PslOptions) -> Vec<RawRecord> {
    let mut pieces: Vec<RawRecord> = Vec::new();
    let n = raw.sizes.len();
    let mut start = 0usize;
    for i in 0..n.saturating_sub(1) {
        let target_gap = raw.t_starts[i + 1] > raw.t_starts[i] + raw.size(i) + options.max_gap;
        let query_gap = match raw.strand {
            Strand::Forward => {
                raw.q_starts[i + 1] > raw.q_starts[i] + raw.size(i) + options.max_gap
            }
            Strand::Reverse => {
                raw.q_starts[i] > raw.q_starts[i + 1] + raw.size(i) + options.max_gap
            }
        };
        if target_gap || query_gap {
            pieces.push(raw.cut(start, i));
            start = i + 1;
        }
    }
    pieces.push(raw.cut(start, n - 1));
    pieces.retain(|piece| piece.length() > options.min_aln_length);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::too_many_arguments)]
    fn psl_line(
        matches: u64,
        mismatches: u64,
        strand: char,
        q_name: &str,
        q_size: u64,
        q_span: (u64, u64),
        t_name: &str,
        t_size: u64,
        t_span: (u64, u64),
        blocks: &[(u32, u64, u64)],
    ) -> String {
        let sizes: String = blocks.iter().map(|b| format!("{},", b.0)).collect();
        let q_starts: String = blocks.iter().map(|b| format!("{},", b.1)).collect();
        let t_starts: String = blocks.iter().map(|b| format!("{},", b.2)).collect();
        format!(
            "{matches}\t{mismatches}\t0\t0\t0\t0\t0\t0\t{strand}\t{q_name}\t{q_size}\t{}\t{}\t{t_name}\t{t_size}\t{}\t{}\t{}\t{sizes}\t{q_starts}\t{t_starts}",
            q_span.0,
            q_span.1,
            t_span.0,
            t_span.1,
            blocks.len(),
        )
    }

    fn parse(input: &str, options: &PslOptions) -> (SequenceSpace, AlignmentSet) {
        let mut species = SequenceSpace::new();
        let mut set = AlignmentSet::new();
        parse_reader(input.as_bytes(), "test.psl", options, &mut species, &mut set)
            .expect("parse succeeds");
        (species, set)
    }

    #[test]
    fn forward_line_becomes_a_linked_pair() {
        let line = psl_line(
            40, 0, '+', "A", 100, (10, 50), "B", 100, (20, 60),
            &[(40, 10, 20)],
        );
        let (species, set) = parse(&line, &PslOptions::default());
        assert_eq!(species.offset("A"), Some(0));
        assert_eq!(species.offset("B"), Some(100));
        assert_eq!(set.len(), 2);
        let record = &set[0];
        assert_eq!(record.t_start, 120);
        assert_eq!(record.t_end, 160);
        assert_eq!(record.q_start, 10);
        assert_eq!(record.q_end, 50);
        assert_eq!(set[record.sym()].t_start, 10);
        assert_eq!(set[record.sym()].sym(), 0);
    }

    #[test]
    fn reverse_strand_query_starts_become_forward_block_ends() {
        // reverse-coordinate start 50 denotes the forward block [10, 50)
        let line = psl_line(
            40, 0, '-', "A", 100, (10, 50), "B", 100, (20, 60),
            &[(40, 50, 20)],
        );
        let (_species, set) = parse(&line, &PslOptions::default());
        let record = &set[0];
        assert_eq!(record.q_start_at(0), 50);
        assert_eq!(record.map_breakpoint(120), 50);
        assert_eq!(record.map_breakpoint(160), 10);
    }

    #[test]
    fn low_identity_lines_are_filtered_before_interning() {
        let line = psl_line(
            50, 50, '+', "A", 100, (0, 100), "B", 100, (0, 100),
            &[(100, 0, 0)],
        );
        let (species, set) = parse(&line, &PslOptions::default());
        assert!(set.is_empty());
        assert!(species.is_empty());
    }

    #[test]
    fn zero_match_lines_are_skipped() {
        let line = psl_line(
            0, 0, '+', "A", 100, (0, 100), "B", 100, (0, 100),
            &[(100, 0, 0)],
        );
        let (_species, set) = parse(&line, &PslOptions::default());
        assert!(set.is_empty());
    }

    #[test]
    fn short_fragments_drop_but_species_remain() {
        let line = psl_line(
            5, 0, '+', "A", 100, (0, 5), "B", 100, (0, 5),
            &[(5, 0, 0)],
        );
        let (species, set) = parse(&line, &PslOptions::default());
        assert!(set.is_empty(), "5 bp fragment is below min_aln_length");
        assert_eq!(species.len(), 2);
        assert_eq!(species.total(), 200);
    }

    #[test]
    fn long_gaps_split_the_record() {
        let line = psl_line(
            180, 0, '+', "Q", 250, (0, 200), "T", 250, (0, 200),
            &[(90, 0, 0), (90, 110, 110)],
        );
        let (_species, set) = parse(&line, &PslOptions::default());
        // two fragments, each with its symmetric inverse
        assert_eq!(set.len(), 4);
        assert_eq!(set[0].t_start, 250);
        assert_eq!(set[0].t_end, 340);
        assert_eq!(set[2].t_start, 360);
        assert_eq!(set[2].t_end, 450);
    }

    #[test]
    fn zero_sized_blocks_are_stripped() {
        let line = psl_line(
            80, 0, '+', "Q", 250, (0, 85), "T", 250, (0, 85),
            &[(40, 0, 0), (0, 40, 40), (45, 40, 40)],
        );
        let (_species, set) = parse(&line, &PslOptions::default());
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].block_count(), 2);
    }

    #[test]
    fn self_alignments_drop_only_when_asked() {
        let line = psl_line(
            100, 0, '+', "A", 100, (0, 100), "A", 100, (0, 100),
            &[(100, 0, 0)],
        );
        let (_species, set) = parse(&line, &PslOptions::default());
        assert_eq!(set.len(), 2, "self alignments are kept by default");

        let options = PslOptions {
            drop_self_alignments: true,
            ..PslOptions::default()
        };
        let (species, set) = parse(&line, &options);
        assert!(set.is_empty());
        assert_eq!(species.len(), 1, "the sequence itself is still registered");
    }

    #[test]
    fn wrong_column_count_is_fatal() {
        let mut species = SequenceSpace::new();
        let mut set = AlignmentSet::new();
        let err = parse_reader(
            "1\t2\t3\n".as_bytes(),
            "test.psl",
            &PslOptions::default(),
            &mut species,
            &mut set,
        )
        .expect_err("malformed line");
        assert!(matches!(err, PslError::ColumnCount { line: 1, .. }));
    }

    #[test]
    fn unparseable_numbers_are_fatal() {
        let line = psl_line(
            40, 0, '+', "A", 100, (10, 50), "B", 100, (20, 60),
            &[(40, 10, 20)],
        )
        .replace("\t100\t", "\tnot-a-number\t");
        let mut species = SequenceSpace::new();
        let mut set = AlignmentSet::new();
        let err = parse_reader(
            line.as_bytes(),
            "test.psl",
            &PslOptions::default(),
            &mut species,
            &mut set,
        )
        .expect_err("bad number");
        assert!(matches!(err, PslError::InvalidNumber { .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let body = psl_line(
            40, 0, '+', "A", 100, (10, 50), "B", 100, (20, 60),
            &[(40, 10, 20)],
        );
        let input = format!("# a comment\n\n{body}\n");
        let (_species, set) = parse(&input, &PslOptions::default());
        assert_eq!(set.len(), 2);
    }
}
