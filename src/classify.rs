//! Atom classification.
//!
//! Atoms aligned to one another are linked into an undirected graph whose
//! edge weights accumulate the strand signs of the supporting alignments.
//! Connected components become classes; the sign assigned to each atom
//! records its orientation relative to the component root.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::index::BucketIndex;
use crate::model::{find_waste_slot, AlignmentSet, Region, WasteRegion};

/// Errors raised while classifying atoms.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// At least two waste regions are needed to form one atom.
    #[error("need at least two waste regions to classify atoms, got {0}")]
    TooFewRegions(usize),
    /// A mapped region overlapped none of the candidate atoms.
    #[error("graph construction failed: a mapped region overlaps no atom")]
    NoOverlap,
    /// An atom was reached with contradictory orientations.
    #[error("strand conflict on atom {atom}: labeled {found}, expected {expected}")]
    StrandConflict {
        /// Index of the conflicting atom.
        atom: usize,
        /// Class sign the atom already carries.
        found: i32,
        /// Class sign the current traversal expected.
        expected: i32,
    },
}

/// Fraction of `atom` covered by the interval `[start, end]`.
///
/// Negative when the interval lies outside the atom entirely.
pub fn coverage(atom: Region, start: u64, end: u64) -> f32 {
    let length = (atom.length() - 1).max(1);
    let last_start = atom.first.max(start);
    let first_end = atom.last.min(end);
    (first_end as i64 - last_start as i64) as f32 / length as f32
}

/// Pick the atom within `[slot_first, slot_last)` with the largest overlap
/// against `mapped`; zero overlap everywhere is a fatal error.
fn choose_atom(
    waste: &[WasteRegion],
    mapped: Region,
    slot_first: usize,
    slot_last: usize,
) -> Result<(Region, usize), ClassifyError> {
    let mut best_slot = 0usize;
    let mut best_len = 0i64;
    for j in slot_first..slot_last {
        let len = if j == slot_first {
            waste[j + 1].first as i64 - mapped.first as i64
        } else if j + 1 != slot_last {
            waste[j + 1].first as i64 - waste[j].last as i64 + 1
        } else if waste[j + 1].last < mapped.last {
            (mapped.last - waste[j + 1].last) as i64
        } else {
            0
        };
        if len > best_len {
            best_len = len;
            best_slot = j;
        }
    }
    if best_len == 0 {
        return Err(ClassifyError::NoOverlap);
    }
    Ok((
        Region::new(waste[best_slot].last, waste[best_slot + 1].first),
        best_slot,
    ))
}

/// Build the weighted atom adjacency graph.
fn build_graph(
    waste: &[WasteRegion],
    set: &AlignmentSet,
    index: &BucketIndex,
    min_coverage: f32,
) -> Result<Vec<BTreeMap<usize, i32>>, ClassifyError> {
    let atom_count = waste.len() - 1;
    let last_slot = waste.len() - 2;
    let mut graph: Vec<BTreeMap<usize, i32>> = vec![BTreeMap::new(); atom_count];
    for i in 0..atom_count {
        let atom = Region::new(waste[i].last, waste[i + 1].first);
        for &id in index.covering(atom.middle()) {
            let aln = &set[id];
            if !aln.covers(atom) {
                continue;
            }
            let mapped = aln.map_region(atom);
            let slot_first = find_waste_slot(waste, mapped.first).min(last_slot);
            let slot_last = find_waste_slot(waste, mapped.last).min(last_slot);
            let (other, j) = if slot_first == slot_last {
                (
                    Region::new(waste[slot_first].last, waste[slot_first + 1].first),
                    slot_first,
                )
            } else if slot_first == slot_last - 1 && mapped.last <= waste[slot_last].last {
                (
                    Region::new(waste[slot_first].last, waste[slot_first + 1].first),
                    slot_first,
                )
            } else {
                choose_atom(waste, mapped, slot_first, slot_last)?
            };
            if coverage(other, aln.q_start, aln.q_end) < min_coverage {
                continue;
            }
            // degenerate images share no positive span with the chosen atom
            if coverage(other, mapped.first, mapped.last) <= 0.0 {
                continue;
            }
            if coverage(mapped, other.first, other.last) <= 0.0 {
                continue;
            }
            // both sides fully covered means the two atoms are the same image
            if coverage(other, aln.t_start, aln.t_end) >= min_coverage
                && coverage(atom, aln.q_start, aln.q_end) >= min_coverage
            {
                continue;
            }
            let sign = aln.strand.sign();
            *graph[i].entry(j).or_insert(0) += sign;
            *graph[j].entry(i).or_insert(0) += sign;
        }
    }
    Ok(graph)
}

/// Label one connected component, propagating orientation signs.
fn fill_component(
    graph: &[BTreeMap<usize, i32>],
    classes: &mut [i32],
    root: usize,
    class_nr: i32,
) -> Result<(), ClassifyError> {
    let mut stack = vec![(root, class_nr)];
    while let Some((node, expected)) = stack.pop() {
        if classes[node] != 0 {
            if classes[node] != expected {
                return Err(ClassifyError::StrandConflict {
                    atom: node,
                    found: classes[node],
                    expected,
                });
            }
            continue;
        }
        classes[node] = expected;
        for (&next, &weight) in &graph[node] {
            let sign = if weight < 0 { -expected } else { expected };
            stack.push((next, sign));
        }
    }
    Ok(())
}

/// Assign every atom a signed class number.
///
/// The absolute value identifies the connected component, the sign the
/// strand relative to the component root. Components are numbered in
/// ascending order of their smallest atom index.
pub fn classify(
    waste: &[WasteRegion],
    set: &AlignmentSet,
    index: &BucketIndex,
    min_coverage: f32,
) -> Result<(Vec<i32>, i32), ClassifyError> {
    if waste.len() < 2 {
        return Err(ClassifyError::TooFewRegions(waste.len()));
    }
    let graph = build_graph(waste, set, index, min_coverage)?;
    let mut classes = vec![0i32; waste.len() - 1];
    let mut class_nr = 0i32;
    for i in 0..classes.len() {
        if classes[i] == 0 {
            class_nr += 1;
            fill_component(&graph, &mut classes, i, class_nr)?;
        }
    }
    Ok((classes, class_nr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlignmentRecord, Strand};

    #[test]
    fn coverage_is_the_overlap_fraction() {
        let atom = Region::new(10, 50);
        assert_eq!(coverage(atom, 10, 50), 1.0);
        assert_eq!(coverage(atom, 10, 30), 0.5);
        assert!(coverage(atom, 60, 80) < 0.0);
        // single-position atoms avoid dividing by zero
        assert_eq!(coverage(Region::point(5), 5, 6), 0.0);
    }

    #[test]
    fn choose_atom_prefers_the_largest_overlap() {
        let waste = vec![
            WasteRegion::point(0),
            WasteRegion::point(30),
            WasteRegion::point(100),
            WasteRegion::point(120),
        ];
        // mapped spans slots 0..3; the middle atom (30, 100) overlaps most
        let (atom, slot) =
            choose_atom(&waste, Region::new(20, 110), 0, 3).expect("overlap exists");
        assert_eq!(slot, 1);
        assert_eq!(atom, Region::new(30, 100));
    }

    #[test]
    fn fill_component_propagates_signs() {
        let mut graph: Vec<BTreeMap<usize, i32>> = vec![BTreeMap::new(); 3];
        graph[0].insert(1, 1);
        graph[1].insert(0, 1);
        graph[1].insert(2, -2);
        graph[2].insert(1, -2);
        let mut classes = vec![0i32; 3];
        fill_component(&graph, &mut classes, 0, 1).expect("consistent component");
        assert_eq!(classes, vec![1, 1, -1]);
    }

    #[test]
    fn inconsistent_signs_are_a_strand_conflict() {
        // odd negative cycle: 0-1 positive, 1-2 positive, 0-2 negative
        let mut graph: Vec<BTreeMap<usize, i32>> = vec![BTreeMap::new(); 3];
        graph[0].insert(1, 1);
        graph[1].insert(0, 1);
        graph[1].insert(2, 1);
        graph[2].insert(1, 1);
        graph[0].insert(2, -1);
        graph[2].insert(0, -1);
        let mut classes = vec![0i32; 3];
        let err = fill_component(&graph, &mut classes, 0, 1).expect_err("conflict");
        assert!(matches!(err, ClassifyError::StrandConflict { .. }));
    }

    #[test]
    fn unaligned_atoms_get_distinct_classes() {
        let set = AlignmentSet::new();
        let index = BucketIndex::build(&set, 1000, 200);
        let waste = vec![
            WasteRegion::point(0),
            WasteRegion::point(100),
            WasteRegion::point(200),
        ];
        let (classes, count) = classify(&waste, &set, &index, 0.8).expect("classify succeeds");
        assert_eq!(classes, vec![1, 2]);
        assert_eq!(count, 2);
    }

    #[test]
    fn aligned_atoms_share_a_class_with_strand_sign() {
        let mut set = AlignmentSet::new();
        let record = AlignmentRecord::new(
            Strand::Reverse,
            10,
            50,
            120,
            160,
            &[40],
            &[50],
            &[120],
        )
        .expect("record builds");
        set.push_pair(record).expect("pair inserted");
        let index = BucketIndex::build(&set, 1000, 200);
        let waste = vec![
            WasteRegion::point(0),
            WasteRegion::point(10),
            WasteRegion::point(50),
            WasteRegion::point(100),
            WasteRegion::point(120),
            WasteRegion::point(160),
            WasteRegion::point(200),
        ];
        let (classes, count) = classify(&waste, &set, &index, 0.8).expect("classify succeeds");
        // atoms 1 and 4 are the aligned pair, on opposite strands
        assert_eq!(classes[1], -classes[4]);
        assert_eq!(classes[1].abs(), classes[4].abs());
        assert_eq!(count, 5);
    }

    #[test]
    fn too_few_regions_is_an_error() {
        let set = AlignmentSet::new();
        let index = BucketIndex::build(&set, 1000, 100);
        assert!(matches!(
            classify(&[WasteRegion::point(0)], &set, &index, 0.8),
            Err(ClassifyError::TooFewRegions(1))
        ));
    }
}
