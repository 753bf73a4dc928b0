//! Covering/non-covering partition and the new-waste dynamic program.
//!
//! Candidate intervals inside an atom fall into two camps: broad intervals
//! that swallow shorter ones ("covering") stand for wide alignment support
//! and must not fragment the atom, while short ("non-covering") intervals
//! are the potential sites of new waste. The dynamic program walks every
//! position of the non-covering intervals left to right and decides, per
//! position, whether to merge it into the previous waste run (paying the
//! distance) or to open a new atom in between (paying epsilon).

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Region;

/// Split sorted candidate intervals into covering and non-covering stacks.
///
/// Expects `input` sorted by the candidate ordering of [`Region`]. A region
/// becomes covering when it strictly encloses the covering interval accepted
/// before it, or when it starts at or before the latest non-covering one.
pub fn partition_covering(input: &[Region]) -> (Vec<Region>, Vec<Region>) {
    let mut covering: Vec<Region> = Vec::new();
    let mut not_covering: Vec<Region> = Vec::new();
    for &region in input {
        if covering
            .last()
            .map_or(false, |c| c.first >= region.first)
        {
            while covering
                .last()
                .map_or(false, |c| c.first >= region.first)
            {
                covering.pop();
            }
            covering.push(region);
        } else if not_covering
            .last()
            .map_or(false, |c| c.first >= region.first)
        {
            covering.push(region);
        } else {
            not_covering.push(region);
        }
    }
    (covering, not_covering)
}

/// Per-position state of the dynamic program.
#[derive(Debug, Default)]
struct DpPosition {
    cost: f64,
    dist: bool,
    prev: u64,
    covering_ids: Vec<usize>,
    not_covering_ids: Vec<usize>,
}

/// One candidate transition considered by [`find_optimal`].
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    dist: bool,
    prev: u64,
}

/// Compute the cheapest transition into `pos` from any position of the
/// closest finished non-covering interval to its left.
///
/// Positions closer than `min_length` merge unconditionally. Otherwise a
/// shared interval id between the two positions means they are aligned to
/// the same waste and still merge; without one, a new atom opens for the
/// epsilon cost. On cost ties the rightmost predecessor wins.
fn find_optimal(
    closest_left: Region,
    positions: &mut BTreeMap<u64, DpPosition>,
    pos: u64,
    epsilon: f64,
    min_length: u64,
) {
    let mut candidates: Vec<Candidate> = Vec::new();
    {
        let here = &positions[&pos];
        for l in closest_left.first..=closest_left.last {
            let left = &positions[&l];
            if pos - l < min_length {
                candidates.push(Candidate {
                    cost: left.cost + (pos - l) as f64,
                    dist: true,
                    prev: l,
                });
                continue;
            }
            let shares_short = left
                .not_covering_ids
                .iter()
                .any(|id| here.not_covering_ids.contains(id));
            candidates.push(if shares_short {
                Candidate {
                    cost: left.cost + (pos - l) as f64,
                    dist: true,
                    prev: l,
                }
            } else {
                Candidate {
                    cost: left.cost + epsilon,
                    dist: false,
                    prev: l,
                }
            });
            let shares_long = left
                .covering_ids
                .iter()
                .any(|id| here.covering_ids.contains(id));
            candidates.push(if shares_long {
                Candidate {
                    cost: left.cost + (pos - l) as f64,
                    dist: true,
                    prev: l,
                }
            } else {
                Candidate {
                    cost: left.cost + epsilon,
                    dist: false,
                    prev: l,
                }
            });
        }
    }
    let mut best = match candidates.last() {
        Some(&candidate) => candidate,
        None => return,
    };
    for candidate in candidates.iter().rev().skip(1) {
        if candidate.cost < best.cost {
            best = *candidate;
        }
    }
    if let Some(entry) = positions.get_mut(&pos) {
        entry.cost = best.cost;
        entry.dist = best.dist;
        entry.prev = best.prev;
    }
}

/// Recover the optimal waste placement by walking `prev` links backward from
/// the rightmost position.
///
/// A step whose `dist` flag is set merged with its predecessor, so the
/// currently open region extends leftward; otherwise a fresh region starts.
fn trace_back(
    positions: &BTreeMap<u64, DpPosition>,
    last_pos: u64,
    atom_first: u64,
) -> Vec<Region> {
    let mut result: Vec<Region> = Vec::new();
    let mut current = match positions.get(&last_pos) {
        Some(data) => data.prev,
        None => return result,
    };
    let mut carry = false;
    while current >= atom_first {
        let data = match positions.get(&current) {
            Some(data) => data,
            None => break,
        };
        if !result.is_empty() && carry {
            let tail = result.len() - 1;
            result[tail].first = current;
        } else {
            result.push(Region::point(current));
        }
        carry = data.dist;
        if current == 0 {
            break;
        }
        current = data.prev;
    }
    result
}

/// Run the dynamic program over the partitioned candidate intervals and
/// return the new waste regions for this atom.
pub fn create_new_waste(
    not_covering: &[Region],
    covering: &[Region],
    epsilon: f64,
    min_length: u64,
    atom_first: u64,
) -> Vec<Region> {
    let last_interval = match not_covering.last() {
        Some(&interval) => interval,
        None => return Vec::new(),
    };

    let mut positions: BTreeMap<u64, DpPosition> = BTreeMap::new();
    for (i, region) in not_covering.iter().enumerate() {
        for pos in region.first..=region.last {
            positions.entry(pos).or_default().not_covering_ids.push(i);
        }
    }
    for (j, region) in covering.iter().enumerate() {
        for pos in region.first..=region.last {
            if let Some(entry) = positions.get_mut(&pos) {
                entry.covering_ids.push(j);
            }
        }
    }

    let ordered: Vec<u64> = positions.keys().copied().collect();
    let mut last_short: BTreeSet<usize> = BTreeSet::new();
    let mut current_short: BTreeSet<usize> = BTreeSet::new();
    let mut last_finished = 0usize;
    for (step, &pos) in ordered.iter().enumerate() {
        current_short.extend(positions[&pos].not_covering_ids.iter().copied());
        if step == 0 {
            continue;
        }
        // id of the rightmost interval that ended left of pos
        for &previous in &last_short {
            if !current_short.contains(&previous) {
                last_finished = previous;
            }
        }
        find_optimal(
            not_covering[last_finished],
            &mut positions,
            pos,
            epsilon,
            min_length,
        );
        std::mem::swap(&mut last_short, &mut current_short);
        current_short.clear();
    }

    trace_back(&positions, last_interval.last, atom_first)
}
