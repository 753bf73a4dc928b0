//! Iterative Minimizing Partitioning.
//!
//! Each iteration walks every atom, pulls the waste regions that the atom's
//! covering alignments map onto elsewhere back into the atom, and lets a
//! dynamic program pick the cheapest placement of new waste positions. The
//! merged additions are consolidated into the global waste list and the loop
//! repeats until the atom set stops changing.

mod partition;

pub use partition::{create_new_waste, partition_covering};

use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::breakpoints::atoms_from_waste;
use crate::index::BucketIndex;
use crate::model::{find_waste_slot, AlignmentSet, Region, WasteRegion};

/// Tunables of the refinement loop.
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Minimum length an atom must have.
    pub min_length: u64,
    /// Cost of opening a new atom between two waste positions.
    pub epsilon: f64,
    /// Worker threads for the per-atom loop.
    pub num_threads: usize,
    /// Optional safety cap on the number of iterations.
    pub max_iterations: Option<u64>,
}

/// Errors raised by the refinement loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The worker pool could not be constructed.
    #[error("failed to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// The loop hit the configured iteration cap before converging.
    #[error("refinement did not converge within {0} iterations")]
    IterationCap(u64),
}

/// Refine `atoms` and `waste` in place until a fixed point is reached.
///
/// Atoms are processed in parallel against the iteration's immutable waste
/// list; the merged per-atom outputs are sorted globally before
/// consolidation, so the result does not depend on worker interleaving.
/// Returns the number of completed iterations.
pub fn refine(
    atoms: &mut Vec<Region>,
    waste: &mut Vec<WasteRegion>,
    set: &AlignmentSet,
    index: &BucketIndex,
    params: &EngineParams,
) -> Result<u64, EngineError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.num_threads)
        .build()?;
    let mut iterations = 0u64;
    loop {
        let current_atoms: &[Region] = atoms;
        let current_waste: &[WasteRegion] = waste;
        let additions: Vec<Vec<Region>> = pool.install(|| {
            current_atoms
                .par_iter()
                .map(|&atom| refine_atom(atom, current_waste, set, index, params))
                .collect()
        });
        waste.extend(additions.into_iter().flatten().map(WasteRegion::from));
        consolidate(waste, params.min_length);
        let new_atoms = atoms_from_waste(waste);
        if new_atoms == *atoms {
            break;
        }
        *atoms = new_atoms;
        iterations += 1;
        info!(
            iteration = iterations,
            waste = waste.len(),
            "IMP iteration complete"
        );
        if let Some(cap) = params.max_iterations {
            if iterations >= cap {
                return Err(EngineError::IterationCap(cap));
            }
        }
    }
    Ok(iterations)
}

/// Produce the new waste regions for one atom.
fn refine_atom(
    atom: Region,
    waste: &[WasteRegion],
    set: &AlignmentSet,
    index: &BucketIndex,
    params: &EngineParams,
) -> Vec<Region> {
    let mut intervals: Vec<Region> = Vec::new();
    for &id in index.covering(atom.middle()) {
        let aln = &set[id];
        if !aln.covers(atom) {
            continue;
        }
        let mapped = aln.map_region(atom);
        let slot_first = find_waste_slot(waste, mapped.first);
        let slot_last = find_waste_slot(waste, mapped.last);
        let inverse = &set[aln.sym()];
        for w in &waste[slot_first..=slot_last] {
            if mapped.first > w.last || w.first > mapped.last {
                continue;
            }
            let a = inverse.map_breakpoint(w.first);
            let b = inverse.map_breakpoint(w.last);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            if hi < atom.first || lo > atom.last {
                continue;
            }
            intervals.push(Region::new(lo.max(atom.first), hi.min(atom.last)));
        }
    }
    // anchor the dynamic program at both atom ends
    intervals.push(Region::point(atom.first));
    intervals.push(Region::point(atom.last));
    intervals.sort_unstable();
    intervals.dedup();

    let (covering, not_covering) = partition_covering(&intervals);
    create_new_waste(
        &not_covering,
        &covering,
        params.epsilon,
        params.min_length,
        atom.first,
    )
}

/// Sort the waste list and join any two regions whose gap does not exceed
/// `min_length`.
pub fn consolidate(waste: &mut Vec<WasteRegion>, min_length: u64) {
    waste.sort_unstable();
    let mut merged: Vec<WasteRegion> = Vec::with_capacity(waste.len());
    for &region in waste.iter() {
        match merged.last_mut() {
            Some(current) if region.first <= current.last + min_length => {
                current.last = current.last.max(region.last);
            }
            _ => merged.push(region),
        }
    }
    *waste = merged;
}
