//! Initial breakpoints and the first waste-region set.
//!
//! Breakpoints are the union of species boundaries and every alignment's
//! target endpoints; query endpoints are contributed by the symmetric
//! records. Consecutive breakpoints closer than the minimum atom length
//! collapse into one waste region.

use thiserror::Error;

use crate::model::{AlignmentSet, Region, WasteRegion};

/// Errors raised while deriving the initial partition.
#[derive(Debug, Error)]
pub enum BreakpointError {
    /// No breakpoints exist, so no partition can be created.
    #[error("cannot create waste regions from an empty breakpoint list")]
    NoBreakpoints,
}

/// Collect the sorted, deduplicated breakpoint positions.
pub fn collect_breakpoints(set: &AlignmentSet, boundaries: &[u64]) -> Vec<u64> {
    let mut breakpoints: Vec<u64> = boundaries.to_vec();
    breakpoints.reserve(set.len() * 2);
    for record in set.iter() {
        breakpoints.push(record.t_start);
        breakpoints.push(record.t_end);
    }
    breakpoints.sort_unstable();
    breakpoints.dedup();
    breakpoints
}

/// Collapse breakpoints into waste regions so that no two consecutive
/// regions are closer than `min_length`.
pub fn create_waste(
    breakpoints: &[u64],
    min_length: u64,
) -> Result<Vec<WasteRegion>, BreakpointError> {
    let (&head, rest) = breakpoints
        .split_first()
        .ok_or(BreakpointError::NoBreakpoints)?;
    let mut waste = vec![WasteRegion::point(head)];
    for &bp in rest {
        let tail = waste.len() - 1;
        let current = &mut waste[tail];
        if bp - current.last <= min_length {
            current.last = bp;
        } else {
            waste.push(WasteRegion::point(bp));
        }
    }
    Ok(waste)
}

/// Atoms are the intervals between consecutive waste regions.
pub fn atoms_from_waste(waste: &[WasteRegion]) -> Vec<Region> {
    waste
        .windows(2)
        .map(|pair| Region::new(pair[0].last, pair[1].first))
        .collect()
}
