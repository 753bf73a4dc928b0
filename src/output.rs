//! Tab-separated result table.
//!
//! One line per atom in left-to-right order, with coordinates rewritten
//! relative to the owning input sequence and clipped to its span.

use std::io::{self, Write};

use crate::model::WasteRegion;
use crate::species::SequenceSpace;

/// Header line of the result table.
pub const TABLE_HEADER: &str = "#name\tatom_nr\tclass\tstrand\tstart\tend";

/// Write the atom table for the final partition.
pub fn write_table<W: Write>(
    out: &mut W,
    waste: &[WasteRegion],
    classes: &[i32],
    species: &SequenceSpace,
) -> io::Result<()> {
    writeln!(out, "{TABLE_HEADER}")?;
    for (i, pair) in waste.windows(2).enumerate() {
        let atom_start = pair[0].last;
        let atom_end = pair[1].first;
        let (name, seq_start, seq_end) = match species.locate(atom_start) {
            Some(found) => found,
            None => continue,
        };
        let start = atom_start.saturating_sub(seq_start);
        let end = atom_end.min(seq_end) - seq_start;
        let class = classes[i].unsigned_abs();
        let strand = if classes[i] > 0 { '+' } else { '-' };
        writeln!(
            out,
            "{name}\t{nr}\t{class}\t{strand}\t{start}\t{end}",
            nr = i + 1
        )?;
    }
    Ok(())
}
