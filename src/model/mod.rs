//! Core data model shared by every pipeline stage.

mod record;
mod region;

pub use record::{AlignmentRecord, AlignmentSet, AlnId, RecordError, Strand};
pub use region::{find_waste_slot, Region, WasteRegion};
