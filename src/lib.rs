//! # Genome atomizer
//!
//! Partitions the concatenated sequence space of a set of pairwise
//! alignments into a minimal set of maximal intervals ("atoms") such that
//! every atom is either entirely aligned or entirely unaligned under every
//! input alignment, and groups atoms aligned to one another into signed
//! equivalence classes.
//!
//! ## Pipeline
//!
//! 1. **PSL input**: filtered, split at long gaps, stored with symmetric
//!    inverses in a shared arena
//! 2. **Bucket index**: spatial lookup from target positions to alignments
//! 3. **Initial partition**: breakpoints at species boundaries and alignment
//!    endpoints collapse into the first waste-region set
//! 4. **IMP refinement**: per-atom dynamic program introduces new waste
//!    until the atom set reaches a fixed point
//! 5. **Classification**: connected components over the atom graph with
//!    strand signs
//!
//! ## Usage example
//!
//! ```ignore
//! use atomizer::{Atomizer, AtomizerConfig};
//!
//! let atomizer = Atomizer::new(AtomizerConfig::default())?;
//! let result = atomizer.run_files(&paths)?;
//! result.write_table(&mut std::io::stdout().lock())?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod breakpoints;
pub mod classify;
pub mod imp;
pub mod index;
pub mod model;
pub mod output;
pub mod psl;
pub mod species;

pub use index::BucketIndex;
pub use model::{AlignmentRecord, AlignmentSet, AlnId, Region, Strand, WasteRegion};
pub use species::SequenceSpace;

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

/// Tunable parameters of the whole pipeline.
#[derive(Debug, Clone)]
pub struct AtomizerConfig {
    /// Minimum length an atom must have.
    pub min_length: u64,
    /// Minimum identity fraction an alignment must reach to be considered.
    pub min_identity: f32,
    /// Maximum gap length inside an alignment before it is split in two.
    pub max_gap: u64,
    /// Alignments with a target span this short or shorter are dropped.
    pub min_aln_length: u64,
    /// Width of the spatial index buckets.
    pub bucket_size: u64,
    /// Worker threads for the refinement loop.
    pub num_threads: usize,
    /// Drop alignments whose query and target spans coincide.
    pub drop_self_alignments: bool,
    /// Optional safety cap on refinement iterations.
    pub max_iterations: Option<u64>,
}

impl Default for AtomizerConfig {
    fn default() -> Self {
        Self {
            min_length: 250,
            min_identity: 0.8,
            max_gap: 13,
            min_aln_length: 13,
            bucket_size: 1000,
            num_threads: 1,
            drop_self_alignments: false,
            max_iterations: None,
        }
    }
}

/// Errors surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum AtomizerError {
    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// PSL input could not be read.
    #[error(transparent)]
    Psl(#[from] psl::PslError),
    /// The initial partition could not be created.
    #[error(transparent)]
    Breakpoints(#[from] breakpoints::BreakpointError),
    /// The refinement loop failed.
    #[error(transparent)]
    Engine(#[from] imp::EngineError),
    /// Atom classification failed.
    #[error(transparent)]
    Classify(#[from] classify::ClassifyError),
}

/// Final partition together with the inputs needed to render it.
#[derive(Debug)]
pub struct AtomizeResult {
    /// Sequence name table of the concatenated axis.
    pub species: SequenceSpace,
    /// Final waste-region list, sorted and disjoint.
    pub waste: Vec<WasteRegion>,
    /// Atoms between consecutive waste regions.
    pub atoms: Vec<Region>,
    /// Signed class per atom; the absolute value is the class number.
    pub classes: Vec<i32>,
    /// Number of distinct classes.
    pub class_count: i32,
    /// Refinement iterations until the fixed point.
    pub iterations: u64,
}

impl AtomizeResult {
    /// Render the result table.
    pub fn write_table<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        output::write_table(out, &self.waste, &self.classes, &self.species)
    }
}

/// Pipeline orchestrator.
#[derive(Debug)]
pub struct Atomizer {
    config: AtomizerConfig,
}

impl Atomizer {
    /// Validate the configuration and build the orchestrator.
    pub fn new(config: AtomizerConfig) -> Result<Self, AtomizerError> {
        if config.bucket_size == 0 {
            return Err(AtomizerError::InvalidConfig("bucket size must be positive"));
        }
        if config.num_threads == 0 {
            return Err(AtomizerError::InvalidConfig(
                "at least one worker thread is required",
            ));
        }
        if !(0.0..=1.0).contains(&config.min_identity) {
            return Err(AtomizerError::InvalidConfig(
                "minimum identity must lie in [0, 1]",
            ));
        }
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &AtomizerConfig {
        &self.config
    }

    /// Input filters derived from the configuration.
    pub fn psl_options(&self) -> psl::PslOptions {
        psl::PslOptions {
            max_gap: self.config.max_gap,
            min_aln_length: self.config.min_aln_length,
            min_identity: self.config.min_identity,
            drop_self_alignments: self.config.drop_self_alignments,
        }
    }

    /// Parse the given PSL files and run the pipeline.
    pub fn run_files(&self, paths: &[PathBuf]) -> Result<AtomizeResult, AtomizerError> {
        let mut species = SequenceSpace::new();
        let mut set = AlignmentSet::new();
        psl::parse_files(paths, &self.psl_options(), &mut species, &mut set)?;
        self.run_parsed(species, set)
    }

    /// Run the pipeline on already-parsed input.
    pub fn run_parsed(
        &self,
        species: SequenceSpace,
        set: AlignmentSet,
    ) -> Result<AtomizeResult, AtomizerError> {
        let start = Instant::now();
        info!(
            alignments = set.len(),
            sequences = species.len(),
            total_length = species.total(),
            "input ready"
        );

        let index = BucketIndex::build(&set, self.config.bucket_size, species.total());
        info!(buckets = index.bucket_count(), "bucket index filled");

        let breakpoints = breakpoints::collect_breakpoints(&set, &species.boundaries());
        let mut waste = breakpoints::create_waste(&breakpoints, self.config.min_length)?;
        let mut atoms = breakpoints::atoms_from_waste(&waste);
        info!(
            waste = waste.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "initial partition created"
        );

        let params = imp::EngineParams {
            min_length: self.config.min_length,
            epsilon: index.epsilon(),
            num_threads: self.config.num_threads,
            max_iterations: self.config.max_iterations,
        };
        let iterations = imp::refine(&mut atoms, &mut waste, &set, &index, &params)?;
        info!(
            iterations,
            atoms = atoms.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "refinement reached a fixed point"
        );

        let (classes, class_count) =
            classify::classify(&waste, &set, &index, self.config.min_identity)?;
        info!(
            classes = class_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "classification done"
        );

        Ok(AtomizeResult {
            species,
            waste,
            atoms,
            classes,
            class_count,
            iterations,
        })
    }
}
