#![allow(dead_code)]

use atomizer::{AlignmentSet, AtomizeResult, Atomizer, AtomizerConfig, SequenceSpace};

/// Render one 21-column PSL line.
///
/// `blocks` holds `(size, q_start, t_start)` triples in file coordinates; on
/// the reverse strand the query starts are reverse-complement coordinates,
/// exactly as PSL stores them.
#[allow(clippy::too_many_arguments)]
pub fn psl_line(
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

/// Run the whole pipeline on in-memory PSL text.
pub fn run(input: &str, config: AtomizerConfig) -> AtomizeResult {
    let atomizer = Atomizer::new(config).expect("configuration is valid");
    let mut species = SequenceSpace::new();
    let mut set = AlignmentSet::new();
    atomizer::psl::parse_reader(
        input.as_bytes(),
        "inline.psl",
        &atomizer.psl_options(),
        &mut species,
        &mut set,
    )
    .expect("input parses");
    atomizer.run_parsed(species, set).expect("pipeline succeeds")
}

/// Render a result to its output table.
pub fn table(result: &AtomizeResult) -> String {
    let mut buf = Vec::new();
    result.write_table(&mut buf).expect("table renders");
    String::from_utf8(buf).expect("utf-8 output")
}

/// Default configuration scaled down for small test sequences.
pub fn small_config() -> AtomizerConfig {
    AtomizerConfig {
        min_length: 5,
        min_aln_length: 4,
        ..AtomizerConfig::default()
    }
}
