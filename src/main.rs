use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use atomizer::{Atomizer, AtomizerConfig};

/// Partition aligned genomes into atoms and classify them.
#[derive(Parser, Debug)]
#[command(
    name = "atomizer",
    about = "Partitions pairwise-aligned sequences into minimal atoms and groups them into classes"
)]
struct Cli {
    /// Input PSL file(s).
    #[arg(required = true)]
    psl: Vec<PathBuf>,

    /// Minimum length an atom must have.
    #[arg(long = "minLength", default_value_t = 250)]
    min_length: u64,

    /// Minimum identity (percent) an alignment must have to be considered.
    #[arg(long = "minIdent", default_value_t = 80)]
    min_ident: u32,

    /// Maximum gap length inside an alignment before it is split in two.
    #[arg(long = "maxGap", default_value_t = 13)]
    max_gap: u64,

    /// Minimum length an alignment must have to be considered.
    #[arg(long = "minAlnLength", default_value_t = 13)]
    min_aln_length: u64,

    /// Size of the buckets used to find covering alignments.
    #[arg(long = "bucketSize", default_value_t = 1000)]
    bucket_size: u64,

    /// Number of threads to run the IMP algorithm.
    #[arg(long = "numThreads", default_value_t = 1)]
    num_threads: usize,

    /// Drop alignments that map a region onto itself.
    #[arg(long = "dropSelf")]
    drop_self: bool,

    /// Abort if the IMP loop has not converged after this many iterations.
    #[arg(long = "maxIterations")]
    max_iterations: Option<u64>,

    /// Report the maximum block size and local block start, then exit.
    #[arg(long = "blockStats")]
    block_stats: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AtomizerConfig {
        min_length: cli.min_length,
        min_identity: cli.min_ident as f32 / 100.0,
        max_gap: cli.max_gap,
        min_aln_length: cli.min_aln_length,
        bucket_size: cli.bucket_size,
        num_threads: cli.num_threads,
        drop_self_alignments: cli.drop_self,
        max_iterations: cli.max_iterations,
    };
    let atomizer = Atomizer::new(config).context("invalid configuration")?;

    if cli.block_stats {
        let (max_size, max_start) =
            atomizer::psl::max_block_extent(&cli.psl, &atomizer.psl_options())
                .context("block scan failed")?;
        eprintln!("max block size: {max_size}, max local block start: {max_start}");
        return Ok(());
    }

    let result = atomizer.run_files(&cli.psl).context("atomizing failed")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    result
        .write_table(&mut out)
        .context("failed to write the result table")?;
    out.flush()?;
    Ok(())
}
