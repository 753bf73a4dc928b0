//! Performance benchmarks for the refinement pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atomizer::{AlignmentRecord, AlignmentSet, Atomizer, AtomizerConfig, SequenceSpace, Strand};

/// Two synthetic chromosomes with evenly spaced block alignments.
fn synthetic_input(pairs: usize) -> (SequenceSpace, AlignmentSet) {
    let mut species = SequenceSpace::new();
    let a_offset = species.intern("chrA", 200_000);
    let b_offset = species.intern("chrB", 200_000);
    let mut set = AlignmentSet::new();
    for i in 0..pairs as u64 {
        let q_start = a_offset + 100 + i * 900;
        let t_start = b_offset + 150 + i * 900;
        let record = AlignmentRecord::new(
            Strand::Forward,
            q_start,
            q_start + 400,
            t_start,
            t_start + 400,
            &[400],
            &[q_start],
            &[t_start],
        )
        .expect("record builds");
        set.push_pair(record).expect("pair inserted");
    }
    (species, set)
}

fn benchmark_pipeline(c: &mut Criterion) {
    c.bench_function("atomize_200_alignments", |b| {
        b.iter(|| {
            let (species, set) = synthetic_input(200);
            let atomizer = Atomizer::new(AtomizerConfig {
                min_length: 50,
                ..AtomizerConfig::default()
            })
            .expect("configuration is valid");
            black_box(atomizer.run_parsed(species, set).expect("pipeline succeeds"));
        });
    });
}

criterion_group!(benches, benchmark_pipeline);
criterion_main!(benches);
