use char_pipeline::{
    CharReader, PassthroughStage, PipelineBuilder, RecordWriter, Stage,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io::{self, Cursor};
use std::time::Duration;

/// A consumer that spins briefly on every character
struct SlowStage;

impl Stage for SlowStage {
    fn process(&mut self, input: char, out: &mut Vec<char>) {
        for _ in 0..200 {
            std::hint::spin_loop();
        }
        out.push(input);
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn benchmark_slow_consumer(c: &mut Criterion) {
    let input = vec![b'x'; 5_000];
    let mut group = c.benchmark_group("slow_consumer_5000_chars");

    for capacity in [1usize, 8, 80, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &cap| {
            b.iter(|| {
                PipelineBuilder::new()
                    .with_buffer_capacity(cap)
                    .add_stage(PassthroughStage)
                    .add_stage(SlowStage)
                    .build()
                    .expect("Build failed")
                    .run(
                        CharReader::new(Cursor::new(input.clone())),
                        RecordWriter::new(io::sink()),
                    )
                    .expect("Run failed")
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = benchmark_slow_consumer
);
criterion_main!(benches);
