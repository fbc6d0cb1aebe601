use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mixflow_buffer::{AudioBuffer, RingBuffer, SnapshotBuffer};

fn sine_block(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (i as f32 * 0.01).sin() * 0.8)
        .collect()
}

fn bench_ring_push_pop(c: &mut Criterion) {
    let block = sine_block(320);

    c.bench_function("ring_push_pop_320", |b| {
        let ring = RingBuffer::<f32>::with_capacity("bench", 65536, false);
        let mut out = vec![0.0f32; 320];
        b.iter(|| {
            ring.push_samples(black_box(&block), 0, block.len(), None)
                .unwrap();
            ring.pop_samples(black_box(&mut out), 0, out.len()).unwrap();
        });
    });
}

fn bench_ring_overwrite(c: &mut Criterion) {
    let block = sine_block(320);

    // Never popped: every push past the first few overwrites.
    c.bench_function("ring_push_overwriting_320", |b| {
        let ring = RingBuffer::<f32>::with_capacity("bench", 4096, false);
        b.iter(|| {
            ring.push_samples(black_box(&block), 0, block.len(), None)
                .unwrap();
        });
    });
}

fn bench_ring_growth(c: &mut Criterion) {
    let block = sine_block(320);

    c.bench_function("ring_push_growable_320", |b| {
        b.iter_with_setup(
            || RingBuffer::<f32>::with_capacity("bench", 256, true),
            |ring| {
                for _ in 0..64 {
                    ring.push_samples(black_box(&block), 0, block.len(), None)
                        .unwrap();
                }
            },
        );
    });
}

fn bench_snapshot_replace(c: &mut Criterion) {
    let block = sine_block(4096);

    c.bench_function("snapshot_replace_4096", |b| {
        let buf = SnapshotBuffer::<f32>::with_capacity("bench", 4096);
        b.iter(|| {
            buf.push_samples(black_box(&block), 0, block.len(), None)
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_ring_push_pop,
    bench_ring_overwrite,
    bench_ring_growth,
    bench_snapshot_replace
);
criterion_main!(benches);
