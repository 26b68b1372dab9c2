use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use maskpack::{
    compress_bytes, Compressor, CompressorConfig, Decompressor, DecompressorConfig, SymbolCount,
};
use std::hint::black_box;

fn sparse_blocks(blocks: usize) -> Vec<u8> {
    (0..blocks * 64)
        .map(|i| if i % 5 == 0 { (i % 16) as u8 } else { 0 })
        .collect()
}

fn decompressor_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompressor_cycles");

    for out_width in [16u32, 32, 64, 128] {
        let flits = compress_bytes(&sparse_blocks(4), SymbolCount::Sym64).expect("flits");
        let config = DecompressorConfig::new(32, out_width, 64).expect("config");

        group.throughput(Throughput::Elements(4));
        group.bench_with_input(
            BenchmarkId::from_parameter(out_width),
            &flits,
            |b, flits| {
                b.iter_batched(
                    || Decompressor::new(config).expect("decompressor"),
                    |mut dec| {
                        dec.write_input(black_box(flits)).expect("write");
                        dec.run_until_idle(10_000);
                        black_box(dec.drain_output())
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn compressor_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("compressor_cycles");
    let data = sparse_blocks(8);

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("sparse/8", |b| {
        b.iter_batched(
            || Compressor::new(CompressorConfig::default()).expect("compressor"),
            |mut comp| {
                comp.write_input(black_box(&data), true).expect("write");
                let mut flits = Vec::new();
                while !comp.end_of_stream() {
                    comp.tick();
                    flits.extend(comp.drain_output());
                }
                black_box(flits)
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, decompressor_cycles, compressor_cycles);
criterion_main!(benches);
