use candle_core::{Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seq2seq::{build_transformer, masks::padding_mask_from_tokens, TransformerConfig};

fn bench_encode(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 4usize;
    let mut config = TransformerConfig::new(1000, 1000, 128, 128);
    config.d_model = 128;
    config.n_heads = 4;
    config.d_ff = 512;
    config.n_layers = 2;
    let model = build_transformer(&config, &device).expect("model");
    model.set_training(false);

    let mut group = c.benchmark_group("seq2seq");
    for &seq in &[16usize, 64, 128] {
        let ids: Vec<u32> = (0..batch * seq).map(|i| (i % 997) as u32 + 1).collect();
        let src = Tensor::from_vec(ids, (batch, seq), &device).expect("src");
        let mask = padding_mask_from_tokens(&src, 0).expect("mask");

        group.throughput(Throughput::Elements((batch * seq) as u64));
        group.bench_with_input(BenchmarkId::new("encode", seq), &src, |b, src| {
            b.iter(|| {
                let out = model.encode(black_box(src), Some(&mask)).expect("encode");
                black_box(out);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);
