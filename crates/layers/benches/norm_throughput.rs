use candle_core::{Device, Module, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use layers::{
    norm::{LayerNorm, NormConfig},
    FeedForward, FeedForwardConfig, Initializer, LinearInit,
};

fn bench_norm_and_mlp(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 8usize;
    let seq = 32usize;
    let hidden_sizes = &[256usize, 512, 1024];

    let mut group = c.benchmark_group("layers");
    for &hidden in hidden_sizes {
        let input = Tensor::randn(0f32, 1.0, (batch, seq, hidden), &device).expect("input");
        let norm = LayerNorm::new(NormConfig::new(hidden), &device).expect("layer norm");
        let mut init = Initializer::new(0);
        let mlp = FeedForward::new(
            FeedForwardConfig::new(hidden, hidden * 4, 0.0),
            LinearInit::XavierUniform,
            &mut init,
            &device,
        )
        .expect("feed forward");

        group.throughput(Throughput::Elements((batch * seq * hidden) as u64));

        group.bench_with_input(BenchmarkId::new("layer_norm", hidden), &input, |b, input| {
            b.iter(|| {
                let out = norm.forward(black_box(input)).expect("forward");
                black_box(out);
            });
        });

        group.bench_with_input(BenchmarkId::new("feed_forward", hidden), &input, |b, input| {
            b.iter(|| {
                let out = mlp.forward(black_box(input)).expect("forward");
                black_box(out);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_norm_and_mlp);
criterion_main!(benches);
