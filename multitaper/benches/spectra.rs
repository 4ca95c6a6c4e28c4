use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use multitaper::signal::spectra::{get_spectra, MethodConfig, MULTITAPER_CSD, MULTITAPER_PSD};
use ndarray::Array2;
use rand::rngs::ThreadRng;

/// Sum of a few sinusoids plus uniform noise on every channel.
fn randomized_channels(mut rng: ThreadRng, channels: usize, n: usize, fs: f64) -> Array2<f64> {
    use rand::Rng;

    let freqs: Vec<f64> = (0..4).map(|_| rng.random_range(1.0..0.5 * fs)).collect();
    Array2::from_shape_fn((channels, n), |(c, i)| {
        let t = i as f64 / fs;
        freqs
            .iter()
            .enumerate()
            .map(|(j, f)| (2.0 * std::f64::consts::PI * f * t + (c + j) as f64).sin())
            .sum::<f64>()
    }) + Array2::from_shape_fn((channels, n), |_| rng.random_range(-0.5..0.5))
}

/// Full estimates over a channel count sweep; tapers come from the cache
/// after the first iteration.
fn multitaper_estimates(c: &mut Criterion) {
    const FS: f64 = 1000.0;
    const N: usize = 1 << 12;

    let mut group = c.benchmark_group("get_spectra");
    for channels in [1usize, 4, 16] {
        let signal = randomized_channels(rand::rng(), channels, N, FS);
        for (name, adaptive) in [
            (MULTITAPER_CSD, false),
            (MULTITAPER_PSD, false),
            (MULTITAPER_PSD, true),
        ] {
            let method = MethodConfig {
                fs: FS,
                adaptive,
                ..MethodConfig::new(name)
            };
            let id = if adaptive {
                format!("{name}_adaptive")
            } else {
                name.to_owned()
            };
            group.bench_with_input(BenchmarkId::new(id, channels), &signal, |bench, sig| {
                bench.iter(|| get_spectra(black_box(sig), black_box(&method)))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, multitaper_estimates);
criterion_main!(benches);
