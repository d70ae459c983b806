//! Block processing cost of the Doppler engine and the full processor.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use doppler_core::dsp::doppler::DopplerEffect;
use doppler_core::dsp::reverb::Reverb;
use doppler_core::{Band, EngineConfig, Processor};
use std::hint::black_box;

const SAMPLE_RATE: f32 = 48000.0;

fn test_signal(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| (n as f32 / SAMPLE_RATE * std::f32::consts::TAU * 440.0).sin() * 0.5)
        .collect()
}

/// Benchmark one modulated Doppler engine across block sizes.
fn bench_doppler(c: &mut Criterion) {
    let mut group = c.benchmark_group("doppler");
    for block_size in [64usize, 256, 1024] {
        group.throughput(Throughput::Elements(block_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &block_size| {
                let mut engine = DopplerEffect::new(SAMPLE_RATE, block_size);
                engine.set_properties(2.5, false);
                let input = test_signal(block_size);
                let mut block = input.clone();
                b.iter(|| {
                    block.copy_from_slice(&input);
                    engine.apply(black_box(&mut block));
                });
            },
        );
    }
    group.finish();
}

/// Benchmark the Freeverb network on a single channel.
fn bench_reverb(c: &mut Criterion) {
    let mut reverb = Reverb::with_params(SAMPLE_RATE, 0.8, 0.5, 0.5, 1.0);
    let input = test_signal(512);
    let mut block = input.clone();
    c.bench_function("reverb_512", |b| {
        b.iter(|| {
            block.copy_from_slice(&input);
            reverb.apply(black_box(&mut block));
        });
    });
}

/// Benchmark the full stereo processor with every band modulated.
fn bench_processor(c: &mut Criterion) {
    let mut processor = Processor::new(EngineConfig::new(SAMPLE_RATE as f64, 512, 2))
        .expect("valid benchmark config");
    let params = processor.parameters();
    for band in Band::ALL {
        params.band(band).set_lfo_odd(0.4);
    }
    params.set_bit_amount(0.5);
    params.set_drive(0.3);

    let input = test_signal(512);
    let mut left = input.clone();
    let mut right = input.clone();

    let mut group = c.benchmark_group("processor");
    group.throughput(Throughput::Elements(1024));
    group.bench_function("stereo_512", |b| {
        b.iter(|| {
            left.copy_from_slice(&input);
            right.copy_from_slice(&input);
            processor.process(black_box(&mut [&mut left[..], &mut right[..]]));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_doppler, bench_reverb, bench_processor);
criterion_main!(benches);
