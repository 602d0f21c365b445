//! Integration Tests
//!
//! End-to-end tests for the multi-band engine: reconstruction, compression
//! levels, bypass behaviour, state and the offline CLI path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use approx::assert_abs_diff_eq;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use threeband::dsp::biquad::{BiquadCoeffs, BiquadState, FilterType, BUTTERWORTH_Q};
use threeband::dsp::crossover::BandSplitter;
use threeband::engine::buffer::{db_to_linear, linear_to_db, peak_db, rms_db, AudioBuffer};
use threeband::engine::io::{export_audio, generate_test_tone, import_audio, ExportFormat};
use threeband::{BandSplitConfig, CompressorParameters, MultiBandEngine};

const SR: f64 = 48000.0;
const BLOCK: usize = 512;

/// Run a mono signal through a prepared engine block by block
fn render(engine: &mut MultiBandEngine, input: &[f32]) -> Vec<f32> {
    let mut output = input.to_vec();
    for chunk in output.chunks_mut(engine.max_block_size()) {
        let mut channels = [chunk];
        engine.process_channels(&mut channels);
    }
    output
}

fn impulse(len: usize) -> Vec<f32> {
    let mut x = vec![0.0; len];
    x[0] = 1.0;
    x
}

fn sine(freq: f64, amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| amplitude * (2.0 * std::f64::consts::PI * freq * n as f64 / SR).sin() as f32)
        .collect()
}

/// Input run through the all-pass of every crossover, lowest first
fn allpass_reference(crossovers: &[f32], input: &[f32]) -> Vec<f32> {
    let sections: Vec<BiquadCoeffs> = crossovers
        .iter()
        .map(|&f| BiquadCoeffs::calculate(FilterType::AllPass, SR, f64::from(f), BUTTERWORTH_Q))
        .collect();
    let mut states = vec![BiquadState::default(); sections.len()];

    input
        .iter()
        .map(|&x| {
            let mut y = f64::from(x);
            for (state, coeffs) in states.iter_mut().zip(&sections) {
                y = state.process(y, coeffs);
            }
            y as f32
        })
        .collect()
}

fn error_db(actual: &[f32], reference: &[f32]) -> f64 {
    let error: f64 = actual
        .iter()
        .zip(reference)
        .map(|(&a, &r)| f64::from(a - r).powi(2))
        .sum();
    let energy: f64 = reference.iter().map(|&r| f64::from(r).powi(2)).sum();
    10.0 * (error / energy).log10()
}

// === Reconstruction ===

#[test]
fn test_impulse_reconstruction_three_bands() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, BLOCK, 1).unwrap();

    let input = impulse(8192);
    let output = render(&mut engine, &input);
    let reference = allpass_reference(engine.crossovers(), &input);

    let err = error_db(&output, &reference);
    assert!(err <= -60.0, "reconstruction error {:.1} dB", err);
}

#[test]
fn test_impulse_reconstruction_many_bands() {
    let crossovers = vec![80.0, 250.0, 800.0, 2500.0, 6000.0, 12000.0];
    let mut engine = MultiBandEngine::new(BandSplitConfig::new(crossovers.clone()).unwrap());
    engine.prepare(SR, 256, 1).unwrap();

    let input = impulse(16384);
    let output = render(&mut engine, &input);
    let err = error_db(&output, &allpass_reference(&crossovers, &input));
    assert!(err <= -60.0, "reconstruction error {:.1} dB", err);
}

#[test]
fn test_magnitude_response_is_flat() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, BLOCK, 1).unwrap();

    let len = 16384;
    let response = render(&mut engine, &impulse(len));

    let mut spectrum: Vec<Complex<f64>> = response
        .iter()
        .map(|&s| Complex::new(f64::from(s), 0.0))
        .collect();
    FftPlanner::<f64>::new()
        .plan_fft_forward(len)
        .process(&mut spectrum);

    let bin_hz = SR / len as f64;
    for (bin, value) in spectrum.iter().enumerate().take(len / 2) {
        let freq = bin as f64 * bin_hz;
        if !(20.0..=20000.0).contains(&freq) {
            continue;
        }
        let magnitude_db = 20.0 * value.norm().log10();
        assert!(
            magnitude_db.abs() < 0.05,
            "{:.1} Hz: {:.3} dB",
            freq,
            magnitude_db
        );
    }
}

#[test]
fn test_silence_stays_silent() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, BLOCK, 2).unwrap();
    let mut buffer = AudioBuffer::new(2, BLOCK, 48000);
    for _ in 0..10 {
        engine.process(&mut buffer);
    }
    assert!(buffer.samples.iter().flatten().all(|&s| s == 0.0));
    assert_eq!(engine.gain_reduction_db(0).unwrap(), 0.0);
}

// === Compression ===

#[test]
fn test_single_band_steady_state_level() {
    let mut engine = MultiBandEngine::new(BandSplitConfig::single_band());
    engine.prepare(SR, BLOCK, 1).unwrap();
    engine
        .set_parameters(
            0,
            CompressorParameters {
                threshold_db: -12.0,
                ratio: 4.0,
                knee_db: 0.0,
                attack_ms: 0.1,
                release_ms: 500.0,
                ..Default::default()
            },
        )
        .unwrap();

    let output = render(&mut engine, &sine(1000.0, db_to_linear(-6.0), 48000));

    // -12 + (-6 - -12) / 4
    assert_abs_diff_eq!(peak_db(&output[38400..]), -10.5, epsilon = 0.5);
    assert!(engine.gain_reduction_db(0).unwrap() > 3.0);
}

#[test]
fn test_mid_band_compression_leaves_high_tone_alone() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, BLOCK, 1).unwrap();
    for band in 0..2 {
        engine
            .set_parameters(
                band,
                CompressorParameters {
                    threshold_db: -50.0,
                    ratio: 20.0,
                    attack_ms: 1.0,
                    ..Default::default()
                },
            )
            .unwrap();
    }

    let input = sine(7919.0, 0.5, 24000);
    let output = render(&mut engine, &input);

    assert_abs_diff_eq!(peak_db(&output[12000..]), peak_db(&input[12000..]), epsilon = 0.1);
    assert_abs_diff_eq!(peak_db(&input[12000..]), linear_to_db(0.5), epsilon = 0.1);
    assert_abs_diff_eq!(rms_db(&output[12000..]), rms_db(&input[12000..]), epsilon = 0.1);
    assert_eq!(engine.gain_reduction_db(2).unwrap(), 0.0);
}

#[test]
fn test_loud_low_tone_compresses_only_low_band() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, BLOCK, 1).unwrap();
    let params = CompressorParameters {
        threshold_db: -30.0,
        ratio: 10.0,
        attack_ms: 1.0,
        ..Default::default()
    };
    for band in 0..3 {
        engine.set_parameters(band, params).unwrap();
    }

    render(&mut engine, &sine(60.0, 0.8, 24000));

    assert!(engine.gain_reduction_db(0).unwrap() > 15.0);
    assert_eq!(engine.gain_reduction_db(2).unwrap(), 0.0);
}

// === Bypass ===

fn splitter_bands(config: BandSplitConfig, input: &[f32]) -> Vec<Vec<Vec<f32>>> {
    let mut splitter = BandSplitter::new(config, SR, 1).unwrap();
    let mut bands = vec![vec![vec![0.0; input.len()]; 1]; splitter.band_count()];
    for (start, chunk) in input.chunks(BLOCK).enumerate() {
        let mut block = vec![vec![vec![0.0; chunk.len()]; 1]; splitter.band_count()];
        splitter.split_block(0, chunk, &mut block);
        for (band, data) in block.iter().enumerate() {
            bands[band][0][start * BLOCK..start * BLOCK + chunk.len()].copy_from_slice(&data[0]);
        }
    }
    bands
}

#[test]
fn test_all_bands_bypassed_equals_splitter_sum() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, BLOCK, 1).unwrap();
    for band in 0..3 {
        engine
            .set_parameters(
                band,
                CompressorParameters {
                    threshold_db: -60.0,
                    ratio: 100.0,
                    makeup_gain_db: 12.0,
                    bypass: true,
                    ..Default::default()
                },
            )
            .unwrap();
    }

    let input: Vec<f32> = (0..4096)
        .map(|n| 0.9 * ((n as f32) * 0.05).sin() + 0.3 * ((n as f32) * 0.9).sin())
        .collect();
    let output = render(&mut engine, &input);

    let bands = splitter_bands(BandSplitConfig::default(), &input);
    for (n, &out) in output.iter().enumerate() {
        let mut sum = 0.0_f32;
        for band in &bands {
            sum += band[0][n];
        }
        assert_eq!(out, sum, "sample {}", n);
    }
}

#[test]
fn test_bypassed_band_matches_splitter_output() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, BLOCK, 1).unwrap();
    let squash = CompressorParameters {
        threshold_db: -60.0,
        ratio: 50.0,
        attack_ms: 0.1,
        ..Default::default()
    };
    engine.set_parameters(0, squash).unwrap();
    engine
        .set_parameters(1, CompressorParameters { bypass: true, ..squash })
        .unwrap();
    engine.set_parameters(2, squash).unwrap();

    let input: Vec<f32> = sine(700.0, 0.7, BLOCK * 4);
    let bands = splitter_bands(BandSplitConfig::default(), &input);

    for (block, chunk) in input.chunks(BLOCK).enumerate() {
        let mut channels = [chunk.to_vec()];
        engine.process_channels(&mut channels);

        let mid = engine.band_output(1).unwrap();
        assert_eq!(mid[0], &bands[1][0][block * BLOCK..(block + 1) * BLOCK]);
    }
    assert_eq!(engine.gain_reduction_db(1).unwrap(), 0.0);
    assert!(engine.gain_reduction_db(0).unwrap() > 0.0);
}

// === Lifecycle ===

#[test]
fn test_prepare_is_idempotent() {
    let input: Vec<f32> = sine(440.0, 0.9, 4096);
    let params = CompressorParameters {
        threshold_db: -20.0,
        ratio: 6.0,
        knee_db: 6.0,
        ..Default::default()
    };

    let mut once = MultiBandEngine::default();
    once.prepare(SR, BLOCK, 1).unwrap();
    once.set_parameters(1, params).unwrap();

    let mut twice = MultiBandEngine::default();
    twice.prepare(SR, BLOCK, 1).unwrap();
    twice.set_parameters(1, params).unwrap();
    render(&mut twice, &sine(90.0, 1.0, 2048));
    twice.prepare(SR, BLOCK, 1).unwrap();

    assert_eq!(render(&mut once, &input), render(&mut twice, &input));
}

#[test]
fn test_reprepare_at_new_sample_rate() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(44100.0, 256, 2).unwrap();
    engine.prepare(96000.0, 1024, 1).unwrap();
    assert_eq!(engine.sample_rate(), 96000.0);
    assert_eq!(engine.band_buffer_len(), 1024);
    assert_eq!(engine.num_channels(), 1);

    let mut buffer = AudioBuffer::new(1, 1024, 96000);
    buffer.samples[0][0] = 1.0;
    engine.process(&mut buffer);
    assert!(buffer.is_finite());
}

#[test]
fn test_parameter_updates_from_control_thread() {
    let mut engine = MultiBandEngine::default();
    engine.prepare(SR, 128, 2).unwrap();
    let handle = engine.parameter_handle();
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut i = 0u32;
            while !done.load(Ordering::Relaxed) {
                let band = (i % 3) as usize;
                handle
                    .store(
                        band,
                        CompressorParameters {
                            threshold_db: -((i % 60) as f32),
                            ratio: 1.0 + (i % 20) as f32,
                            knee_db: (i % 12) as f32,
                            ..Default::default()
                        },
                    )
                    .unwrap();
                i = i.wrapping_add(1);
            }
        })
    };

    let input = sine(300.0, 0.8, 128);
    for _ in 0..500 {
        let mut buffer = AudioBuffer::from_channels(vec![input.clone(), input.clone()], 48000).unwrap();
        engine.process(&mut buffer);
        assert!(buffer.is_finite());
    }

    done.store(true, Ordering::Relaxed);
    writer.join().unwrap();
}

// === State ===

#[test]
fn test_state_round_trip_restores_identical_processing() {
    let mut original = MultiBandEngine::new(BandSplitConfig::new(vec![150.0, 3000.0]).unwrap());
    original
        .set_parameters(
            0,
            CompressorParameters {
                threshold_db: -23.7,
                attack_ms: 3.3,
                release_ms: 777.7,
                ratio: 5.0,
                knee_db: 4.2,
                makeup_gain_db: 1.9,
                bypass: false,
            },
        )
        .unwrap();
    original
        .set_parameters(2, CompressorParameters { bypass: true, ..Default::default() })
        .unwrap();
    let bytes = original.serialize_state().unwrap();

    let mut restored = MultiBandEngine::default();
    restored.deserialize_state(&bytes).unwrap();
    assert_eq!(restored.crossovers(), original.crossovers());
    assert_eq!(restored.all_parameters(), original.all_parameters());

    original.prepare(SR, BLOCK, 1).unwrap();
    restored.prepare(SR, BLOCK, 1).unwrap();
    let input = sine(120.0, 0.9, 4096);
    assert_eq!(render(&mut original, &input), render(&mut restored, &input));
}

#[test]
fn test_corrupt_state_resets_to_defaults() {
    let mut engine = MultiBandEngine::default();
    engine
        .set_parameters(1, CompressorParameters { threshold_db: -40.0, ..Default::default() })
        .unwrap();

    let mut bytes = engine.serialize_state().unwrap();
    let last = bytes.len() - 5;
    bytes.truncate(last);

    assert!(engine.deserialize_state(&bytes).is_err());
    assert_eq!(engine.parameters(1).unwrap(), CompressorParameters::default());
}

// === Offline CLI path ===

#[test]
fn test_process_file_with_preset() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.wav");
    let output_path = dir.path().join("out.wav");
    let preset_path = dir.path().join("preset.json");

    let tone = generate_test_tone(1000.0, 0.5, 1.0, 48000);
    let stereo = AudioBuffer::from_channels(vec![tone.samples[0].clone(); 2], 48000).unwrap();
    export_audio(&stereo, &input_path, ExportFormat::new(32)).unwrap();

    let mut preset = MultiBandEngine::default();
    preset
        .set_parameters(
            1,
            CompressorParameters {
                threshold_db: -24.0,
                ratio: 4.0,
                attack_ms: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
    std::fs::write(&preset_path, preset.serialize_state().unwrap()).unwrap();

    let summary = threeband::cli::commands::process_file(
        &input_path,
        &output_path,
        Some(&preset_path),
        256,
        ExportFormat::new(32),
    )
    .unwrap();

    assert_eq!(summary.frames, 48000);
    assert_eq!(summary.channels, 2);
    assert!(summary.max_gain_reduction_db[1] > 6.0);

    let rendered = import_audio(&output_path).unwrap();
    assert_eq!(rendered.len(), 48000);
    assert_eq!(rendered.sample_rate, 48000);
    // Settled level: 13.5 dB of reduction on the mid band
    assert!(peak_db(&rendered.samples[0][24000..]) < -15.0);
    assert_eq!(rendered.samples[0], rendered.samples[1]);
}

#[test]
fn test_process_file_rejects_bad_preset() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.wav");
    let preset_path = dir.path().join("preset.json");

    export_audio(
        &generate_test_tone(440.0, 0.5, 0.1, 44100),
        &input_path,
        ExportFormat::default(),
    )
    .unwrap();
    std::fs::write(&preset_path, b"{ not json").unwrap();

    let result = threeband::cli::commands::process_file(
        &input_path,
        &dir.path().join("out.wav"),
        Some(&preset_path),
        512,
        ExportFormat::default(),
    );
    assert!(result.is_err());
}
