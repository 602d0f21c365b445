//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use log::info;

use crate::dsp::crossover::BandSplitConfig;
use crate::dsp::gain_computer::GainComputer;
use crate::engine::io::{export_audio, import_audio, ExportFormat};
use crate::engine::state::{self, EngineSnapshot};
use crate::engine::MultiBandEngine;
use crate::error::{Result, ThreebandError};
use crate::params::{CompressorParameters, ParamKind, BAND_PARAMETERS};

/// Outcome of an offline render
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSummary {
    pub frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
    /// Largest gain reduction seen per band, in dB
    pub max_gain_reduction_db: Vec<f32>,
}

/// Render `input` through the compressor into `output`
pub fn process_file(
    input: &Path,
    output: &Path,
    preset: Option<&Path>,
    block_size: usize,
    format: ExportFormat,
) -> Result<ProcessSummary> {
    info!("Processing {} -> {}", input.display(), output.display());

    let mut buffer = import_audio(input)?;
    let mut engine = MultiBandEngine::default();

    if let Some(preset_path) = preset {
        info!("Loading preset: {}", preset_path.display());
        let bytes = fs::read(preset_path)?;
        engine.deserialize_state(&bytes)?;
    }

    engine.prepare(f64::from(buffer.sample_rate), block_size, buffer.channels())?;

    let frames = buffer.len();
    let mut max_gain_reduction_db = vec![0.0_f32; engine.band_count()];
    let mut start = 0;
    while start < frames {
        let end = (start + block_size).min(frames);
        let mut block: Vec<&mut [f32]> = buffer
            .samples
            .iter_mut()
            .map(|ch| &mut ch[start..end])
            .collect();
        engine.process_channels(&mut block);

        for (band, max) in max_gain_reduction_db.iter_mut().enumerate() {
            *max = max.max(engine.gain_reduction_db(band)?);
        }
        start = end;
    }

    export_audio(&buffer, output, format)?;

    let summary = ProcessSummary {
        frames,
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate,
        max_gain_reduction_db,
    };
    println!(
        "Processed {} frames ({} ch @ {} Hz) -> {}",
        summary.frames,
        summary.channels,
        summary.sample_rate,
        output.display()
    );
    for (band, reduction) in summary.max_gain_reduction_db.iter().enumerate() {
        println!("  band {}: max gain reduction {:.2} dB", band, reduction);
    }
    Ok(summary)
}

/// Write (or print) a default preset for the given crossovers
pub fn write_preset(output: Option<&Path>, crossovers: Option<Vec<f32>>) -> Result<()> {
    let config = match crossovers {
        Some(freqs) => BandSplitConfig::new(freqs)?,
        None => BandSplitConfig::default(),
    };
    let snapshot = EngineSnapshot {
        bands: vec![CompressorParameters::default(); config.band_count()],
        config,
    };
    let text = state::encode_pretty(&snapshot)?;

    match output {
        Some(path) => {
            fs::write(path, text)?;
            info!("Preset written: {}", path.display());
            println!("Preset written: {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Rows of `(input dB, reduction dB, output dB)` from `from` to `to`
pub fn transfer_curve(
    computer: &GainComputer,
    from: f32,
    to: f32,
    step: f32,
) -> Result<Vec<(f32, f32, f32)>> {
    if step.is_nan() || step <= 0.0 || !from.is_finite() || !to.is_finite() {
        return Err(ThreebandError::InvalidParameter {
            param: "step",
            value: step,
            min: f32::MIN_POSITIVE,
            max: f32::MAX,
        });
    }

    let count = ((to - from) / step).floor().max(-1.0) as i64 + 1;
    Ok((0..count)
        .map(|i| {
            let level = from + i as f32 * step;
            (level, computer.reduction_db(level), computer.output_db(level))
        })
        .collect())
}

/// Print the static curve of one band
pub fn print_curve(
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
    from: f32,
    to: f32,
    step: f32,
) -> Result<()> {
    let params = CompressorParameters {
        threshold_db,
        ratio,
        knee_db,
        ..Default::default()
    };
    params.validate()?;

    let computer = GainComputer::new(threshold_db, ratio, knee_db);
    println!("{:>10} {:>12} {:>10}", "input dB", "reduction dB", "output dB");
    println!("{:-<34}", "");
    for (input, reduction, output) in transfer_curve(&computer, from, to, step)? {
        println!("{:>10.2} {:>12.2} {:>10.2}", input, reduction, output);
    }
    Ok(())
}

/// Print the per-band parameter table
pub fn list_parameters() -> Result<()> {
    println!("Per-band parameters (named band<N>.<key>):");
    println!("{:-<60}", "");
    for descriptor in BAND_PARAMETERS.iter() {
        let range = match descriptor.kind {
            ParamKind::Float {
                min, max, default, ..
            } => format!("{} .. {} (default {})", min, max, default),
            ParamKind::Choice {
                choices,
                default_index,
            } => format!(
                "{:?} (default {})",
                choices,
                choices.get(default_index).copied().unwrap_or_default()
            ),
            ParamKind::Bool { default } => format!("on/off (default {})", default),
        };
        println!(
            "{:<10} {:<12} {:<6} {}",
            descriptor.key, descriptor.name, descriptor.unit, range
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_curve_rows() {
        let computer = GainComputer::new(-20.0, 4.0, 0.0);
        let rows = transfer_curve(&computer, -40.0, 0.0, 10.0).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], (-40.0, 0.0, -40.0));
        let (input, reduction, output) = rows[4];
        assert_eq!(input, 0.0);
        assert!((reduction - 15.0).abs() < 1e-4);
        assert!((output + 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_transfer_curve_rejects_bad_step() {
        let computer = GainComputer::new(-20.0, 4.0, 0.0);
        assert!(transfer_curve(&computer, -40.0, 0.0, 0.0).is_err());
        assert!(transfer_curve(&computer, -40.0, 0.0, f32::NAN).is_err());
        assert!(transfer_curve(&computer, 0.0, -40.0, 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_write_preset_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preset.json");
        write_preset(Some(&path), Some(vec![120.0, 900.0, 5000.0])).unwrap();

        let snapshot = state::decode(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(snapshot.config.crossovers(), &[120.0, 900.0, 5000.0]);
        assert_eq!(snapshot.bands.len(), 4);
    }

    #[test]
    fn test_write_preset_rejects_bad_crossovers() {
        assert!(write_preset(None, Some(vec![2000.0, 200.0])).is_err());
    }
}
