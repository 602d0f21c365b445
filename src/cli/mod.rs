//! CLI Module
//!
//! Command-line interface for rendering WAV files through the compressor and
//! for inspecting presets, parameters and transfer curves.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-band compressor: offline rendering and preset tools
#[derive(Parser, Debug)]
#[command(name = "threeband-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a WAV file through the compressor
    #[command(name = "process")]
    Process {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Preset (state JSON) to load before processing
        #[arg(short, long)]
        preset: Option<PathBuf>,

        /// Samples per processing block
        #[arg(short, long, default_value_t = 512)]
        block_size: usize,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 24)]
        bit_depth: u16,
    },

    /// Write a preset with default band parameters
    #[command(name = "preset")]
    Preset {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Crossover frequencies in Hz, comma separated
        #[arg(short, long, value_delimiter = ',')]
        crossovers: Option<Vec<f32>>,
    },

    /// Print the static transfer curve of one band
    #[command(name = "curve")]
    Curve {
        #[arg(long, default_value_t = -20.0, allow_hyphen_values = true)]
        threshold: f32,

        #[arg(long, default_value_t = 4.0)]
        ratio: f32,

        #[arg(long, default_value_t = 0.0)]
        knee: f32,

        /// First input level in dB
        #[arg(long, default_value_t = -60.0, allow_hyphen_values = true)]
        from: f32,

        /// Last input level in dB
        #[arg(long, default_value_t = 12.0, allow_hyphen_values = true)]
        to: f32,

        #[arg(long, default_value_t = 6.0)]
        step: f32,
    },

    /// List the per-band parameters
    #[command(name = "params")]
    Params,
}
