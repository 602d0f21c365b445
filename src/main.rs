//! threeband CLI
//!
//! Offline front end for the multi-band compressor.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::debug;

use threeband::cli::{commands, Cli, Commands};
use threeband::engine::io::ExportFormat;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("threeband v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Process {
            input,
            output,
            preset,
            block_size,
            bit_depth,
        } => {
            commands::process_file(
                &input,
                &output,
                preset.as_deref(),
                block_size,
                ExportFormat::new(bit_depth),
            )
            .with_context(|| format!("processing {}", input.display()))?;
        }
        Commands::Preset { output, crossovers } => {
            commands::write_preset(output.as_deref(), crossovers).context("writing preset")?
        }
        Commands::Curve {
            threshold,
            ratio,
            knee,
            from,
            to,
            step,
        } => commands::print_curve(threshold, ratio, knee, from, to, step)
            .context("printing transfer curve")?,
        Commands::Params => commands::list_parameters()?,
    }

    Ok(())
}
