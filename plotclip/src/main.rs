use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use plotclip::config::ExtractorConfig;
use plotclip::pipeline::PlotClipper;
use plotclip::probe::IdentifyProbe;

/// Clip field plots out of georeferenced imagery and report canopy cover.
#[derive(Parser, Debug)]
#[command(name = "plotclip")]
struct Cli {
    /// Input files and directories (plot shapefile, DBF, and imagery)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the CSV files are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Dataset name used for the output file prefix and datestamp lookup;
    /// defaults to the name of the first input directory
    #[arg(long)]
    dataset_name: Option<String>,

    /// Experiment configuration file name looked for among the inputs
    #[arg(long, default_value = "experiment.json")]
    experiment_json_file: String,

    /// Path of the ImageMagick identify binary
    #[arg(long, default_value = "/usr/bin/identify")]
    identify_binary: PathBuf,

    /// Only process the lexicographically first image file
    #[arg(long)]
    single_raster: bool,

    /// File that triggered processing; when it names a shapefile, only that
    /// shapefile is accepted from the inputs
    #[arg(long)]
    trigger: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let files = expand_inputs(&cli.inputs)?;
    let dataset_name = cli
        .dataset_name
        .clone()
        .or_else(|| default_dataset_name(&cli.inputs))
        .unwrap_or_else(|| "dataset".to_string());

    let mut config = load_experiment_config(&files, &cli.experiment_json_file);
    config.single_raster = config.single_raster || cli.single_raster;

    let probe = IdentifyProbe::new(cli.identify_binary);
    let clipper = PlotClipper::new(config, Box::new(probe));
    let summary = clipper.run(&files, &cli.output, &dataset_name, cli.trigger.as_deref())?;

    info!(
        "Processed {} plots against {} image files: {} rows written, {} pairings skipped",
        summary.plots, summary.rasters, summary.rows_written, summary.pairs_skipped
    );
    Ok(())
}

/// Expand directories one level deep into their files and return the whole
/// input set sorted by path.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input)
                .context(format!("Failed to read input directory {:?}", input))?;
            for entry in entries {
                let path = entry
                    .context(format!("Failed to read entry in {:?}", input))?
                    .path();
                if path.is_file() {
                    files.push(path);
                }
            }
        } else {
            files.push(input.clone());
        }
    }

    files.sort();
    Ok(files)
}

/// Dataset name inferred from the first directory input, or from the parent
/// directory of the first file.
fn default_dataset_name(inputs: &[PathBuf]) -> Option<String> {
    let named = |path: &Path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
    };

    for input in inputs {
        if input.is_dir() {
            if let Some(name) = named(input) {
                return Some(name);
            }
        }
    }

    inputs.first().and_then(|f| f.parent()).and_then(named)
}

/// Find and parse the experiment configuration among the inputs. A missing
/// file means defaults; an unparsable file is logged and also means defaults.
fn load_experiment_config(files: &[PathBuf], file_name: &str) -> ExtractorConfig {
    let found = files
        .iter()
        .find(|f| f.file_name().and_then(|n| n.to_str()) == Some(file_name));

    match found {
        Some(path) => match ExtractorConfig::load(path) {
            Ok(config) => {
                info!("Loaded experiment configuration from {:?}", path);
                config
            }
            Err(err) => {
                warn!(
                    "Ignoring unusable experiment configuration {:?}: {:#}",
                    path, err
                );
                ExtractorConfig::default()
            }
        },
        None => ExtractorConfig::default(),
    }
}
