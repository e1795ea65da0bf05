use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};

use crate::aggregate::{ResultAggregator, TraitDefaults, GEO_CSV_HEADER, TRAIT_CSV_HEADER};
use crate::catalog::{find_shapefile_pair, PlotCatalog, RasterCatalog};
use crate::clip::ClipEngine;
use crate::config::ExtractorConfig;
use crate::csv_sink::append_csv_rows;
use crate::error::ExtractError;
use crate::overlap;
use crate::probe::ImageProbe;
use crate::stats::canopy_cover_ratio;

/// Counts reported after a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub plots: usize,
    pub rasters: usize,
    pub pairings: usize,
    pub rows_written: usize,
    pub pairs_skipped: usize,
}

/// The whole extraction pipeline behind one entry point.
///
/// Every run is driven by an explicit `ExtractorConfig`; nothing here reads
/// ambient state. Per-pair failures are logged and skipped; only missing or
/// unreadable plot geometry aborts a run.
pub struct PlotClipper {
    config: ExtractorConfig,
    probe: Box<dyn ImageProbe>,
}

impl PlotClipper {
    pub fn new(config: ExtractorConfig, probe: Box<dyn ImageProbe>) -> Self {
        PlotClipper { config, probe }
    }

    /// Process one dataset: locate the plot shapefile, catalog the rasters,
    /// clip every overlapping (plot, raster) pairing, and append the scored
    /// rows to the two CSV files under `output_dir`.
    ///
    /// When `triggering` names a shapefile, only that shapefile is accepted
    /// from the input set.
    pub fn run(
        &self,
        files: &[PathBuf],
        output_dir: &Path,
        dataset_name: &str,
        triggering: Option<&Path>,
    ) -> Result<RunSummary> {
        let (shapefile, dbffile) = find_shapefile_pair(files, triggering);
        let shapefile = shapefile.ok_or(ExtractError::NoShapefile)?;

        let rasters =
            RasterCatalog::load(files, self.probe.as_ref(), self.config.single_raster);
        if rasters.is_empty() {
            info!("No image files with geographic boundaries found; nothing to do");
            return Ok(RunSummary::default());
        }

        let plots = PlotCatalog::load(
            &shapefile,
            dbffile.as_deref(),
            self.config.plot_column.as_ref(),
        )?;
        info!(
            "Have {} plots and {} image files to process",
            plots.len(),
            rasters.len()
        );

        let datestamp = self.config.resolve_datestamp(dataset_name);
        let timestamp = self
            .config
            .timestamp
            .clone()
            .unwrap_or_else(|| datestamp.clone());
        let defaults = self.trait_defaults(&datestamp);

        let pairings = overlap::resolve(plots.records(), rasters.tiles());
        let mut summary = RunSummary {
            plots: plots.len(),
            rasters: rasters.len(),
            pairings: pairings.len(),
            ..RunSummary::default()
        };

        let mut engine = ClipEngine::new();
        let mut aggregator = ResultAggregator::new();

        for pairing in &pairings {
            let plot = pairing.plot;
            let raster = pairing.raster;

            // The crop window lives in the raster's coordinate space
            let clip_polygon = match (plot.polygon.reference(), raster.reference) {
                (Some(plot_ref), Some(raster_ref)) if plot_ref != raster_ref => {
                    match plot.polygon.transformed_to(&raster_ref) {
                        Ok(polygon) => polygon,
                        Err(err) => {
                            warn!(
                                "Skipping plot '{}' for {:?}: cannot transform plot geometry: {:#}",
                                plot.plot_name, raster.path, err
                            );
                            summary.pairs_skipped += 1;
                            continue;
                        }
                    }
                }
                _ => plot.polygon.clone(),
            };

            let buffer = match engine.clip(&raster.path, &clip_polygon.bounding_box()) {
                Ok(buffer) => buffer,
                Err(err) => {
                    warn!(
                        "Skipping plot '{}' for {:?}: {}",
                        plot.plot_name, raster.path, err
                    );
                    summary.pairs_skipped += 1;
                    continue;
                }
            };

            let centroid = match plot.polygon.centroid() {
                Some(centroid) => centroid,
                None => {
                    warn!(
                        "Skipping plot '{}': degenerate geometry has no centroid",
                        plot.plot_name
                    );
                    summary.pairs_skipped += 1;
                    continue;
                }
            };

            let ratio = canopy_cover_ratio(&buffer);
            aggregator.append(
                &plot.plot_name,
                centroid,
                &timestamp,
                &raster.path.display().to_string(),
                ratio,
                &datestamp,
            );
        }

        summary.rows_written = aggregator.len();

        let geo_rows: Vec<Vec<String>> = aggregator
            .rows()
            .iter()
            .map(|row| row.geo_csv_record())
            .collect();
        let trait_rows: Vec<Vec<String>> = aggregator
            .rows()
            .iter()
            .map(|row| defaults.trait_csv_record(&timestamp, row.value, &row.site))
            .collect();

        append_csv_rows(
            &geo_csv_path(output_dir, dataset_name),
            &GEO_CSV_HEADER,
            &geo_rows,
        )?;
        append_csv_rows(
            &trait_csv_path(output_dir, dataset_name),
            &TRAIT_CSV_HEADER,
            &trait_rows,
        )?;

        info!(
            "Wrote {} rows ({} pairings skipped)",
            summary.rows_written, summary.pairs_skipped
        );
        Ok(summary)
    }

    /// Trait-file defaults with the per-run configuration applied. The
    /// citation year falls back to the year of the datestamp.
    fn trait_defaults(&self, datestamp: &str) -> TraitDefaults {
        let mut defaults = TraitDefaults::default();

        if let Some(species) = &self.config.species {
            defaults.species = species.clone();
        }
        if let Some(author) = &self.config.citation_author {
            defaults.citation_author = author.clone();
        }
        if let Some(title) = &self.config.citation_title {
            defaults.citation_title = title.clone();
        }
        defaults.citation_year = match &self.config.citation_year {
            Some(year) => year.clone(),
            None => datestamp.chars().take(4).collect(),
        };

        defaults
    }
}

pub fn geo_csv_path(output_dir: &Path, dataset_name: &str) -> PathBuf {
    output_dir.join(format!("{}_canopycover_geo.csv", dataset_name))
}

pub fn trait_csv_path(output_dir: &Path, dataset_name: &str) -> PathBuf {
    output_dir.join(format!("{}_canopycover.csv", dataset_name))
}
