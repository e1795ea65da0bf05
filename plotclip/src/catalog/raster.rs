use std::path::{Path, PathBuf};

use gdal::Dataset;
use log::{debug, info, warn};

use crate::geo_core::GeoReference;
use crate::geometry::PlotPolygon;
use crate::probe::{ImageProbe, ProbeOutcome};

/// File extensions that are never an image type; skipped without running
/// the probe.
pub const KNOWN_NON_IMAGE_EXTENSIONS: [&str; 6] = ["dbf", "json", "prj", "shp", "shx", "txt"];

/// Raw raster bounds as read from a file, before polygon construction.
#[derive(Debug, Clone, Copy)]
pub struct RasterExtent {
    pub ulx: f64,
    pub uly: f64,
    pub lrx: f64,
    pub lry: f64,
    pub epsg: Option<i32>,
}

impl RasterExtent {
    pub fn has_nan(&self) -> bool {
        self.ulx.is_nan() || self.uly.is_nan() || self.lrx.is_nan() || self.lry.is_nan()
    }
}

/// A georeferenced image file with its spatial extent.
#[derive(Debug, Clone)]
pub struct RasterTile {
    pub path: PathBuf,
    pub extent: PlotPolygon,
    /// None when the raster's embedded CRS code could not be resolved; such
    /// tiles are intersected directly against plot geometry.
    pub reference: Option<GeoReference>,
}

/// Ordered collection of raster tiles found in an input file list.
///
/// Order is deterministic: lexicographic by path, regardless of the order
/// the files were presented in.
#[derive(Debug, Clone)]
pub struct RasterCatalog {
    tiles: Vec<RasterTile>,
}

impl RasterCatalog {
    /// Scan a file list for image-type rasters with usable geotransforms.
    ///
    /// Known non-image extensions are skipped silently. A probe failure
    /// skips the file with a warning; "not an image" is an expected, silent
    /// exclusion. Files without a resolvable geotransform are excluded with
    /// a log line, never an error.
    pub fn load(files: &[PathBuf], probe: &dyn ImageProbe, single_raster: bool) -> Self {
        let mut entries = Vec::new();

        for file in files {
            let ext = file
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();
            if KNOWN_NON_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }

            match probe.probe(file) {
                Ok(ProbeOutcome::Image) => {}
                Ok(ProbeOutcome::NotImage) => continue,
                Err(err) => {
                    warn!("Image probe failed for {:?}: {:#}", file, err);
                    continue;
                }
            }

            match read_raster_extent(file) {
                Some(extent) => entries.push((file.clone(), extent)),
                None => info!("Excluding {:?}: no usable geotransform", file),
            }
        }

        Self::from_extents(entries, single_raster)
    }

    /// Build the catalog from raw extents: drop NaN bounds, order by path,
    /// and optionally truncate to the first tile.
    pub fn from_extents(entries: Vec<(PathBuf, RasterExtent)>, single_raster: bool) -> Self {
        let mut tiles: Vec<RasterTile> = entries
            .into_iter()
            .filter_map(|(path, extent)| {
                if extent.has_nan() {
                    info!("Excluding {:?}: NaN geotransform bound", path);
                    return None;
                }
                let reference = extent.epsg.map(GeoReference::new);
                Some(RasterTile {
                    extent: PlotPolygon::from_raster_extent(
                        extent.ulx, extent.uly, extent.lrx, extent.lry, reference,
                    ),
                    reference,
                    path,
                })
            })
            .collect();

        tiles.sort_by(|a, b| a.path.cmp(&b.path));

        if single_raster && tiles.len() > 1 {
            info!(
                "Multiple image files were found, only using the first; ignoring {}",
                tiles.len() - 1
            );
            tiles.truncate(1);
        }

        RasterCatalog { tiles }
    }

    pub fn tiles(&self) -> &[RasterTile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Read a raster's corner bounds and CRS code.
///
/// Upper-left comes straight from the geotransform origin; lower-right is
/// origin plus size times resolution. Returns None when the file cannot be
/// opened or has no geotransform.
fn read_raster_extent(path: &Path) -> Option<RasterExtent> {
    let dataset = match Dataset::open(path) {
        Ok(dataset) => dataset,
        Err(err) => {
            debug!("Unable to open {:?} as a raster: {}", path, err);
            return None;
        }
    };

    let transform = match dataset.geo_transform() {
        Ok(transform) => transform,
        Err(err) => {
            debug!("No geotransform in {:?}: {}", path, err);
            return None;
        }
    };

    let (width, height) = dataset.raster_size();
    let [ulx, xres, _, uly, _, yres] = transform;
    let lrx = ulx + (width as f64 * xres);
    let lry = uly + (height as f64 * yres);

    let epsg = dataset
        .spatial_ref()
        .ok()
        .and_then(|sr| sr.auth_code().ok());
    if epsg.is_none() {
        warn!("Failed to resolve an EPSG code for image file {:?}", path);
    }

    Some(RasterExtent {
        ulx,
        uly,
        lrx,
        lry,
        epsg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(ulx: f64) -> RasterExtent {
        RasterExtent {
            ulx,
            uly: 10.0,
            lrx: ulx + 10.0,
            lry: 0.0,
            epsg: Some(32612),
        }
    }

    #[test]
    fn test_extent_polygon_shape() {
        let catalog = RasterCatalog::from_extents(
            vec![(PathBuf::from("/data/a.tif"), extent(0.0))],
            false,
        );
        let tile = &catalog.tiles()[0];
        assert_eq!(tile.extent.point_count(), 5);
        assert!(tile.extent.is_valid());
        assert_eq!(tile.reference, Some(GeoReference::new(32612)));
    }

    #[test]
    fn test_nan_bound_excluded() {
        let bad = RasterExtent {
            ulx: f64::NAN,
            uly: 10.0,
            lrx: 10.0,
            lry: 0.0,
            epsg: Some(32612),
        };
        let catalog = RasterCatalog::from_extents(
            vec![
                (PathBuf::from("/data/a.tif"), extent(0.0)),
                (PathBuf::from("/data/bad.tif"), bad),
            ],
            false,
        );
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_deterministic_lexicographic_order() {
        let catalog = RasterCatalog::from_extents(
            vec![
                (PathBuf::from("/data/c.tif"), extent(20.0)),
                (PathBuf::from("/data/a.tif"), extent(0.0)),
                (PathBuf::from("/data/b.tif"), extent(10.0)),
            ],
            false,
        );
        let paths: Vec<&Path> = catalog.tiles().iter().map(|t| t.path.as_path()).collect();
        assert_eq!(
            paths,
            [
                Path::new("/data/a.tif"),
                Path::new("/data/b.tif"),
                Path::new("/data/c.tif")
            ]
        );
    }

    #[test]
    fn test_single_raster_mode_keeps_first_by_path() {
        let catalog = RasterCatalog::from_extents(
            vec![
                (PathBuf::from("/data/z.tif"), extent(0.0)),
                (PathBuf::from("/data/a.tif"), extent(10.0)),
            ],
            true,
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tiles()[0].path, PathBuf::from("/data/a.tif"));
    }
}
