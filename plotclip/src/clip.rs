use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gdal::Dataset;
use thiserror::Error;

use crate::geo_core::BoundingBox;

/// Per-pair clip failure. Non-fatal to the run: the caller logs it and
/// moves on to the next (plot, raster) pairing.
#[derive(Debug, Error)]
pub enum ClipFailure {
    #[error("crop window lies entirely outside the raster")]
    OutOfBounds,

    #[error("raster has {0} band(s), expected at least 3")]
    TooFewBands(usize),

    #[error("raster read failed: {0}")]
    Read(#[from] gdal::errors::GdalError),
}

/// Clipped pixel data stored in (row, col, channel) order.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    rows: usize,
    cols: usize,
    channels: usize,
    data: Vec<f64>,
}

impl PixelBuffer {
    pub fn new(rows: usize, cols: usize, channels: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols * channels);
        PixelBuffer {
            rows,
            cols,
            channels,
            data,
        }
    }

    fn zeroed(rows: usize, cols: usize, channels: usize) -> Self {
        PixelBuffer {
            rows,
            cols,
            channels,
            data: vec![0.0; rows * cols * channels],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total element count, channel axis included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize, channel: usize) -> f64 {
        self.data[(row * self.cols + col) * self.channels + channel]
    }

    fn set(&mut self, row: usize, col: usize, channel: usize, value: f64) {
        self.data[(row * self.cols + col) * self.channels + channel] = value;
    }
}

/// Read-only cache of open raster datasets.
///
/// A raster is opened once per run and serves every windowed read that
/// follows, instead of being reopened for each (plot, raster) pairing.
#[derive(Default)]
pub struct RasterCache {
    open: HashMap<PathBuf, Dataset>,
}

impl RasterCache {
    pub fn new() -> Self {
        RasterCache {
            open: HashMap::new(),
        }
    }

    fn dataset(&mut self, path: &Path) -> Result<&Dataset, gdal::errors::GdalError> {
        match self.open.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(Dataset::open(path)?)),
        }
    }
}

/// Executes clip requests against raster pixel data.
pub struct ClipEngine {
    cache: RasterCache,
}

impl ClipEngine {
    pub fn new() -> Self {
        ClipEngine {
            cache: RasterCache::new(),
        }
    }

    /// Clip the raster at `path` to the pixel window covering `bounds`.
    ///
    /// Band data is read per channel and assembled in (row, col, channel)
    /// order. Reading never mutates the source raster.
    pub fn clip(&mut self, path: &Path, bounds: &BoundingBox) -> Result<PixelBuffer, ClipFailure> {
        let dataset = self.cache.dataset(path)?;

        let transform = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();
        let (xoff, yoff, win_w, win_h) =
            pixel_window(&transform, width, height, bounds).ok_or(ClipFailure::OutOfBounds)?;

        let channels = dataset.raster_count();
        if channels < 3 {
            return Err(ClipFailure::TooFewBands(channels));
        }

        let mut buffer = PixelBuffer::zeroed(win_h, win_w, channels);
        for channel in 0..channels {
            let band = dataset.rasterband(channel + 1)?;
            let band_data = band.read_as::<f64>(
                (xoff as isize, yoff as isize),
                (win_w, win_h),
                (win_w, win_h),
                None,
            )?;
            for row in 0..win_h {
                for col in 0..win_w {
                    buffer.set(row, col, channel, band_data.data()[row * win_w + col]);
                }
            }
        }

        Ok(buffer)
    }
}

impl Default for ClipEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a geographic bounding box into a pixel-space crop window.
///
/// The window is clamped to the raster; None means the box lies entirely
/// outside. Handles the usual north-up negative y-resolution as well as
/// positive resolutions.
fn pixel_window(
    transform: &[f64; 6],
    width: usize,
    height: usize,
    bounds: &BoundingBox,
) -> Option<(usize, usize, usize, usize)> {
    let [ulx, xres, _, uly, _, yres] = *transform;
    if xres == 0.0 || yres == 0.0 {
        return None;
    }

    let c1 = (bounds.min_x - ulx) / xres;
    let c2 = (bounds.max_x - ulx) / xres;
    let r1 = (bounds.min_y - uly) / yres;
    let r2 = (bounds.max_y - uly) / yres;

    let col_min = c1.min(c2).floor();
    let col_max = c1.max(c2).ceil();
    let row_min = r1.min(r2).floor();
    let row_max = r1.max(r2).ceil();

    if col_max <= 0.0 || row_max <= 0.0 || col_min >= width as f64 || row_min >= height as f64 {
        return None;
    }

    let xoff = col_min.max(0.0) as usize;
    let yoff = row_min.max(0.0) as usize;
    let xend = (col_max as usize).min(width);
    let yend = (row_max as usize).min(height);

    if xend <= xoff || yend <= yoff {
        return None;
    }

    Some((xoff, yoff, xend - xoff, yend - yoff))
}

#[cfg(test)]
mod tests {
    use super::*;

    // North-up raster: origin (100, 200), 1m pixels, 100x100
    const TRANSFORM: [f64; 6] = [100.0, 1.0, 0.0, 200.0, 0.0, -1.0];

    #[test]
    fn test_window_inside_raster() {
        let bounds = BoundingBox::new(110.0, 180.0, 120.0, 190.0);
        let window = pixel_window(&TRANSFORM, 100, 100, &bounds);
        assert_eq!(window, Some((10, 10, 10, 10)));
    }

    #[test]
    fn test_window_clamped_to_raster_edge() {
        let bounds = BoundingBox::new(95.0, 195.0, 105.0, 205.0);
        let window = pixel_window(&TRANSFORM, 100, 100, &bounds);
        assert_eq!(window, Some((0, 0, 5, 5)));
    }

    #[test]
    fn test_window_entirely_outside() {
        let bounds = BoundingBox::new(500.0, 180.0, 510.0, 190.0);
        assert_eq!(pixel_window(&TRANSFORM, 100, 100, &bounds), None);
    }

    #[test]
    fn test_window_degenerate_transform() {
        let bad = [100.0, 0.0, 0.0, 200.0, 0.0, -1.0];
        let bounds = BoundingBox::new(110.0, 180.0, 120.0, 190.0);
        assert_eq!(pixel_window(&bad, 100, 100, &bounds), None);
    }

    #[test]
    fn test_pixel_buffer_layout() {
        // 2 rows x 2 cols x 3 channels, (row, col, channel) order
        let data = vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0,
        ];
        let buffer = PixelBuffer::new(2, 2, 3, data);
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.get(0, 1, 0), 1.0);
        assert_eq!(buffer.get(1, 1, 2), 1.0);
        assert_eq!(buffer.get(1, 0, 1), 0.0);
    }
}
