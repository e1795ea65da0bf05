use anyhow::{Context, Result};
use geo::Point;
use proj::Proj;

/// Coordinate reference system identified by an EPSG code.
///
/// Two references are interchangeable without a transform iff their codes
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoReference {
    epsg: i32,
}

impl GeoReference {
    pub fn new(epsg: i32) -> Self {
        GeoReference { epsg }
    }

    pub fn epsg(&self) -> i32 {
        self.epsg
    }

    /// Build a PROJ transform from this reference into `target`.
    ///
    /// Construction fails for CRS pairings PROJ cannot resolve; callers
    /// treat that as a skippable condition, not a panic.
    pub fn transform_to(&self, target: &GeoReference) -> Result<Proj> {
        let from_crs = format!("EPSG:{}", self.epsg);
        let to_crs = format!("EPSG:{}", target.epsg);

        Proj::new_known_crs(&from_crs, &to_crs, None).context(format!(
            "Failed to create transform from {} to {}",
            from_crs, to_crs
        ))
    }

    /// Transform a single point into `target`.
    pub fn transform_point(&self, target: &GeoReference, point: Point<f64>) -> Result<Point<f64>> {
        let proj = self.transform_to(target)?;
        let (x, y) = proj
            .convert((point.x(), point.y()))
            .context("Failed to transform coordinates")?;
        Ok(Point::new(x, y))
    }
}

impl std::fmt::Display for GeoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// True if any bound component is NaN (e.g. a raster without a usable
    /// geotransform).
    pub fn has_nan(&self) -> bool {
        self.min_x.is_nan() || self.min_y.is_nan() || self.max_x.is_nan() || self.max_y.is_nan()
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Transform the box corners into another reference system.
    pub fn transform(&self, from: &GeoReference, to: &GeoReference) -> Result<Self> {
        let proj = from.transform_to(to)?;
        let (min_x, min_y) = proj
            .convert((self.min_x, self.min_y))
            .context("Failed to transform bounding box corner")?;
        let (max_x, max_y) = proj
            .convert((self.max_x, self.max_y))
            .context("Failed to transform bounding box corner")?;

        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }
}
