use anyhow::{Context, Result};
use geo::{Area, BooleanOps, Centroid, Coord, LineString, Point, Polygon};

use crate::geo_core::{BoundingBox, GeoReference};

/// A closed plot or raster-extent polygon with an optional reference system.
///
/// The stored ring is immutable: reference-system transforms always produce
/// a new polygon and never touch the original.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotPolygon {
    ring: Polygon<f64>,
    reference: Option<GeoReference>,
}

impl PlotPolygon {
    pub fn new(ring: Polygon<f64>, reference: Option<GeoReference>) -> Self {
        PlotPolygon { ring, reference }
    }

    /// Build the extent polygon of a raster from its upper-left and
    /// lower-right corners.
    ///
    /// The ring starts at the upper-left corner, proceeds clockwise, and is
    /// closed: first and last point are the same (5 points total).
    pub fn from_raster_extent(
        ulx: f64,
        uly: f64,
        lrx: f64,
        lry: f64,
        reference: Option<GeoReference>,
    ) -> Self {
        let ring = LineString::from(vec![
            (ulx, uly), // upper left
            (lrx, uly), // upper right
            (lrx, lry), // lower right
            (ulx, lry), // lower left
            (ulx, uly), // closing the polygon
        ]);

        PlotPolygon {
            ring: Polygon::new(ring, vec![]),
            reference,
        }
    }

    pub fn reference(&self) -> Option<GeoReference> {
        self.reference
    }

    pub fn ring(&self) -> &Polygon<f64> {
        &self.ring
    }

    /// Number of points in the exterior ring, closing point included.
    pub fn point_count(&self) -> usize {
        self.ring.exterior().0.len()
    }

    /// A polygon is usable when its ring is closed, has at least four
    /// distinct corners, and carries no NaN coordinate.
    pub fn is_valid(&self) -> bool {
        let exterior = self.ring.exterior();
        if !exterior.is_closed() || exterior.0.len() < 5 {
            return false;
        }
        !exterior.0.iter().any(|c| c.x.is_nan() || c.y.is_nan())
    }

    pub fn area(&self) -> f64 {
        self.ring.unsigned_area()
    }

    pub fn centroid(&self) -> Option<Point<f64>> {
        self.ring.centroid()
    }

    /// Axis-aligned bounding box of the exterior ring.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for coord in &self.ring.exterior().0 {
            min_x = min_x.min(coord.x);
            min_y = min_y.min(coord.y);
            max_x = max_x.max(coord.x);
            max_y = max_y.max(coord.y);
        }

        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    /// Area of the geometric intersection with `other`. Touching or adjacent
    /// polygons intersect with zero area.
    pub fn intersection_area(&self, other: &PlotPolygon) -> f64 {
        self.ring.intersection(&other.ring).unsigned_area()
    }

    /// Return a copy of this polygon transformed into `target`.
    ///
    /// If the polygon already carries `target` the clone is returned as-is.
    /// A polygon without a reference system cannot be transformed.
    pub fn transformed_to(&self, target: &GeoReference) -> Result<PlotPolygon> {
        let source = self
            .reference
            .context("Polygon has no reference system to transform from")?;

        if source == *target {
            return Ok(self.clone());
        }

        let proj = source.transform_to(target)?;
        let mut coords = Vec::with_capacity(self.ring.exterior().0.len());
        for coord in &self.ring.exterior().0 {
            let (x, y) = proj
                .convert((coord.x, coord.y))
                .context("Failed to transform polygon vertex")?;
            coords.push(Coord { x, y });
        }

        Ok(PlotPolygon {
            ring: Polygon::new(LineString::from(coords), vec![]),
            reference: Some(*target),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> PlotPolygon {
        PlotPolygon::from_raster_extent(min, max, max, min, Some(GeoReference::new(32612)))
    }

    #[test]
    fn test_extent_polygon_is_closed_with_five_points() {
        let poly = square(0.0, 10.0);
        assert_eq!(poly.point_count(), 5);
        let exterior = poly.ring().exterior();
        assert_eq!(exterior.0.first(), exterior.0.last());
        assert!(poly.is_valid());
        assert!(poly.area() > 0.0);
    }

    #[test]
    fn test_nan_coordinate_is_invalid() {
        let poly =
            PlotPolygon::from_raster_extent(f64::NAN, 10.0, 10.0, 0.0, None);
        assert!(!poly.is_valid());
    }

    #[test]
    fn test_bounding_box() {
        let poly = square(2.0, 8.0);
        let bbox = poly.bounding_box();
        assert_eq!(bbox.min_x, 2.0);
        assert_eq!(bbox.max_y, 8.0);
    }

    #[test]
    fn test_overlap_area() {
        // Plot (0,0)-(10,10) against raster extent (5,5)-(15,15): the
        // overlap is the 5x5 square.
        let plot = square(0.0, 10.0);
        let raster = square(5.0, 15.0);
        let area = plot.intersection_area(&raster);
        assert!((area - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_adjacent_polygons_have_zero_overlap() {
        let left = square(0.0, 10.0);
        let right = PlotPolygon::from_raster_extent(
            10.0,
            10.0,
            20.0,
            0.0,
            Some(GeoReference::new(32612)),
        );
        assert_eq!(left.intersection_area(&right), 0.0);
    }

    #[test]
    fn test_centroid() {
        let poly = square(0.0, 10.0);
        let centroid = poly.centroid().unwrap();
        assert!((centroid.x() - 5.0).abs() < 1e-9);
        assert!((centroid.y() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_same_reference_is_identity() {
        let poly = square(0.0, 10.0);
        let copy = poly.transformed_to(&GeoReference::new(32612)).unwrap();
        assert_eq!(copy.point_count(), poly.point_count());
        assert_eq!(copy.reference(), poly.reference());
    }

    #[test]
    fn test_transform_without_reference_fails() {
        let poly = PlotPolygon::from_raster_extent(0.0, 1.0, 1.0, 0.0, None);
        assert!(poly.transformed_to(&GeoReference::new(4326)).is_err());
    }
}
