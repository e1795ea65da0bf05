use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use log::warn;

use crate::config::PlotColumnHint;
use crate::error::ExtractError;
use crate::geo_core::GeoReference;
use crate::geometry::PlotPolygon;

/// One shapefile feature with its resolved name.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotRecord {
    pub plot_name: String,
    pub polygon: PlotPolygon,
    /// 1-based feature index in shapefile iteration order.
    pub sequence_index: usize,
}

/// In-memory attribute table: named columns over string-coerced rows.
///
/// Column lookups are case-insensitive; DBF readers commonly fold column
/// names to lower case, which would otherwise make literal matches like
/// `observationUnitName` impossible.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl AttributeTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        AttributeTable { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|v| v.as_deref())
    }
}

/// Ordered collection of plot records loaded from a shapefile.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotCatalog {
    records: Vec<PlotRecord>,
}

impl PlotCatalog {
    /// Load a shapefile's geometry layer, pair it with an optional attribute
    /// table, and resolve per-plot names.
    ///
    /// An unreadable shapefile is fatal. An unreadable attribute table falls
    /// back to default plot naming, matching the behavior when no table is
    /// supplied at all.
    pub fn load(
        shapefile: &Path,
        attribute_table: Option<&Path>,
        hint: Option<&PlotColumnHint>,
    ) -> Result<Self, ExtractError> {
        let polygons = read_shapefile_polygons(shapefile)?;
        if polygons.is_empty() {
            return Err(ExtractError::NoGeometry {
                path: shapefile.to_path_buf(),
            });
        }

        let table = match attribute_table {
            Some(path) => match read_attribute_table(path) {
                Ok(table) => Some(table),
                Err(err) => {
                    warn!(
                        "Unable to read attribute table {:?}: {:#}; using default plot naming",
                        path, err
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Self::from_parts(polygons, table.as_ref(), hint))
    }

    /// Build the catalog from already-loaded parts. Naming rules:
    ///
    /// 1. caller-supplied column hint (single name, or a list concatenated
    ///    with `_`, skipping missing values);
    /// 2. a column named `observationUnitName`;
    /// 3. the first column containing `plot` and either `name` or `id`;
    /// 4. a column named `id`;
    /// 5. synthesized `plot_N` (1-based feature index).
    ///
    /// Attribute rows are consumed in lockstep with the features; if the
    /// table runs out first the remaining features get synthesized names and
    /// the mismatch is logged once.
    pub fn from_parts(
        polygons: Vec<PlotPolygon>,
        table: Option<&AttributeTable>,
        hint: Option<&PlotColumnHint>,
    ) -> Self {
        let name_columns = table.and_then(|t| resolve_name_columns(t, hint));
        let mut records = Vec::with_capacity(polygons.len());
        let mut mismatch_logged = false;

        for (index, polygon) in polygons.into_iter().enumerate() {
            let sequence_index = index + 1;

            let mut plot_name = None;
            if let (Some(table), Some(columns)) = (table, name_columns.as_ref()) {
                if index < table.row_count() {
                    plot_name = compose_plot_name(table, index, columns);
                } else if !mismatch_logged {
                    warn!(
                        "Attribute table has {} rows but the shapefile has more features; \
                         synthesizing names for the remainder",
                        table.row_count()
                    );
                    mismatch_logged = true;
                }
            }

            records.push(PlotRecord {
                plot_name: plot_name.unwrap_or_else(|| format!("plot_{}", sequence_index)),
                polygon,
                sequence_index,
            });
        }

        PlotCatalog { records }
    }

    pub fn records(&self) -> &[PlotRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Resolve the plot-name column(s) for a table, honoring the hint first.
fn resolve_name_columns(table: &AttributeTable, hint: Option<&PlotColumnHint>) -> Option<Vec<usize>> {
    if let Some(hint) = hint {
        let names: Vec<&str> = match hint {
            PlotColumnHint::Single(name) => vec![name.as_str()],
            PlotColumnHint::Multi(names) => names.iter().map(|n| n.as_str()).collect(),
        };
        let found: Vec<usize> = names
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect();
        if !found.is_empty() {
            return Some(found);
        }
        warn!("Plot name column hint does not match any attribute table column");
    }

    if let Some(index) = table.column_index("observationUnitName") {
        return Some(vec![index]);
    }

    for (index, name) in table.columns().iter().enumerate() {
        let lower = name.to_ascii_lowercase();
        if lower.contains("plot") && (lower.contains("name") || lower.contains("id")) {
            return Some(vec![index]);
        }
    }

    table.column_index("id").map(|index| vec![index])
}

/// Concatenate the named column values for one row with `_`, skipping
/// missing or empty values. Returns None when nothing remains.
fn compose_plot_name(table: &AttributeTable, row: usize, columns: &[usize]) -> Option<String> {
    let parts: Vec<&str> = columns
        .iter()
        .filter_map(|&column| table.value(row, column))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("_"))
    }
}

/// Select the shapefile and its matching DBF file from a file list.
///
/// A triggering shapefile takes priority over any other shapefile present.
/// A DBF file is only accepted when its basename matches the chosen
/// shapefile (or the triggering file when no shapefile has been seen yet).
pub fn find_shapefile_pair(
    files: &[PathBuf],
    triggering: Option<&Path>,
) -> (Option<PathBuf>, Option<PathBuf>) {
    let mut shapefile: Option<PathBuf> = None;
    let mut dbffile: Option<PathBuf> = None;

    for file in files {
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if ext == "shp" {
            if triggering.map_or(true, |t| t.file_name() == file.file_name()) {
                shapefile = Some(file.clone());
                // A DBF seen earlier must match the shapefile we settled on
                if let Some(existing) = &dbffile {
                    if !stems_match(existing, file) {
                        dbffile = None;
                    }
                }
            }
        } else if ext == "dbf" {
            let matches_shapefile = shapefile
                .as_ref()
                .map_or(false, |shp| stems_match(file, shp));
            let matches_trigger = triggering.map_or(false, |t| stems_match(file, t));
            if matches_shapefile || triggering.is_none() || matches_trigger {
                dbffile = Some(file.clone());
            }
        }
    }

    (shapefile, dbffile)
}

fn stems_match(a: &Path, b: &Path) -> bool {
    match (a.file_stem(), b.file_stem()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn read_shapefile_polygons(path: &Path) -> Result<Vec<PlotPolygon>, ExtractError> {
    let dataset = Dataset::open(path).map_err(|source| ExtractError::ShapefileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut layer = dataset
        .layer(0)
        .map_err(|source| ExtractError::ShapefileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let reference = layer
        .spatial_ref()
        .and_then(|sr| sr.auth_code().ok())
        .map(GeoReference::new);

    let mut polygons = Vec::new();
    for feature in layer.features() {
        let geometry = match feature.geometry() {
            Some(geometry) => geometry,
            None => continue,
        };
        let geo_geometry = match geometry.to_geo() {
            Ok(geo_geometry) => geo_geometry,
            Err(err) => {
                warn!("Skipping unreadable feature geometry in {:?}: {}", path, err);
                continue;
            }
        };

        let polygon = match geo_geometry {
            geo::Geometry::Polygon(polygon) => Some(polygon),
            geo::Geometry::MultiPolygon(multi) => {
                // A multi-part plot is reduced to its largest part
                use geo::Area;
                multi
                    .into_iter()
                    .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
            }
            _ => {
                warn!("Skipping non-polygon feature in {:?}", path);
                None
            }
        };

        if let Some(polygon) = polygon {
            let plot = PlotPolygon::new(polygon, reference);
            if plot
                .ring()
                .exterior()
                .0
                .iter()
                .any(|c| c.x.is_nan() || c.y.is_nan())
            {
                warn!("Excluding feature with NaN coordinates in {:?}", path);
                continue;
            }
            polygons.push(plot);
        }
    }

    Ok(polygons)
}

fn read_attribute_table(path: &Path) -> Result<AttributeTable> {
    let dataset =
        Dataset::open(path).context(format!("Failed to open attribute table {:?}", path))?;
    let mut layer = dataset
        .layer(0)
        .context(format!("Attribute table {:?} has no readable layer", path))?;

    let columns: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();

    let mut rows = Vec::new();
    for feature in layer.features() {
        let mut row = Vec::with_capacity(columns.len());
        for (_name, value) in feature.fields() {
            row.push(value.and_then(field_value_to_string));
        }
        rows.push(row);
    }

    Ok(AttributeTable::new(columns, rows))
}

fn field_value_to_string(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::StringValue(s) => Some(s),
        FieldValue::IntegerValue(v) => Some(v.to_string()),
        FieldValue::Integer64Value(v) => Some(v.to_string()),
        FieldValue::RealValue(v) => Some(v.to_string()),
        _ => None,
    }
}
