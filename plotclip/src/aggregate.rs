use geo::Point;

/// Geo-stream CSV column order. Field order and naming are load-bearing for
/// downstream consumers; do not reorder.
pub const GEO_CSV_HEADER: [&str; 8] = [
    "site",
    "trait",
    "lat",
    "lon",
    "dp_time",
    "source",
    "value",
    "timestamp",
];

/// Trait CSV column order, equally load-bearing.
pub const TRAIT_CSV_HEADER: [&str; 9] = [
    "local_datetime",
    "canopy_cover",
    "access_level",
    "species",
    "site",
    "citation_author",
    "citation_year",
    "citation_title",
    "method",
];

/// Label under which the statistic is reported in the geo-stream file.
pub const TRAIT_LABEL: &str = "Canopy Cover";

/// One successfully clipped-and-scored (plot, raster) pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub site: String,
    pub trait_name: String,
    /// Centroid X; written under the `lat` column for downstream
    /// compatibility.
    pub lat: f64,
    /// Centroid Y; written under the `lon` column.
    pub lon: f64,
    pub dp_time: String,
    pub source: String,
    pub value: f64,
    pub timestamp: String,
}

impl ResultRow {
    /// Row values in `GEO_CSV_HEADER` order.
    pub fn geo_csv_record(&self) -> Vec<String> {
        vec![
            self.site.clone(),
            self.trait_name.clone(),
            self.lat.to_string(),
            self.lon.to_string(),
            self.dp_time.clone(),
            self.source.clone(),
            self.value.to_string(),
            self.timestamp.clone(),
        ]
    }
}

/// Fixed trait-file values with their per-run overrides applied, passed
/// into the pipeline as an explicit value.
#[derive(Debug, Clone)]
pub struct TraitDefaults {
    pub access_level: String,
    pub species: String,
    pub citation_author: String,
    pub citation_year: String,
    pub citation_title: String,
    pub method: String,
}

impl Default for TraitDefaults {
    fn default() -> Self {
        TraitDefaults {
            access_level: "2".to_string(),
            species: "Unknown".to_string(),
            citation_author: "\"Zongyang, Li\"".to_string(),
            citation_year: "2016".to_string(),
            citation_title: "Maricopa Field Station Data and Metadata".to_string(),
            method: "Canopy Cover Estimation from RGB images".to_string(),
        }
    }
}

impl TraitDefaults {
    /// Row values in `TRAIT_CSV_HEADER` order for one scored plot.
    pub fn trait_csv_record(
        &self,
        local_datetime: &str,
        canopy_cover: f64,
        site: &str,
    ) -> Vec<String> {
        vec![
            local_datetime.to_string(),
            canopy_cover.to_string(),
            self.access_level.clone(),
            self.species.clone(),
            site.to_string(),
            self.citation_author.clone(),
            self.citation_year.clone(),
            self.citation_title.clone(),
            self.method.clone(),
        ]
    }
}

/// Collects result rows in processing order (plot-major, raster-minor).
///
/// The aggregator is only called for pairings that clipped and scored
/// successfully; failed pairings are logged at the loop boundary and leave
/// no row behind. No deduplication: a plot covered by several rasters
/// produces one row per raster.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    rows: Vec<ResultRow>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        ResultAggregator { rows: Vec::new() }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        plot_name: &str,
        centroid: Point<f64>,
        timestamp: &str,
        source: &str,
        value: f64,
        date: &str,
    ) -> &ResultRow {
        self.rows.push(ResultRow {
            site: plot_name.to_string(),
            trait_name: TRAIT_LABEL.to_string(),
            lat: centroid.x(),
            lon: centroid.y(),
            dp_time: timestamp.to_string(),
            source: source.to_string(),
            value,
            timestamp: date.to_string(),
        });
        self.rows.last().expect("row was just pushed")
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_keep_processing_order() {
        let mut aggregator = ResultAggregator::new();
        aggregator.append("plot_1", Point::new(1.0, 2.0), "t", "src", 10.0, "2018-05-01");
        aggregator.append("plot_2", Point::new(3.0, 4.0), "t", "src", 20.0, "2018-05-01");
        let sites: Vec<&str> = aggregator.rows().iter().map(|r| r.site.as_str()).collect();
        assert_eq!(sites, ["plot_1", "plot_2"]);
    }

    #[test]
    fn test_geo_record_matches_header_order() {
        let mut aggregator = ResultAggregator::new();
        let row = aggregator.append(
            "W-17",
            Point::new(-111.9, 33.07),
            "2018-05-01T12:00:00",
            "http://host/files/abc",
            16.5,
            "2018-05-01",
        );
        let record = row.geo_csv_record();
        assert_eq!(record.len(), GEO_CSV_HEADER.len());
        assert_eq!(record[0], "W-17");
        assert_eq!(record[1], TRAIT_LABEL);
        assert_eq!(record[2], "-111.9");
        assert_eq!(record[3], "33.07");
        assert_eq!(record[6], "16.5");
        assert_eq!(record[7], "2018-05-01");
    }

    #[test]
    fn test_trait_record_matches_header_order() {
        let defaults = TraitDefaults::default();
        let record = defaults.trait_csv_record("2018-05-01T12:00:00", 42.0, "W-17");
        assert_eq!(record.len(), TRAIT_CSV_HEADER.len());
        assert_eq!(record[0], "2018-05-01T12:00:00");
        assert_eq!(record[1], "42");
        assert_eq!(record[2], "2");
        assert_eq!(record[4], "W-17");
        assert_eq!(record[8], "Canopy Cover Estimation from RGB images");
    }

    #[test]
    fn test_overrides_flow_into_trait_record() {
        let defaults = TraitDefaults {
            species: "Sorghum bicolor".to_string(),
            citation_year: "2018".to_string(),
            ..TraitDefaults::default()
        };
        let record = defaults.trait_csv_record("t", 1.0, "s");
        assert_eq!(record[3], "Sorghum bicolor");
        assert_eq!(record[6], "2018");
    }
}
