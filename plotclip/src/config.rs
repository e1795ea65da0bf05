use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Deserialize;

/// Plot-name column hint: a single column, or an ordered list whose values
/// are concatenated with `_`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PlotColumnHint {
    Single(String),
    Multi(Vec<String>),
}

/// Explicit run configuration passed into the pipeline, constructed once
/// per run; nothing downstream reads ambient state.
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    pub plot_column: Option<PlotColumnHint>,
    /// Restrict the raster catalog to the lexicographically first image.
    pub single_raster: bool,
    pub season: Option<String>,
    pub experiment: Option<String>,
    pub timestamp: Option<String>,
    pub species: Option<String>,
    pub citation_author: Option<String>,
    pub citation_year: Option<String>,
    pub citation_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExperimentFile {
    #[serde(default)]
    pipeline: Option<PipelineSection>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSection {
    #[serde(default)]
    season: Option<String>,
    #[serde(default, rename = "studyName")]
    study_name: Option<String>,
    #[serde(default, rename = "observationTimeStamp")]
    observation_time_stamp: Option<String>,
    #[serde(default, rename = "germplasmName")]
    germplasm_name: Option<String>,
    #[serde(default)]
    extractors: Option<ExtractorsSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractorsSection {
    #[serde(default)]
    plot_column_name: Option<PlotColumnHint>,
    #[serde(default, rename = "canopyCover")]
    canopy_cover: Option<CitationSection>,
}

#[derive(Debug, Default, Deserialize)]
struct CitationSection {
    #[serde(default, rename = "citationAuthor")]
    citation_author: Option<String>,
    #[serde(default, rename = "citationYear")]
    citation_year: Option<String>,
    #[serde(default, rename = "citationTitle")]
    citation_title: Option<String>,
}

impl ExtractorConfig {
    /// Parse the experiment configuration JSON. A file without a `pipeline`
    /// section yields the defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: ExperimentFile =
            serde_json::from_str(text).context("Failed to parse experiment configuration")?;

        let pipeline = match file.pipeline {
            Some(pipeline) => pipeline,
            None => return Ok(Self::default()),
        };

        let extractors = pipeline.extractors.unwrap_or_default();
        let citation = extractors.canopy_cover.unwrap_or_default();

        Ok(ExtractorConfig {
            plot_column: extractors.plot_column_name,
            single_raster: false,
            season: pipeline.season,
            experiment: pipeline.study_name,
            timestamp: pipeline.observation_time_stamp,
            species: pipeline.germplasm_name,
            citation_author: citation.citation_author,
            citation_year: citation.citation_year,
            citation_title: citation.citation_title,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read configuration file {:?}", path))?;
        Self::from_json(&text)
    }

    /// Best datestamp for the run: the configured timestamp, a date embedded
    /// in the dataset name, or today.
    pub fn resolve_datestamp(&self, dataset_name: &str) -> String {
        self.timestamp
            .as_deref()
            .and_then(find_datestamp)
            .or_else(|| find_datestamp(dataset_name))
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string())
    }
}

/// First valid `YYYY-MM-DD` date embedded in `text`.
pub fn find_datestamp(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if bytes.len() < 10 {
        return None;
    }

    for start in 0..=(bytes.len() - 10) {
        let window = &bytes[start..start + 10];
        let shaped = window.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shaped {
            continue;
        }
        if let Ok(candidate) = std::str::from_utf8(window) {
            if NaiveDate::parse_from_str(candidate, "%Y-%m-%d").is_ok() {
                return Some(candidate.to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_column_hint_parses() {
        let config = ExtractorConfig::from_json(
            r#"{"pipeline": {"extractors": {"plot_column_name": "plot_id"}}}"#,
        )
        .unwrap();
        assert_eq!(config.plot_column, Some(PlotColumnHint::Single("plot_id".into())));
    }

    #[test]
    fn test_column_list_hint_parses() {
        let config = ExtractorConfig::from_json(
            r#"{"pipeline": {"extractors": {"plot_column_name": ["row", "range"]}}}"#,
        )
        .unwrap();
        assert_eq!(
            config.plot_column,
            Some(PlotColumnHint::Multi(vec!["row".into(), "range".into()]))
        );
    }

    #[test]
    fn test_pipeline_fields() {
        let config = ExtractorConfig::from_json(
            r#"{"pipeline": {
                "season": "Season 4",
                "studyName": "Durum Wheat",
                "observationTimeStamp": "2018-05-01T12:00:00",
                "germplasmName": "Triticum durum",
                "extractors": {"canopyCover": {"citationYear": "2018"}}
            }}"#,
        )
        .unwrap();
        assert_eq!(config.season.as_deref(), Some("Season 4"));
        assert_eq!(config.experiment.as_deref(), Some("Durum Wheat"));
        assert_eq!(config.species.as_deref(), Some("Triticum durum"));
        assert_eq!(config.citation_year.as_deref(), Some("2018"));
    }

    #[test]
    fn test_missing_pipeline_section_yields_defaults() {
        let config = ExtractorConfig::from_json(r#"{"other": 1}"#).unwrap();
        assert!(config.plot_column.is_none());
        assert!(config.timestamp.is_none());
    }

    #[test]
    fn test_find_datestamp() {
        assert_eq!(
            find_datestamp("field_2018-05-01__scan3"),
            Some("2018-05-01".to_string())
        );
        assert_eq!(find_datestamp("no date here"), None);
        // An impossible date is not a datestamp
        assert_eq!(find_datestamp("x 2018-13-41 y"), None);
    }

    #[test]
    fn test_resolve_datestamp_prefers_configured_timestamp() {
        let config = ExtractorConfig {
            timestamp: Some("2018-05-01T12:00:00".to_string()),
            ..ExtractorConfig::default()
        };
        assert_eq!(config.resolve_datestamp("other_2017-01-01"), "2018-05-01");
    }

    #[test]
    fn test_resolve_datestamp_falls_back_to_dataset_name() {
        let config = ExtractorConfig::default();
        assert_eq!(config.resolve_datestamp("scan_2017-06-28"), "2017-06-28");
    }
}
