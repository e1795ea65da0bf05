use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that abort an extraction run.
///
/// Per-pair clip and score failures never appear here: they are handled at
/// the loop boundary as log-and-skip (see `pipeline`).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no shapefile found among the input files")]
    NoShapefile,

    #[error("unable to open shapefile layer {path:?}: {source}")]
    ShapefileUnreadable {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("shapefile {path:?} contains no usable geometry")]
    NoGeometry { path: PathBuf },
}
