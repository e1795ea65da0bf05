pub mod plot;
pub mod raster;

pub use plot::{find_shapefile_pair, AttributeTable, PlotCatalog, PlotRecord};
pub use raster::{RasterCatalog, RasterExtent, RasterTile};
