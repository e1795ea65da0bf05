use log::warn;

use crate::catalog::{PlotRecord, RasterTile};

/// A (plot, raster) pairing whose geometric overlap is strictly positive.
#[derive(Debug, Clone, Copy)]
pub struct Pairing<'a> {
    pub plot: &'a PlotRecord,
    pub raster: &'a RasterTile,
}

/// Pairs every plot against every raster tile, reconciling differing
/// reference systems before intersecting.
///
/// Transforms always operate on a clone of the raster's extent polygon; the
/// catalog's stored geometry is never mutated. A transform that cannot be
/// constructed skips that single pairing and processing continues.
pub fn resolve<'a>(plots: &'a [PlotRecord], rasters: &'a [RasterTile]) -> Vec<Pairing<'a>> {
    let mut pairings = Vec::new();

    for plot in plots {
        for raster in rasters {
            let overlap = match (plot.polygon.reference(), raster.reference) {
                (Some(plot_ref), Some(raster_ref)) if plot_ref != raster_ref => {
                    match raster.extent.transformed_to(&plot_ref) {
                        Ok(extent) => plot.polygon.intersection_area(&extent),
                        Err(err) => {
                            warn!(
                                "Skipping raster {:?} for plot '{}': cannot transform {} to {}: {:#}",
                                raster.path, plot.plot_name, raster_ref, plot_ref, err
                            );
                            continue;
                        }
                    }
                }
                // Equal references, or either side unreferenced: intersect directly
                _ => plot.polygon.intersection_area(&raster.extent),
            };

            if overlap > 0.0 {
                pairings.push(Pairing { plot, raster });
            }
        }
    }

    pairings
}
