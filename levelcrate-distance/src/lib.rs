//! # levelcrate distance maps
//!
//! Signed distance map builders used to (re)initialise the implicit function
//! of a level-set evolution.
//!
//! Four interchangeable methods are provided, all negative inside and all
//! overwriting the whole grid:
//! - [`Curves`]: discrete ±½ front relaxed by whole-grid sweeps
//! - [`FastMarching`]: sub-voxel front marched with an eikonal solver
//! - [`Chamfer`]: two raster passes with 3x3x3 weighted masks
//! - [`ShapeDistance`]: Danielsson propagation combined with a skeleton image

pub mod chamfer;
pub mod curves;
pub mod fast_marching;
pub mod front;
pub mod neighborhood;
pub mod propagation;
pub mod shape;

pub use chamfer::*;
pub use curves::*;
pub use fast_marching::*;
pub use front::{binarize, detect_front, subvoxel_front};
pub use propagation::propagate_nearest;
pub use shape::*;

use levelcrate_core::{DistanceMapBuilder, DistanceMethod, DistanceReport, Error, GridGeometry, Result};

/// Rebuild `field` as a signed distance map with the selected method
///
/// The shape method needs a skeleton mask; `shape_min_dist` is ignored by the
/// other methods.
pub fn distance_map(
    method: DistanceMethod,
    geometry: &GridGeometry,
    field: &mut [f32],
    skeleton: Option<&[u8]>,
    shape_min_dist: f32,
) -> Result<DistanceReport> {
    match method {
        DistanceMethod::Curves => Curves.build(geometry, field),
        DistanceMethod::FastMarching => FastMarching.build(geometry, field),
        DistanceMethod::Chamfer => Chamfer.build(geometry, field),
        DistanceMethod::Shape => {
            let skeleton = skeleton.ok_or_else(|| {
                Error::InvalidConfiguration(
                    "shape-based distance map requires a skeleton image".to_string(),
                )
            })?;
            ShapeDistance::new(skeleton, shape_min_dist).build(geometry, field)
        }
    }
}
