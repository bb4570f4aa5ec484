//! Core traits for levelcrate

use crate::{DistanceMethod, GridGeometry, Result};

/// Summary of one distance-map rebuild
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceReport {
    pub method: DistanceMethod,
    /// Voxels adjacent to a sign change
    pub front_voxels: usize,
}

/// Rebuilds a signed distance field from the zero level set of `field`
///
/// Implementations overwrite every voxel, keep the sign of every voxel, and
/// leave values continuous except for the legacy curves method.
pub trait DistanceMapBuilder {
    fn method(&self) -> DistanceMethod;

    fn build(&self, geometry: &GridGeometry, field: &mut [f32]) -> Result<DistanceReport>;
}
