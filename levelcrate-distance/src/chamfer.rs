//! Fast signed chamfer distance
//!
//! One forward and one backward raster pass over the grid with 3x3x3 masks
//! weighted by the physical neighbour distances.

use crate::front::{self, ensure_field_len};
use crate::neighborhood::Neighborhood;
use levelcrate_core::{DistanceMapBuilder, DistanceMethod, DistanceReport, GridGeometry, Result};
use log::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct Chamfer;

impl DistanceMapBuilder for Chamfer {
    fn method(&self) -> DistanceMethod {
        DistanceMethod::Chamfer
    }

    fn build(&self, geometry: &GridGeometry, field: &mut [f32]) -> Result<DistanceReport> {
        ensure_field_len(geometry, field)?;
        let seeds = front::subvoxel_front(geometry, field);
        let report = DistanceReport {
            method: DistanceMethod::Chamfer,
            front_voxels: seeds.len(),
        };
        if seeds.is_empty() {
            debug!("chamfer: no zero crossing, uniform field");
            front::fill_uniform(geometry, field);
            return Ok(report);
        }

        let distances = chamfer_passes(geometry, &seeds);
        front::write_signed(field, &distances);
        debug!("chamfer: {} front voxels", seeds.len());
        Ok(report)
    }
}

/// Unsigned chamfer distance from `(index, distance)` seeds
pub fn chamfer_passes(geometry: &GridGeometry, seeds: &[(usize, f32)]) -> Vec<f32> {
    let mut distances = vec![f32::INFINITY; geometry.len()];
    let mut frozen = vec![false; geometry.len()];
    for &(index, d) in seeds {
        distances[index] = d;
        frozen[index] = true;
    }

    let forward = Neighborhood::causal(geometry);
    for i in 0..geometry.len() {
        relax(geometry, &forward, &mut distances, &frozen, i);
    }
    let backward = Neighborhood::anti_causal(geometry);
    for i in (0..geometry.len()).rev() {
        relax(geometry, &backward, &mut distances, &frozen, i);
    }
    distances
}

#[inline]
fn relax(
    geometry: &GridGeometry,
    mask: &Neighborhood,
    distances: &mut [f32],
    frozen: &[bool],
    index: usize,
) {
    if frozen[index] {
        return;
    }
    let best = mask
        .around(geometry, geometry.coords(index))
        .map(|(n, w)| distances[n] + w)
        .fold(distances[index], f32::min);
    distances[index] = best;
}
