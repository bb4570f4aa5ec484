//! Danielsson-style nearest-source propagation
//!
//! Each voxel carries the source it is closest to; raster passes hand sources
//! over to neighbours and the distance is always measured to the source voxel
//! itself, so errors do not accumulate along the path.

use crate::neighborhood::Neighborhood;
use levelcrate_core::GridGeometry;
use nalgebra::Point3;

/// Forward/backward pass pairs
const PASSES: usize = 2;

/// Unsigned distance to the nearest `(index, offset)` source
///
/// The source offset is added to the Euclidean distance of the source voxel,
/// which lets a front carry its sub-voxel position.
pub fn propagate_nearest(geometry: &GridGeometry, sources: &[(usize, f32)]) -> Vec<f32> {
    let mut state = Propagation::new(geometry, sources);
    let forward = Neighborhood::causal(geometry);
    let backward = Neighborhood::anti_causal(geometry);

    for _ in 0..PASSES {
        for i in 0..geometry.len() {
            state.relax(&forward, i);
        }
        for i in (0..geometry.len()).rev() {
            state.relax(&backward, i);
        }
    }
    state.distances
}

struct Propagation<'a> {
    geometry: &'a GridGeometry,
    sources: &'a [(usize, f32)],
    positions: Vec<Point3<f32>>,
    nearest: Vec<Option<usize>>,
    distances: Vec<f32>,
}

impl<'a> Propagation<'a> {
    fn new(geometry: &'a GridGeometry, sources: &'a [(usize, f32)]) -> Self {
        let mut nearest = vec![None; geometry.len()];
        let mut distances = vec![f32::INFINITY; geometry.len()];
        let positions = sources
            .iter()
            .map(|&(index, _)| geometry.voxel_to_physical(geometry.coords(index)))
            .collect();
        for (k, &(index, offset)) in sources.iter().enumerate() {
            if offset < distances[index] {
                distances[index] = offset;
                nearest[index] = Some(k);
            }
        }
        Self {
            geometry,
            sources,
            positions,
            nearest,
            distances,
        }
    }

    fn relax(&mut self, mask: &Neighborhood, index: usize) {
        let coords = self.geometry.coords(index);
        let here = self.geometry.voxel_to_physical(coords);
        for (n, _) in mask.around(self.geometry, coords) {
            let Some(k) = self.nearest[n] else {
                continue;
            };
            if self.nearest[index] == Some(k) {
                continue;
            }
            let candidate = (here - self.positions[k]).norm() + self.sources[k].1;
            if candidate < self.distances[index] {
                self.distances[index] = candidate;
                self.nearest[index] = Some(k);
            }
        }
    }
}
