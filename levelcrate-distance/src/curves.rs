//! Legacy curve-based distance map
//!
//! The front is placed half a voxel from the crossing, then distances are
//! relaxed over the 26-neighbourhood by whole-grid sweeps until a sweep
//! changes nothing. Slower and coarser than the other methods; kept for
//! comparison runs.

use crate::front::{self, ensure_field_len};
use crate::neighborhood::Neighborhood;
use levelcrate_core::{DistanceMapBuilder, DistanceMethod, DistanceReport, GridGeometry, Result};
use log::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct Curves;

impl DistanceMapBuilder for Curves {
    fn method(&self) -> DistanceMethod {
        DistanceMethod::Curves
    }

    fn build(&self, geometry: &GridGeometry, field: &mut [f32]) -> Result<DistanceReport> {
        ensure_field_len(geometry, field)?;
        let seeds = front::binary_front(geometry, field);
        let report = DistanceReport {
            method: DistanceMethod::Curves,
            front_voxels: seeds.len(),
        };
        if seeds.is_empty() {
            debug!("curves: no zero crossing, uniform field");
            front::fill_uniform(geometry, field);
            return Ok(report);
        }

        let (distances, sweeps) = relax_until_stable(geometry, &seeds);
        front::write_signed(field, &distances);
        debug!("curves: {} front voxels, {} sweeps", seeds.len(), sweeps);
        Ok(report)
    }
}

/// Jacobi sweeps from the seeds; returns distances and the sweep count
fn relax_until_stable(geometry: &GridGeometry, seeds: &[(usize, f32)]) -> (Vec<f32>, usize) {
    let mask = Neighborhood::full(geometry);
    let mut current = vec![f32::INFINITY; geometry.len()];
    let mut frozen = vec![false; geometry.len()];
    for &(index, d) in seeds {
        current[index] = d;
        frozen[index] = true;
    }

    let mut next = current.clone();
    let mut sweeps = 0;
    loop {
        sweeps += 1;
        let mut changed = false;
        for i in 0..geometry.len() {
            if frozen[i] {
                continue;
            }
            let best = mask
                .around(geometry, geometry.coords(i))
                .map(|(n, w)| current[n] + w)
                .fold(current[i], f32::min);
            if best < current[i] {
                changed = true;
            }
            next[i] = best;
        }
        std::mem::swap(&mut current, &mut next);
        if !changed {
            break;
        }
    }
    (current, sweeps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use levelcrate_core::phantom::sphere_distance;
    use levelcrate_core::Point3;

    #[test]
    fn test_discrete_front_values() {
        let grid = GridGeometry::isotropic([8, 1, 1]).unwrap();
        let mut field: Vec<f32> = (0..8).map(|x| x as f32 - 3.2).collect();

        Curves.build(&grid, &mut field).unwrap();
        // the sub-voxel position is lost: the crossing sits midway
        assert_relative_eq!(field[3], -0.5);
        assert_relative_eq!(field[4], 0.5);
        assert_relative_eq!(field[0], -3.5);
        assert_relative_eq!(field[7], 3.5);
    }

    #[test]
    fn test_sphere_signs() {
        let grid = GridGeometry::isotropic([24, 24, 24]).unwrap();
        let exact = sphere_distance(&grid, Point3::new(12.0, 12.0, 12.0), 6.0);
        let mut field = exact.as_slice().to_vec();

        Curves.build(&grid, &mut field).unwrap();
        for (&got, &want) in field.iter().zip(exact.as_slice()) {
            assert_eq!(got < 0.0, want < 0.0);
        }
        assert!(field[grid.index(12, 12, 12)] < -4.5);
        assert!(field[grid.index(6, 12, 12)].abs() <= 0.5);
        assert!(field[grid.index(12, 12, 19)] > 0.0);
    }
}
