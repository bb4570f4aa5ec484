//! Shape-based distance map
//!
//! Distances to the front and to a caller-supplied skeleton are both
//! propagated with [`propagate_nearest`]. Inside the structure, where the
//! local depth `r = d_front + d_skeleton` falls under the minimum distance,
//! values are stretched so the skeleton sits at `-shape_min_dist`. This keeps
//! thin structures from collapsing under curvature. Outside, and wherever
//! the structure is deep enough, the plain signed distance is kept.

use crate::front::{self, ensure_field_len, is_inside};
use crate::neighborhood::Neighborhood;
use crate::propagation::propagate_nearest;
use levelcrate_core::{
    DistanceMapBuilder, DistanceMethod, DistanceReport, Error, GridGeometry, Result, Volume,
};
use log::debug;

/// Shape-based builder borrowing a skeleton mask (non-zero = skeleton)
#[derive(Debug, Clone, Copy)]
pub struct ShapeDistance<'a> {
    skeleton: &'a [u8],
    min_dist: f32,
}

impl<'a> ShapeDistance<'a> {
    /// `min_dist` is in voxels
    pub fn new(skeleton: &'a [u8], min_dist: f32) -> Self {
        Self { skeleton, min_dist }
    }
}

impl DistanceMapBuilder for ShapeDistance<'_> {
    fn method(&self) -> DistanceMethod {
        DistanceMethod::Shape
    }

    fn build(&self, geometry: &GridGeometry, field: &mut [f32]) -> Result<DistanceReport> {
        ensure_field_len(geometry, field)?;
        if self.skeleton.len() != geometry.len() {
            return Err(Error::InvalidData(format!(
                "Skeleton holds {} voxels but grid {:?} needs {}",
                self.skeleton.len(),
                geometry.dims(),
                geometry.len()
            )));
        }

        let seeds = front::subvoxel_front(geometry, field);
        let report = DistanceReport {
            method: DistanceMethod::Shape,
            front_voxels: seeds.len(),
        };
        if seeds.is_empty() {
            debug!("shape: no zero crossing, uniform field");
            front::fill_uniform(geometry, field);
            return Ok(report);
        }

        let to_front = propagate_nearest(geometry, &seeds);
        let skeleton: Vec<(usize, f32)> = self
            .skeleton
            .iter()
            .enumerate()
            .filter(|&(i, &s)| s != 0 && is_inside(field[i]))
            .map(|(i, _)| (i, 0.0))
            .collect();

        if skeleton.is_empty() {
            debug!("shape: skeleton empty inside the structure, plain distance");
            front::write_signed(field, &to_front);
            return Ok(report);
        }

        let to_skeleton = propagate_nearest(geometry, &skeleton);
        let floor = self.min_dist * geometry.spacing().min();
        for (i, v) in field.iter_mut().enumerate() {
            let d = to_front[i];
            if !is_inside(*v) {
                *v = d;
                continue;
            }
            let depth = d + to_skeleton[i];
            let stretched = if depth > 0.0 && depth < floor {
                d * floor / depth
            } else {
                d
            };
            *v = front::signed(stretched, *v);
        }
        debug!(
            "shape: {} front voxels, {} skeleton voxels",
            seeds.len(),
            skeleton.len()
        );
        Ok(report)
    }
}

/// Skeleton of the structure described by a signed distance field
///
/// Marks inside voxels at least `min_depth` voxels deep whose depth is not
/// exceeded by any 26-neighbour.
pub fn medial_axis(geometry: &GridGeometry, distance: &[f32], min_depth: f32) -> Result<Volume<u8>> {
    ensure_field_len(geometry, distance)?;
    let mask = Neighborhood::full(geometry);
    let floor = min_depth * geometry.spacing().min();

    let data = (0..geometry.len())
        .map(|i| {
            let depth = -distance[i];
            let ridge = depth > 0.0
                && depth >= floor
                && mask
                    .around(geometry, geometry.coords(i))
                    .all(|(n, _)| -distance[n] <= depth);
            u8::from(ridge)
        })
        .collect();
    Volume::new(*geometry, data)
}
