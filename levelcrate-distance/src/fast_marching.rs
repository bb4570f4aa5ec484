//! Fast marching signed distance
//!
//! Front voxels are frozen at their sub-voxel distance, then the unsigned
//! arrival time of the front is marched outward over the whole grid in
//! increasing order, solving the anisotropic eikonal equation
//! `sum ((T - a_i) / h_i)^2 = 1` at every accepted neighbour.

use crate::front::{self, ensure_field_len};
use binary_heap_plus::{BinaryHeap, MinComparator};
use levelcrate_core::{DistanceMapBuilder, DistanceMethod, DistanceReport, GridGeometry, Result};
use log::debug;
use ordered_float::OrderedFloat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Far,
    Trial,
    Known,
}

/// Fast marching distance map builder
#[derive(Debug, Clone, Copy, Default)]
pub struct FastMarching;

impl DistanceMapBuilder for FastMarching {
    fn method(&self) -> DistanceMethod {
        DistanceMethod::FastMarching
    }

    fn build(&self, geometry: &GridGeometry, field: &mut [f32]) -> Result<DistanceReport> {
        ensure_field_len(geometry, field)?;
        let seeds = front::subvoxel_front(geometry, field);
        let report = DistanceReport {
            method: DistanceMethod::FastMarching,
            front_voxels: seeds.len(),
        };
        if seeds.is_empty() {
            debug!("fast marching: no zero crossing, uniform field");
            front::fill_uniform(geometry, field);
            return Ok(report);
        }

        let distances = march(geometry, &seeds);
        front::write_signed(field, &distances);
        debug!("fast marching: {} front voxels", seeds.len());
        Ok(report)
    }
}

/// Unsigned arrival times from the given `(index, distance)` seeds
pub fn march(geometry: &GridGeometry, seeds: &[(usize, f32)]) -> Vec<f32> {
    let mut marcher = Marcher::new(geometry);
    for &(index, distance) in seeds {
        marcher.distances[index] = distance;
        marcher.state[index] = State::Known;
    }
    for &(index, _) in seeds {
        marcher.update_neighbors(index);
    }

    while let Some((OrderedFloat(distance), index)) = marcher.heap.pop() {
        if marcher.state[index] == State::Known || distance > marcher.distances[index] {
            continue;
        }
        marcher.state[index] = State::Known;
        marcher.update_neighbors(index);
    }

    marcher.distances
}

struct Marcher<'a> {
    geometry: &'a GridGeometry,
    distances: Vec<f32>,
    state: Vec<State>,
    heap: BinaryHeap<(OrderedFloat<f32>, usize), MinComparator>,
}

impl<'a> Marcher<'a> {
    fn new(geometry: &'a GridGeometry) -> Self {
        Self {
            geometry,
            distances: vec![f32::INFINITY; geometry.len()],
            state: vec![State::Far; geometry.len()],
            heap: BinaryHeap::new_min(),
        }
    }

    fn update_neighbors(&mut self, index: usize) {
        let geometry = self.geometry;
        for (n, _) in geometry.face_neighbors(index) {
            if self.state[n] == State::Known {
                continue;
            }
            let t = self.arrival_time(n);
            if t < self.distances[n] {
                self.distances[n] = t;
                self.state[n] = State::Trial;
                self.heap.push((OrderedFloat(t), n));
            }
        }
    }

    /// Upwind eikonal estimate at `index` from its accepted neighbours
    fn arrival_time(&self, index: usize) -> f32 {
        let spacing = self.geometry.spacing();
        let mut terms = [(0.0f32, 0.0f32); 3];
        let mut count = 0;
        let mut best_per_axis = [f32::INFINITY; 3];

        for (n, axis) in self.geometry.face_neighbors(index) {
            if self.state[n] == State::Known {
                best_per_axis[axis] = best_per_axis[axis].min(self.distances[n]);
            }
        }
        for (axis, &value) in best_per_axis.iter().enumerate() {
            if value.is_finite() {
                terms[count] = (value, spacing[axis]);
                count += 1;
            }
        }
        if count == 0 {
            return f32::INFINITY;
        }
        solve_eikonal(&mut terms[..count])
    }
}

/// Solve the upwind quadratic for `(neighbour value, spacing)` terms
///
/// Terms are added in increasing value order while the solution stays above
/// the next neighbour value.
pub(crate) fn solve_eikonal(terms: &mut [(f32, f32)]) -> f32 {
    terms.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut best = terms[0].0 + terms[0].1;
    let (mut a, mut b, mut c) = (0.0f32, 0.0f32, -1.0f32);
    for (k, &(value, h)) in terms.iter().enumerate() {
        if k > 0 && best <= value {
            break;
        }
        let w = 1.0 / (h * h);
        a += w;
        b -= 2.0 * value * w;
        c += value * value * w;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            break;
        }
        best = (-b + disc.sqrt()) / (2.0 * a);
    }
    best
}
