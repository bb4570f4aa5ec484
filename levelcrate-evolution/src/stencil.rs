//! Finite differences around one voxel
//!
//! Neighbours are clamped to the grid, so at a border the one-sided
//! difference is used and degenerate axes (planar grids) contribute nothing.

use levelcrate_core::{GridGeometry, SpacingTerms};
use nalgebra::Vector3;

const GRADIENT_EPS: f32 = 1e-8;

const AXES: [[i32; 3]; 3] = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];
/// Axis pairs of the mixed derivatives `[xy, xz, yz]`
const PAIRS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

/// First and second differences of a scalar field at one voxel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    pub center: f32,
    /// Backward differences `D-`
    pub minus: Vector3<f32>,
    /// Forward differences `D+`
    pub plus: Vector3<f32>,
    /// Central (or one-sided at the border) first derivatives
    pub central: Vector3<f32>,
    /// `[uxx, uyy, uzz]`
    pub second: Vector3<f32>,
    /// `[uxy, uxz, uyz]`
    pub mixed: Vector3<f32>,
}

impl Stencil {
    pub fn gather(geometry: &GridGeometry, terms: &SpacingTerms, u: &[f32], index: usize) -> Self {
        let coords = geometry.coords(index);
        let dims = geometry.dims();
        let center = u[index];

        let mut minus = Vector3::zeros();
        let mut plus = Vector3::zeros();
        let mut central = Vector3::zeros();
        let mut second = Vector3::zeros();
        let mut span = [0.0f32; 3];
        let mut interior = [false; 3];

        for axis in 0..3 {
            if dims[axis] == 1 {
                continue;
            }
            let back = AXES[axis].map(|o| -o);
            let lo = u[geometry.clamped_offset(coords, back)];
            let hi = u[geometry.clamped_offset(coords, AXES[axis])];
            let inv = terms.inv[axis];

            minus[axis] = (center - lo) * inv;
            plus[axis] = (hi - center) * inv;
            second[axis] = (hi - 2.0 * center + lo) / terms.sq[axis];

            // one-sided at the grid boundary
            interior[axis] = coords[axis] > 0 && coords[axis] + 1 < dims[axis];
            span[axis] = if interior[axis] {
                terms.doub[axis]
            } else {
                geometry.spacing()[axis]
            };
            central[axis] = (hi - lo) / span[axis];
        }

        let mut mixed = Vector3::zeros();
        for (slot, &(a, b)) in PAIRS.iter().enumerate() {
            if span[a] == 0.0 || span[b] == 0.0 {
                continue;
            }
            let at = |sa: i32, sb: i32| {
                let mut offset = [0i32; 3];
                offset[a] = sa;
                offset[b] = sb;
                u[geometry.clamped_offset(coords, offset)]
            };
            let denom = if interior[a] && interior[b] {
                4.0 * terms.cross[slot]
            } else {
                span[a] * span[b]
            };
            mixed[slot] = (at(1, 1) - at(1, -1) - at(-1, 1) + at(-1, -1)) / denom;
        }

        Self {
            center,
            minus,
            plus,
            central,
            second,
            mixed,
        }
    }

    pub fn gradient_norm(&self) -> f32 {
        self.central.norm()
    }

    /// Entropy-satisfying |∇u| for `u_t = -speed * |∇u|`
    pub fn upwind_norm(&self, speed: f32) -> f32 {
        let mut sum = 0.0;
        for axis in 0..3 {
            let (m, p) = (self.minus[axis], self.plus[axis]);
            sum += if speed > 0.0 {
                m.max(0.0).powi(2) + p.min(0.0).powi(2)
            } else {
                m.min(0.0).powi(2) + p.max(0.0).powi(2)
            };
        }
        sum.sqrt()
    }

    /// `v · ∇u` with each component differenced against the flow direction
    pub fn upwind_dot(&self, v: &Vector3<f32>) -> f32 {
        (0..3)
            .map(|axis| {
                let d = if v[axis] > 0.0 {
                    self.minus[axis]
                } else {
                    self.plus[axis]
                };
                v[axis] * d
            })
            .sum()
    }

    pub fn central_dot(&self, v: &Vector3<f32>) -> f32 {
        v.dot(&self.central)
    }

    /// Sum of principal curvatures times |∇u|
    pub fn mean_curvature_term(&self) -> f32 {
        let g = self.central;
        let g2 = g.norm_squared();
        if g2 < GRADIENT_EPS {
            return 0.0;
        }
        let (ux, uy, uz) = (g.x, g.y, g.z);
        let [uxx, uyy, uzz] = [self.second.x, self.second.y, self.second.z];
        let [uxy, uxz, uyz] = [self.mixed.x, self.mixed.y, self.mixed.z];

        let num = uxx * (uy * uy + uz * uz) + uyy * (ux * ux + uz * uz) + uzz * (ux * ux + uy * uy)
            - 2.0 * (ux * uy * uxy + ux * uz * uxz + uy * uz * uyz);
        num / g2
    }

    /// Smallest principal curvature times |∇u|
    pub fn minimal_curvature_term(&self) -> f32 {
        let g = self.central;
        let g2 = g.norm_squared();
        if g2 < GRADIENT_EPS {
            return 0.0;
        }
        let norm = g2.sqrt();
        let (ux, uy, uz) = (g.x, g.y, g.z);
        let [uxx, uyy, uzz] = [self.second.x, self.second.y, self.second.z];
        let [uxy, uxz, uyz] = [self.mixed.x, self.mixed.y, self.mixed.z];

        let curvature_sum = self.mean_curvature_term() / norm;
        let gauss = (ux * ux * (uyy * uzz - uyz * uyz)
            + uy * uy * (uxx * uzz - uxz * uxz)
            + uz * uz * (uxx * uyy - uxy * uxy)
            + 2.0
                * (ux * uy * (uxz * uyz - uxy * uzz)
                    + uy * uz * (uxy * uxz - uyz * uxx)
                    + ux * uz * (uxy * uyz - uxz * uyy)))
            / (g2 * g2);

        let half = 0.5 * curvature_sum;
        let smallest = half - (half * half - gauss).max(0.0).sqrt();
        smallest * norm
    }

    /// Second derivative along the gradient direction
    pub fn second_derivative_along_gradient(&self) -> f32 {
        let g = self.central;
        let g2 = g.norm_squared();
        if g2 < GRADIENT_EPS {
            return 0.0;
        }
        let (ux, uy, uz) = (g.x, g.y, g.z);
        let along = ux * ux * self.second.x
            + uy * uy * self.second.y
            + uz * uz * self.second.z
            + 2.0 * (ux * uy * self.mixed.x + ux * uz * self.mixed.y + uy * uz * self.mixed.z);
        along / g2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use levelcrate_core::phantom::sphere_distance;
    use levelcrate_core::Point3;

    fn gather(geometry: &GridGeometry, u: &[f32], x: usize, y: usize, z: usize) -> Stencil {
        Stencil::gather(geometry, &geometry.spacing_terms(), u, geometry.index(x, y, z))
    }

    #[test]
    fn test_linear_ramp_derivatives() {
        let grid = GridGeometry::new([6, 6, 6], Vector3::new(0.5, 1.0, 2.0)).unwrap();
        let u: Vec<f32> = (0..grid.len())
            .map(|i| {
                let p = grid.voxel_to_physical(grid.coords(i));
                2.0 * p.x - p.y + 0.5 * p.z
            })
            .collect();

        for (x, y, z) in [(2, 2, 2), (0, 0, 0), (5, 5, 5)] {
            let s = gather(&grid, &u, x, y, z);
            assert_relative_eq!(s.central.x, 2.0, epsilon = 1e-4);
            assert_relative_eq!(s.central.y, -1.0, epsilon = 1e-4);
            assert_relative_eq!(s.central.z, 0.5, epsilon = 1e-4);
            assert_relative_eq!(s.mixed.norm(), 0.0, epsilon = 1e-4);
        }
        // one-sided at the lower border
        let s = gather(&grid, &u, 0, 3, 3);
        assert_relative_eq!(s.minus.x, 0.0);
        assert_relative_eq!(s.plus.x, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_upwind_norm_picks_side() {
        let grid = GridGeometry::isotropic([5, 1, 1]).unwrap();
        // V-shaped profile with its minimum at x = 2
        let u = [2.0, 1.0, 0.0, 1.0, 2.0];
        let s = gather(&grid, &u, 2, 0, 0);
        assert_relative_eq!(s.upwind_norm(1.0), 0.0);
        assert_relative_eq!(s.upwind_norm(-1.0), 2.0f32.sqrt());

        let s = gather(&grid, &u, 3, 0, 0);
        assert_relative_eq!(s.upwind_norm(1.0), 1.0);
        assert_relative_eq!(s.upwind_dot(&Vector3::new(1.0, 0.0, 0.0)), 1.0);
        assert_relative_eq!(s.upwind_dot(&Vector3::new(-2.0, 0.0, 0.0)), -2.0);
    }

    #[test]
    fn test_sphere_curvatures() {
        let grid = GridGeometry::isotropic([33, 33, 33]).unwrap();
        let u = sphere_distance(&grid, Point3::new(16.0, 16.0, 16.0), 10.0);
        let s = gather(&grid, u.as_slice(), 26, 16, 16);

        // two principal curvatures of 1/r each
        assert_relative_eq!(s.mean_curvature_term(), 0.2, epsilon = 0.01);
        assert_relative_eq!(s.minimal_curvature_term(), 0.1, epsilon = 0.01);
    }

    #[test]
    fn test_cylinder_minimal_curvature_vanishes() {
        let grid = GridGeometry::isotropic([33, 33, 9]).unwrap();
        let u: Vec<f32> = (0..grid.len())
            .map(|i| {
                let [x, y, _] = grid.coords(i);
                let (dx, dy) = (x as f32 - 16.0, y as f32 - 16.0);
                (dx * dx + dy * dy).sqrt() - 8.0
            })
            .collect();
        let s = gather(&grid, &u, 24, 16, 4);

        assert_relative_eq!(s.mean_curvature_term(), 0.125, epsilon = 0.01);
        assert_relative_eq!(s.minimal_curvature_term(), 0.0, epsilon = 0.01);
    }

    #[test]
    fn test_planar_grid_ignores_z() {
        let grid = GridGeometry::isotropic([21, 21, 1]).unwrap();
        let u = sphere_distance(&grid, Point3::new(10.0, 10.0, 0.0), 5.0);
        let s = gather(&grid, u.as_slice(), 15, 10, 0);

        assert_relative_eq!(s.central.z, 0.0);
        assert_relative_eq!(s.second.z, 0.0);
        assert_relative_eq!(s.mean_curvature_term(), 0.2, epsilon = 0.02);
    }

    #[test]
    fn test_mixed_derivative_on_anisotropic_grid() {
        let grid = GridGeometry::new([5, 5, 3], Vector3::new(0.5, 2.0, 1.0)).unwrap();
        let u: Vec<f32> = (0..grid.len())
            .map(|i| {
                let p = grid.voxel_to_physical(grid.coords(i));
                p.x * p.y
            })
            .collect();

        for (x, y) in [(2, 2), (0, 2), (4, 4)] {
            let s = gather(&grid, &u, x, y, 1);
            assert_relative_eq!(s.mixed.x, 1.0, epsilon = 1e-4);
            assert_relative_eq!(s.mixed.y, 0.0, epsilon = 1e-4);
            assert_relative_eq!(s.mixed.z, 0.0, epsilon = 1e-4);
        }
    }
}
