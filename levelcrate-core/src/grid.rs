//! Regular voxel grid geometry
//!
//! Voxels are flattened row-major with `x` varying fastest:
//! `index = x + y * tx + z * tx * ty`. A planar grid is simply `tz == 1`.

use crate::{Error, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Spacing-derived constants used by the finite-difference stencils
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacingTerms {
    /// Squared spacing per axis
    pub sq: Vector3<f32>,
    /// Doubled spacing per axis
    pub doub: Vector3<f32>,
    /// Cross-plane products `[vx*vy, vx*vz, vy*vz]`
    pub cross: [f32; 3],
    /// Reciprocal spacing per axis
    pub inv: Vector3<f32>,
}

/// Dimensions and physical spacing of a 2D or 3D voxel grid
///
/// Deserialization goes through [`GridGeometry::new`], so a stored grid is
/// checked like a constructed one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGridGeometry")]
pub struct GridGeometry {
    dims: [usize; 3],
    spacing: Vector3<f32>,
}

/// Serialized form of a grid before validation
#[derive(Deserialize)]
struct RawGridGeometry {
    dims: [usize; 3],
    spacing: Vector3<f32>,
}

impl TryFrom<RawGridGeometry> for GridGeometry {
    type Error = Error;

    fn try_from(raw: RawGridGeometry) -> Result<Self> {
        Self::new(raw.dims, raw.spacing)
    }
}

impl GridGeometry {
    /// Create a grid with the given dimensions and spacing
    pub fn new(dims: [usize; 3], spacing: Vector3<f32>) -> Result<Self> {
        if dims.iter().any(|&d| d == 0) {
            return Err(Error::InvalidData(format!(
                "Grid dimensions must be non-zero, got {:?}",
                dims
            )));
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::InvalidData(format!(
                "Voxel spacing must be finite and positive, got ({}, {}, {})",
                spacing.x, spacing.y, spacing.z
            )));
        }
        dims.iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| Error::InvalidData(format!("Grid {:?} is too large", dims)))?;

        Ok(Self { dims, spacing })
    }

    /// Unit-spaced grid
    pub fn isotropic(dims: [usize; 3]) -> Result<Self> {
        Self::new(dims, Vector3::new(1.0, 1.0, 1.0))
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn tx(&self) -> usize {
        self.dims[0]
    }

    pub fn ty(&self) -> usize {
        self.dims[1]
    }

    pub fn tz(&self) -> usize {
        self.dims[2]
    }

    pub fn txy(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        self.txy() * self.dims[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for single-slice grids
    pub fn is_planar(&self) -> bool {
        self.dims[2] == 1
    }

    pub fn spacing(&self) -> Vector3<f32> {
        self.spacing
    }

    /// Same dimensions with unit spacing
    pub fn with_unit_spacing(&self) -> Self {
        Self {
            dims: self.dims,
            spacing: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Geometry of one z-slice of this grid
    pub fn slice_geometry(&self) -> Self {
        Self {
            dims: [self.dims[0], self.dims[1], 1],
            spacing: self.spacing,
        }
    }

    pub fn spacing_terms(&self) -> SpacingTerms {
        let s = self.spacing;
        SpacingTerms {
            sq: s.component_mul(&s),
            doub: s * 2.0,
            cross: [s.x * s.y, s.x * s.z, s.y * s.z],
            inv: Vector3::new(1.0 / s.x, 1.0 / s.y, 1.0 / s.z),
        }
    }

    /// Index step along each axis
    pub fn strides(&self) -> [usize; 3] {
        [1, self.dims[0], self.txy()]
    }

    /// Flattened index of `(x, y, z)`; coordinates must be in range
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.dims[0] && y < self.dims[1] && z < self.dims[2]);
        x + y * self.dims[0] + z * self.txy()
    }

    /// Flattened index of signed coordinates, `None` outside the grid
    pub fn checked_index(&self, x: i64, y: i64, z: i64) -> Option<usize> {
        let inside = |c: i64, d: usize| c >= 0 && (c as usize) < d;
        if inside(x, self.dims[0]) && inside(y, self.dims[1]) && inside(z, self.dims[2]) {
            Some(self.index(x as usize, y as usize, z as usize))
        } else {
            None
        }
    }

    /// Inverse of [`GridGeometry::index`]
    #[inline]
    pub fn coords(&self, index: usize) -> [usize; 3] {
        let txy = self.txy();
        let z = index / txy;
        let rem = index - z * txy;
        let y = rem / self.dims[0];
        [rem - y * self.dims[0], y, z]
    }

    /// Index of the voxel displaced by `offset`, clamped to the grid border
    #[inline]
    pub fn clamped_offset(&self, coords: [usize; 3], offset: [i32; 3]) -> usize {
        let shift = |c: usize, o: i32, d: usize| -> usize {
            (c as i64 + o as i64).clamp(0, d as i64 - 1) as usize
        };
        self.index(
            shift(coords[0], offset[0], self.dims[0]),
            shift(coords[1], offset[1], self.dims[1]),
            shift(coords[2], offset[2], self.dims[2]),
        )
    }

    /// True when the voxel touches a face of the grid along a non-degenerate axis
    pub fn is_boundary(&self, index: usize) -> bool {
        let c = self.coords(index);
        (0..3).any(|axis| self.dims[axis] > 1 && (c[axis] == 0 || c[axis] + 1 == self.dims[axis]))
    }

    /// In-range 6-connected neighbours as `(index, axis)` pairs
    pub fn face_neighbors(&self, index: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let c = self.coords(index);
        let strides = self.strides();
        (0..3).flat_map(move |axis| {
            let lo = (c[axis] > 0).then(|| (index - strides[axis], axis));
            let hi = (c[axis] + 1 < self.dims[axis]).then(|| (index + strides[axis], axis));
            lo.into_iter().chain(hi)
        })
    }

    /// Physical position of a voxel centre, origin at voxel (0, 0, 0)
    pub fn voxel_to_physical(&self, coords: [usize; 3]) -> Point3<f32> {
        Point3::new(
            coords[0] as f32 * self.spacing.x,
            coords[1] as f32 * self.spacing.y,
            coords[2] as f32 * self.spacing.z,
        )
    }

    /// Physical length of the grid diagonal
    pub fn diagonal(&self) -> f32 {
        let extent = Vector3::new(
            self.dims[0] as f32 * self.spacing.x,
            self.dims[1] as f32 * self.spacing.y,
            self.dims[2] as f32 * self.spacing.z,
        );
        extent.norm()
    }

    /// Reject a field whose dimensions differ from this grid
    pub fn ensure_same_dims(&self, field: &'static str, dims: [usize; 3]) -> Result<()> {
        if dims == self.dims {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                field,
                expected: self.dims,
                found: dims,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_index_roundtrip() {
        let grid = GridGeometry::isotropic([5, 4, 3]).unwrap();
        assert_eq!(grid.len(), 60);
        assert_eq!(grid.txy(), 20);

        for index in 0..grid.len() {
            let [x, y, z] = grid.coords(index);
            assert_eq!(grid.index(x, y, z), index);
        }
        assert_eq!(grid.coords(23), [3, 0, 1]);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(GridGeometry::isotropic([0, 4, 4]).is_err());
        assert!(GridGeometry::new([4, 4, 4], Vector3::new(1.0, 0.0, 1.0)).is_err());
        assert!(GridGeometry::new([4, 4, 4], Vector3::new(1.0, f32::NAN, 1.0)).is_err());
    }

    #[test]
    fn test_deserialization_is_validated() {
        let grid = GridGeometry::new([4, 3, 2], Vector3::new(0.5, 1.0, 2.0)).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        let back: GridGeometry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);

        let empty = r#"{ "dims": [4, 0, 2], "spacing": [1.0, 1.0, 1.0] }"#;
        assert!(serde_json::from_str::<GridGeometry>(empty).is_err());
        let flat = r#"{ "dims": [4, 4, 2], "spacing": [1.0, -1.0, 1.0] }"#;
        assert!(serde_json::from_str::<GridGeometry>(flat).is_err());
    }

    #[test]
    fn test_spacing_terms() {
        let grid = GridGeometry::new([2, 2, 2], Vector3::new(0.5, 2.0, 3.0)).unwrap();
        let terms = grid.spacing_terms();

        assert_relative_eq!(terms.sq.x, 0.25);
        assert_relative_eq!(terms.doub.y, 4.0);
        assert_relative_eq!(terms.cross[0], 1.0);
        assert_relative_eq!(terms.cross[1], 1.5);
        assert_relative_eq!(terms.cross[2], 6.0);
        assert_relative_eq!(terms.inv.z, 1.0 / 3.0);
    }

    #[test]
    fn test_clamped_offset_and_boundary() {
        let grid = GridGeometry::isotropic([3, 3, 1]).unwrap();
        assert_eq!(grid.clamped_offset([0, 0, 0], [-1, -1, -1]), 0);
        assert_eq!(grid.clamped_offset([1, 1, 0], [1, 0, 1]), grid.index(2, 1, 0));

        assert!(grid.is_boundary(grid.index(0, 1, 0)));
        // the degenerate z axis does not make the centre a boundary voxel
        assert!(!grid.is_boundary(grid.index(1, 1, 0)));
    }

    #[test]
    fn test_face_neighbors() {
        let grid = GridGeometry::isotropic([3, 3, 3]).unwrap();
        assert_eq!(grid.face_neighbors(grid.index(1, 1, 1)).count(), 6);
        assert_eq!(grid.face_neighbors(0).count(), 3);

        let planar = GridGeometry::isotropic([3, 3, 1]).unwrap();
        assert_eq!(planar.face_neighbors(planar.index(1, 1, 0)).count(), 4);
    }

    #[test]
    fn test_dimension_check() {
        let grid = GridGeometry::isotropic([4, 4, 4]).unwrap();
        assert!(grid.ensure_same_dims("velocity", [4, 4, 4]).is_ok());
        let err = grid.ensure_same_dims("velocity", [4, 4, 3]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { field: "velocity", .. }));
    }
}
