//! Zero level set detection and front initialisation
//!
//! A front voxel has at least one 6-connected neighbour on the other side of
//! the zero level set. Inside is `u < 0`; zero counts as outside.

use levelcrate_core::{Error, GridGeometry, Result};

/// Smallest magnitude given to an inside voxel so its sign survives
pub(crate) const MIN_INSIDE_DISTANCE: f32 = 1e-6;

#[inline]
pub fn is_inside(value: f32) -> bool {
    value < 0.0
}

/// Re-apply the side of `original` to an unsigned distance
#[inline]
pub fn signed(distance: f32, original: f32) -> f32 {
    if is_inside(original) {
        -distance.max(MIN_INSIDE_DISTANCE)
    } else {
        distance
    }
}

pub(crate) fn ensure_field_len(geometry: &GridGeometry, field: &[f32]) -> Result<()> {
    if field.len() != geometry.len() {
        return Err(Error::InvalidData(format!(
            "Field holds {} values but grid {:?} needs {}",
            field.len(),
            geometry.dims(),
            geometry.len()
        )));
    }
    Ok(())
}

/// True when a face neighbour lies on the other side of the zero level set
pub fn is_front_voxel(geometry: &GridGeometry, field: &[f32], index: usize) -> bool {
    let side = is_inside(field[index]);
    geometry
        .face_neighbors(index)
        .any(|(n, _)| is_inside(field[n]) != side)
}

/// Indices of every front voxel, in grid order
pub fn detect_front(geometry: &GridGeometry, field: &[f32]) -> Vec<usize> {
    (0..field.len())
        .filter(|&i| is_front_voxel(geometry, field, i))
        .collect()
}

/// Front voxels with their unsigned sub-voxel distance to the zero crossing
///
/// Along each axis with a sign change the crossing is linearly interpolated;
/// the voxel keeps the smallest of these distances.
pub fn subvoxel_front(geometry: &GridGeometry, field: &[f32]) -> Vec<(usize, f32)> {
    let spacing = geometry.spacing();
    (0..field.len())
        .filter_map(|i| {
            let phi = field[i];
            let side = is_inside(phi);
            geometry
                .face_neighbors(i)
                .filter(|&(n, _)| is_inside(field[n]) != side)
                .map(|(n, axis)| {
                    let denom = phi.abs() + field[n].abs();
                    if denom > 1e-12 {
                        spacing[axis] * phi.abs() / denom
                    } else {
                        spacing[axis] * 0.5
                    }
                })
                .reduce(f32::min)
                .map(|d| (i, d))
        })
        .collect()
}

/// Front voxels placed half a voxel from the crossing, ignoring sub-voxel position
pub fn binary_front(geometry: &GridGeometry, field: &[f32]) -> Vec<(usize, f32)> {
    let half = 0.5 * geometry.spacing().min();
    detect_front(geometry, field)
        .into_iter()
        .map(|i| (i, half))
        .collect()
}

/// Replace every value by ±0.5 according to its side
pub fn binarize(field: &mut [f32]) {
    for v in field.iter_mut() {
        *v = if is_inside(*v) { -0.5 } else { 0.5 };
    }
}

/// Field without a zero crossing: every voxel gets the grid diagonal with its sign
pub(crate) fn fill_uniform(geometry: &GridGeometry, field: &mut [f32]) {
    let far = geometry.diagonal();
    for v in field.iter_mut() {
        *v = signed(far, *v);
    }
}

/// Write unsigned distances back with the original signs
pub(crate) fn write_signed(field: &mut [f32], distances: &[f32]) {
    for (v, &d) in field.iter_mut().zip(distances) {
        *v = signed(d, *v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(geometry: &GridGeometry, offset: f32) -> Vec<f32> {
        (0..geometry.len())
            .map(|i| geometry.coords(i)[0] as f32 - offset)
            .collect()
    }

    #[test]
    fn test_front_detection() {
        let grid = GridGeometry::isotropic([8, 3, 3]).unwrap();
        let field = ramp(&grid, 3.5);
        let front = detect_front(&grid, &field);

        // the crossing sits between x = 3 and x = 4
        assert_eq!(front.len(), 2 * 9);
        assert!(front.iter().all(|&i| {
            let x = grid.coords(i)[0];
            x == 3 || x == 4
        }));
    }

    #[test]
    fn test_subvoxel_distances() {
        let grid = GridGeometry::isotropic([8, 1, 1]).unwrap();
        let field = ramp(&grid, 3.3);
        let front = subvoxel_front(&grid, &field);

        assert_eq!(front.len(), 2);
        assert_eq!(front[0].0, 3);
        assert_relative_eq!(front[0].1, 0.3, epsilon = 1e-5);
        assert_relative_eq!(front[1].1, 0.7, epsilon = 1e-5);
    }

    #[test]
    fn test_sign_preserved() {
        assert!(is_inside(signed(0.0, -2.0)));
        assert!(!is_inside(signed(0.0, 0.0)));
        assert_relative_eq!(signed(1.5, 3.0), 1.5);
    }

    #[test]
    fn test_binarize_and_uniform_fill() {
        let grid = GridGeometry::isotropic([4, 4, 1]).unwrap();
        let mut field = vec![-3.0; grid.len()];
        assert!(detect_front(&grid, &field).is_empty());

        fill_uniform(&grid, &mut field);
        assert!(field.iter().all(|&v| v < -5.0));

        field[0] = 7.0;
        binarize(&mut field);
        assert_eq!(field[0], 0.5);
        assert_eq!(field[1], -0.5);
    }
}
