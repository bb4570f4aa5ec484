//! Synthetic volumes for tests, benches and demos

use crate::{GridGeometry, Volume};
use nalgebra::Point3;
use rand::Rng;

/// Signed Euclidean distance to a sphere, negative inside
///
/// `center` and `radius` are in voxel units; the distance is physical.
pub fn sphere_distance(geometry: &GridGeometry, center: Point3<f32>, radius: f32) -> Volume<f32> {
    let spacing = geometry.spacing();
    let center = Point3::new(center.x * spacing.x, center.y * spacing.y, center.z * spacing.z);
    let radius = radius * spacing.min();
    Volume::from_fn(*geometry, |coords| {
        (geometry.voxel_to_physical(coords) - center).norm() - radius
    })
}

/// Two-level intensity image of a filled sphere
pub fn sphere_phantom(
    geometry: &GridGeometry,
    center: Point3<f32>,
    radius: f32,
    inside: f32,
    outside: f32,
) -> Volume<f32> {
    Volume::from_fn(*geometry, |[x, y, z]| {
        let d = Point3::new(x as f32, y as f32, z as f32) - center;
        if d.norm() <= radius {
            inside
        } else {
            outside
        }
    })
}

/// Filled sphere wrapped in a concentric shell of a third intensity
pub fn shell_phantom(
    geometry: &GridGeometry,
    center: Point3<f32>,
    radius: f32,
    shell_thickness: f32,
    [inside, shell, outside]: [f32; 3],
) -> Volume<f32> {
    Volume::from_fn(*geometry, |[x, y, z]| {
        let r = (Point3::new(x as f32, y as f32, z as f32) - center).norm();
        if r <= radius {
            inside
        } else if r <= radius + shell_thickness {
            shell
        } else {
            outside
        }
    })
}

/// Straight tube along z with the given cross-section centre and radius
pub fn tube_phantom(
    geometry: &GridGeometry,
    center_xy: [f32; 2],
    radius: f32,
    inside: f32,
    outside: f32,
) -> Volume<f32> {
    Volume::from_fn(*geometry, |[x, y, _]| {
        let dx = x as f32 - center_xy[0];
        let dy = y as f32 - center_xy[1];
        if (dx * dx + dy * dy).sqrt() <= radius {
            inside
        } else {
            outside
        }
    })
}

/// Add uniform noise in `[-amplitude, amplitude]`
pub fn add_noise<R: Rng>(volume: &mut Volume<f32>, amplitude: f32, rng: &mut R) {
    if amplitude <= 0.0 {
        return;
    }
    for v in volume.as_mut_slice() {
        *v += rng.gen_range(-amplitude..=amplitude);
    }
}

/// Centre of the grid in voxel coordinates
pub fn grid_center(geometry: &GridGeometry) -> Point3<f32> {
    let [tx, ty, tz] = geometry.dims();
    Point3::new(
        (tx as f32 - 1.0) / 2.0,
        (ty as f32 - 1.0) / 2.0,
        (tz as f32 - 1.0) / 2.0,
    )
}
