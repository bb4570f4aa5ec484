//! Initial implicit function
//!
//! The first zero level set comes from, in order of preference, an initial
//! image thresholded at `init_threshold`, the seed spheres, or the input
//! image itself thresholded at `init_threshold`.

use levelcrate_core::{GridGeometry, LevelSetConfig, Seed, StructureIntensity};
use levelcrate_distance::binarize;
use nalgebra::Point3;

/// Intensity statistics inside the seed spheres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedStatistics {
    pub mean: f32,
    pub sd: f32,
    pub count: usize,
}

/// Signed field negative on the structure side of `threshold`
pub fn threshold_field(values: &[f32], threshold: f32, structure: StructureIntensity) -> Vec<f32> {
    values
        .iter()
        .map(|&v| match structure {
            StructureIntensity::Bright => threshold - v,
            StructureIntensity::Dark => v - threshold,
        })
        .collect()
}

/// Physical position of a seed centre given in voxel units
fn seed_center(geometry: &GridGeometry, seed: &Seed) -> Point3<f32> {
    let spacing = geometry.spacing();
    Point3::new(
        seed.center.x * spacing.x,
        seed.center.y * spacing.y,
        seed.center.z * spacing.z,
    )
}

/// Distance to the nearest seed surface, negative inside any seed
///
/// On a planar grid the seeds are disks and `z` is ignored.
pub fn seed_spheres(geometry: &GridGeometry, seeds: &[Seed]) -> Vec<f32> {
    let min_spacing = geometry.spacing().min();
    let planar = geometry.is_planar();
    let centers: Vec<(Point3<f32>, f32)> = seeds
        .iter()
        .map(|s| (seed_center(geometry, s), s.radius * min_spacing))
        .collect();

    (0..geometry.len())
        .map(|i| {
            let p = geometry.voxel_to_physical(geometry.coords(i));
            centers
                .iter()
                .map(|&(c, r)| {
                    let mut d = p - c;
                    if planar {
                        d.z = 0.0;
                    }
                    d.norm() - r
                })
                .fold(f32::INFINITY, f32::min)
        })
        .collect()
}

/// Seed field according to the configured priority
pub fn initial_field(
    config: &LevelSetConfig,
    geometry: &GridGeometry,
    image: &[f32],
    init_image: Option<&[f32]>,
) -> Vec<f32> {
    let mut field = match init_image {
        Some(init) => threshold_field(init, config.init_threshold, config.structure),
        None if !config.seeds.is_empty() => seed_spheres(geometry, &config.seeds),
        None => threshold_field(image, config.init_threshold, config.structure),
    };
    if config.iso_contour_bin {
        binarize(&mut field);
    }
    field
}

/// Mean and standard deviation of `image` over the voxels inside the seeds
pub fn init_points_statistics(geometry: &GridGeometry, image: &[f32], seeds: &[Seed]) -> Option<SeedStatistics> {
    if seeds.is_empty() {
        return None;
    }
    let field = seed_spheres(geometry, seeds);
    let (count, sum, sum_sq) = field
        .iter()
        .zip(image)
        .filter(|(d, _)| **d <= 0.0)
        .fold((0usize, 0.0f64, 0.0f64), |(n, s, s2), (_, &v)| {
            let v = f64::from(v);
            (n + 1, s + v, s2 + v * v)
        });
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
    Some(SeedStatistics {
        mean: mean as f32,
        sd: variance.sqrt() as f32,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use levelcrate_core::Volume;

    #[test]
    fn test_threshold_sides() {
        let values = [0.0, 10.0, 20.0];
        assert_eq!(threshold_field(&values, 10.0, StructureIntensity::Bright), vec![10.0, 0.0, -10.0]);
        assert_eq!(threshold_field(&values, 10.0, StructureIntensity::Dark), vec![-10.0, 0.0, 10.0]);
    }

    #[test]
    fn test_seed_spheres() {
        let grid = GridGeometry::isotropic([20, 20, 20]).unwrap();
        let seeds = [Seed::new(5.0, 5.0, 5.0, 2.0), Seed::new(14.0, 14.0, 14.0, 3.0)];
        let field = seed_spheres(&grid, &seeds);

        assert_relative_eq!(field[grid.index(5, 5, 5)], -2.0);
        assert_relative_eq!(field[grid.index(14, 14, 14)], -3.0);
        assert_relative_eq!(field[grid.index(9, 5, 5)], 2.0);
        assert!(field[grid.index(10, 10, 10)] > 0.0);
    }

    #[test]
    fn test_disk_seeds_ignore_z() {
        let grid = GridGeometry::isotropic([10, 10, 1]).unwrap();
        let field = seed_spheres(&grid, &[Seed::new(5.0, 5.0, 12.0, 2.0)]);
        assert_relative_eq!(field[grid.index(5, 5, 0)], -2.0);
    }

    #[test]
    fn test_seeding_priority() {
        let grid = GridGeometry::isotropic([8, 8, 8]).unwrap();
        let image = Volume::from_fn(grid, |[x, _, _]| if x < 4 { 100.0 } else { 0.0 });
        let init = Volume::from_fn(grid, |[_, y, _]| if y < 2 { 1.0 } else { 0.0 });
        let config = LevelSetConfig::new()
            .with_init_threshold(0.5)
            .with_seed(Seed::new(6.0, 6.0, 6.0, 1.0));

        let from_init = initial_field(&config, &grid, image.as_slice(), Some(init.as_slice()));
        assert!(from_init[grid.index(7, 0, 7)] < 0.0);
        assert!(from_init[grid.index(0, 7, 0)] > 0.0);

        let from_seeds = initial_field(&config, &grid, image.as_slice(), None);
        assert!(from_seeds[grid.index(6, 6, 6)] < 0.0);
        assert!(from_seeds[grid.index(0, 0, 0)] > 0.0);

        let bare = LevelSetConfig::new().with_init_threshold(50.0).with_iso_contour_bin(true);
        let from_image = initial_field(&bare, &grid, image.as_slice(), None);
        assert_eq!(from_image[grid.index(0, 3, 3)], -0.5);
        assert_eq!(from_image[grid.index(7, 3, 3)], 0.5);
    }

    #[test]
    fn test_seed_statistics() {
        let grid = GridGeometry::isotropic([10, 10, 10]).unwrap();
        let image = Volume::from_fn(grid, |[x, _, _]| if x % 2 == 0 { 10.0 } else { 20.0 });
        let stats = init_points_statistics(&grid, image.as_slice(), &[Seed::new(5.0, 5.0, 5.0, 0.5)]).unwrap();
        assert_eq!(stats.count, 1);
        assert_relative_eq!(stats.mean, 20.0);
        assert_relative_eq!(stats.sd, 0.0);

        let stats = init_points_statistics(&grid, image.as_slice(), &[Seed::new(5.0, 5.0, 5.0, 1.0)]).unwrap();
        assert_eq!(stats.count, 7);
        assert_relative_eq!(stats.mean, 120.0 / 7.0, epsilon = 1e-4);
        assert!(stats.sd > 0.0);

        assert!(init_points_statistics(&grid, image.as_slice(), &[]).is_none());
    }
}
