//! Compare the four distance-map builders on a sphere
//!
//! Each method rebuilds a signed distance from the zero level set of an
//! exact sphere distance; the demo reports timing and the error against the
//! exact values near the surface.

use anyhow::Result;
use levelcrate_core::phantom::{grid_center, sphere_distance};
use levelcrate_core::{DistanceMethod, GridGeometry};
use levelcrate_distance::{distance_map, medial_axis};
use std::time::Instant;

fn main() -> Result<()> {
    println!("levelcrate distance maps");
    println!("========================");

    let grid = GridGeometry::isotropic([64, 64, 64])?;
    let radius = 20.0;
    let exact = sphere_distance(&grid, grid_center(&grid), radius);
    let skeleton = medial_axis(&grid, exact.as_slice(), 1.0)?;
    let marked = skeleton.as_slice().iter().filter(|s| **s != 0).count();
    println!("Grid {:?}, sphere radius {}, {} skeleton voxels\n", grid.dims(), radius, marked);

    for method in [
        DistanceMethod::Curves,
        DistanceMethod::FastMarching,
        DistanceMethod::Chamfer,
        DistanceMethod::Shape,
    ] {
        let mut field = exact.as_slice().to_vec();
        let started = Instant::now();
        let report = distance_map(method, &grid, &mut field, Some(skeleton.as_slice()), 2.0)?;
        let elapsed = started.elapsed();

        let (sum, max, count) = field
            .iter()
            .zip(exact.as_slice())
            .filter(|(_, e)| e.abs() < 5.0)
            .fold((0.0f32, 0.0f32, 0usize), |(s, m, n), (v, e)| {
                let err = (v - e).abs();
                (s + err, m.max(err), n + 1)
            });
        println!(
            "{:<14} {:>8.2?}  front {:>6}  mean error {:.3}  max error {:.3}",
            format!("{:?}", method),
            elapsed,
            report.front_voxels,
            sum / count.max(1) as f32,
            max
        );
    }

    Ok(())
}
