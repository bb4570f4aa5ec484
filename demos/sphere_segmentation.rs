//! Balloon segmentation of a noisy sphere
//!
//! Seeds a small sphere in the middle of a bright ball wrapped in a brighter
//! shell and lets the balloon force inflate it until it meets the shell.

use anyhow::Result;
use levelcrate_core::phantom::{add_noise, grid_center, shell_phantom};
use levelcrate_core::{BalloonScheme, CurvatureMode, GridGeometry, LevelSetConfig, Seed};
use levelcrate_evolution::{evolve, finished_naturally, EvolutionInputs, LevelSet};
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    println!("levelcrate sphere segmentation");
    println!("==============================");

    let grid = GridGeometry::isotropic([48, 48, 48])?;
    let center = grid_center(&grid);
    let mut image = shell_phantom(&grid, center, 14.0, 3.0, [100.0, 250.0, 10.0]);
    add_noise(&mut image, 15.0, &mut StdRng::seed_from_u64(7));

    let config = LevelSetConfig::new()
        .with_seed(Seed::new(center.x, center.y, center.z, 4.0))
        .with_balloon(BalloonScheme::BrockettMaragos, 1.0)
        .with_curvature(CurvatureMode::Mean, 0.2)
        .with_thresholds(Some(50.0), Some(200.0))
        .with_iterations(120)
        .with_step(0.4)
        .with_converged_threshold(1e-3);

    let prepared = LevelSet::init_param(&config, EvolutionInputs::new(&image))?;
    if let Some(stats) = prepared.init_points_statistics() {
        println!(
            "Seed statistics: mean {:.1}, sd {:.1} over {} voxels",
            stats.mean, stats.sd, stats.count
        );
    }

    let result = evolve(&config, EvolutionInputs::new(&image), |report| {
        if let Some(metric) = report.convergence {
            info!(
                "step {:>3}: band {:>6}, balloon {:+.4}, drift {:.5}",
                report.step, report.band_size, report.mean_terms.balloon, metric
            );
        }
        false
    })?;

    let object = image.as_slice().iter().filter(|v| (50.0..200.0).contains(*v)).count();
    println!("\nFinished after {} steps: {:?}", result.steps, result.status);
    println!("Stopped on its own: {}", finished_naturally(&result));
    println!("Inside voxels: {} (object holds about {})", result.inside_count(), object);

    let mask = result.mask(0.0);
    let c = center.x.round() as usize;
    println!("Centre voxel inside: {}", mask.get(c, c, c) == Some(1));

    Ok(())
}
