//! Vessel cross-section on a single slice
//!
//! Segments one slice of a synthetic tube with the vessel balloon scheme and
//! a Gaussian tissue class, then prints the final mask as ASCII.

use anyhow::Result;
use levelcrate_core::phantom::{add_noise, tube_phantom};
use levelcrate_core::{BalloonScheme, CurvatureMode, Dimensionality, Gaussian, GridGeometry, LevelSetConfig, Seed};
use levelcrate_evolution::{segment, EvolutionInputs};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let grid = GridGeometry::isotropic([40, 40, 8])?;
    let mut image = tube_phantom(&grid, [20.0, 20.0], 9.0, 180.0, 40.0);
    add_noise(&mut image, 10.0, &mut StdRng::seed_from_u64(11));

    let config = LevelSetConfig::new()
        .with_dimensionality(Dimensionality::Slice(4))
        .with_seed(Seed::new(20.0, 20.0, 4.0, 2.0))
        .with_gaussian(Gaussian::new(180.0, 15.0))
        .with_probability_thresholds(0.2, 0.5)
        .with_balloon(BalloonScheme::Vessels, 1.0)
        .with_curvature(CurvatureMode::Minimal, 0.1)
        .with_iterations(80);

    let result = segment(&config, EvolutionInputs::new(&image))?;
    println!("Finished after {} steps: {:?}", result.steps, result.status);
    println!("Inside pixels: {}\n", result.inside_count());

    let mask = result.mask(0.0);
    let [tx, ty, _] = mask.dims();
    for y in 0..ty {
        let row: String = (0..tx)
            .map(|x| if mask.get(x, y, 0) == Some(1) { '#' } else { '.' })
            .collect();
        println!("{}", row);
    }

    Ok(())
}
