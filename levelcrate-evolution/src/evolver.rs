//! One explicit time step over the narrow band
//!
//! The band is cut into contiguous chunks with [`split_band`]. Each chunk
//! reads the previous iterate freely and writes only its own slice of the
//! band-aligned output buffers; chunk statistics are merged in chunk order
//! after the join.

use crate::band::NarrowBand;
use crate::forces::{ForceField, ForceTerms};
use crate::parallel::{split_band, EvolutionPool};
use levelcrate_distance::front::is_inside;
use rayon::prelude::*;
use std::ops::Range;

/// Statistics of one band chunk
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChunkOutcome {
    /// Sum of the force terms over the chunk
    pub sums: ForceTerms,
    /// Voxels whose side of the front changed
    pub sign_changes: usize,
    /// A sign change happened outside the inner tube
    pub touched: bool,
    /// Voxels whose new value is NaN or infinite
    pub non_finite: usize,
}

impl ChunkOutcome {
    pub fn merge(self, other: Self) -> Self {
        Self {
            sums: self.sums + other.sums,
            sign_changes: self.sign_changes + other.sign_changes,
            touched: self.touched || other.touched,
            non_finite: self.non_finite + other.non_finite,
        }
    }
}

/// Band-aligned output of one step
#[derive(Debug, Clone, Default)]
pub struct StepBuffers {
    pub values: Vec<f32>,
    pub terms: Vec<ForceTerms>,
}

impl StepBuffers {
    fn fit(&mut self, len: usize) {
        self.values.resize(len, 0.0);
        self.terms.resize(len, ForceTerms::default());
    }
}

struct Chunk<'b> {
    range: Range<usize>,
    values: &'b mut [f32],
    terms: &'b mut [ForceTerms],
}

/// Cut the output buffers along the chunk boundaries
fn carve<'b>(len: usize, total: usize, mut values: &'b mut [f32], mut terms: &'b mut [ForceTerms]) -> Vec<Chunk<'b>> {
    (0..total)
        .map(|k| {
            let range = split_band(len, k, total);
            let (v, rest_v) = std::mem::take(&mut values).split_at_mut(range.len());
            let (t, rest_t) = std::mem::take(&mut terms).split_at_mut(range.len());
            values = rest_v;
            terms = rest_t;
            Chunk {
                range,
                values: v,
                terms: t,
            }
        })
        .collect()
}

fn evolve_chunk(forces: &ForceField<'_>, band: &NarrowBand, read: &[f32], dt: f32, chunk: Chunk<'_>) -> ChunkOutcome {
    let indices = &band.indices()[chunk.range.clone()];
    let initial = &band.initial_values()[chunk.range];
    let tube = band.tube();
    let mut outcome = ChunkOutcome::default();

    for (((&index, &start), value), term) in indices
        .iter()
        .zip(initial)
        .zip(chunk.values.iter_mut())
        .zip(chunk.terms.iter_mut())
    {
        let terms = forces.evaluate(read, index);
        let old = read[index];
        let new = old + dt * terms.total();

        if !new.is_finite() {
            outcome.non_finite += 1;
        } else if is_inside(old) != is_inside(new) {
            outcome.sign_changes += 1;
            if start.abs() >= tube {
                outcome.touched = true;
            }
        }
        outcome.sums += terms;
        *value = new;
        *term = terms;
    }
    outcome
}

/// Compute the next band values from `read` into `out`
pub fn evolve_band(
    pool: &EvolutionPool,
    forces: &ForceField<'_>,
    band: &NarrowBand,
    read: &[f32],
    dt: f32,
    out: &mut StepBuffers,
) -> ChunkOutcome {
    let len = band.len();
    out.fit(len);
    let chunks = carve(len, pool.threads(), &mut out.values, &mut out.terms);

    let outcomes: Vec<ChunkOutcome> = if pool.is_parallel() {
        pool.install(|| {
            chunks
                .into_par_iter()
                .map(|chunk| evolve_chunk(forces, band, read, dt, chunk))
                .collect()
        })
    } else {
        chunks
            .into_iter()
            .map(|chunk| evolve_chunk(forces, band, read, dt, chunk))
            .collect()
    };

    outcomes
        .into_iter()
        .fold(ChunkOutcome::default(), ChunkOutcome::merge)
}

/// Write the band values of `out` into `write`
pub fn scatter(band: &NarrowBand, out: &StepBuffers, write: &mut [f32]) {
    for (&index, &value) in band.indices().iter().zip(&out.values) {
        write[index] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadPoolConfig;
    use levelcrate_core::phantom::sphere_distance;
    use levelcrate_core::{BalloonScheme, GridGeometry, LevelSetConfig, Point3, Volume};

    fn setup() -> (GridGeometry, Volume<f32>, Volume<f32>, LevelSetConfig) {
        let grid = GridGeometry::isotropic([24, 24, 24]).unwrap();
        let u = sphere_distance(&grid, Point3::new(12.0, 12.0, 12.0), 5.0);
        let image = Volume::filled(grid, 100.0f32);
        let config = LevelSetConfig::new()
            .with_balloon(BalloonScheme::BrockettMaragos, 1.0)
            .with_curvature(levelcrate_core::CurvatureMode::Mean, 0.3);
        (grid, u, image, config)
    }

    #[test]
    fn test_chunking_does_not_change_values() {
        let (grid, u, image, config) = setup();
        let band = NarrowBand::build(&grid, u.as_slice(), 3.0, 1.0);
        let forces = ForceField::new(&config, &grid, image.as_slice());

        let mut results = Vec::new();
        for threads in [1, 3, 4] {
            let pool = EvolutionPool::new(&ThreadPoolConfig::default().with_threads(threads)).unwrap();
            let mut out = StepBuffers::default();
            let outcome = evolve_band(&pool, &forces, &band, u.as_slice(), 0.4, &mut out);
            results.push((out.values, outcome.sign_changes, outcome.non_finite));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[0], results[2]);
    }

    #[test]
    fn test_step_moves_front_and_flags_touch() {
        let (grid, u, image, config) = setup();
        let band = NarrowBand::build(&grid, u.as_slice(), 3.0, 0.3);
        let forces = ForceField::new(&config, &grid, image.as_slice());
        let pool = EvolutionPool::new(&ThreadPoolConfig::default()).unwrap();

        let mut out = StepBuffers::default();
        let outcome = evolve_band(&pool, &forces, &band, u.as_slice(), 0.9, &mut out);
        assert!(outcome.sign_changes > 0);
        assert!(outcome.touched);
        assert_eq!(outcome.non_finite, 0);
        assert!(outcome.sums.balloon < 0.0);

        let mut write = u.as_slice().to_vec();
        scatter(&band, &out, &mut write);
        let inside = |f: &[f32]| f.iter().filter(|v| **v < 0.0).count();
        assert!(inside(&write) > inside(u.as_slice()));
    }

    #[test]
    fn test_non_finite_values_are_counted() {
        let (grid, mut u, image, config) = setup();
        let band = NarrowBand::build(&grid, u.as_slice(), 3.0, 1.0);
        let target = band.indices()[0];
        u.as_mut_slice()[target] = f32::NAN;
        let forces = ForceField::new(&config, &grid, image.as_slice());
        let pool = EvolutionPool::new(&ThreadPoolConfig::default()).unwrap();

        let mut out = StepBuffers::default();
        let outcome = evolve_band(&pool, &forces, &band, u.as_slice(), 0.4, &mut out);
        assert!(outcome.non_finite >= 1);
    }

    #[test]
    fn test_merge_keeps_touch() {
        let a = ChunkOutcome {
            sign_changes: 2,
            touched: true,
            ..ChunkOutcome::default()
        };
        let b = ChunkOutcome {
            non_finite: 1,
            ..ChunkOutcome::default()
        };
        let merged = a.merge(b);
        assert_eq!(merged.sign_changes, 2);
        assert!(merged.touched);
        assert_eq!(merged.non_finite, 1);
    }
}
