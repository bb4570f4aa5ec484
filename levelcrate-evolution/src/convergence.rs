//! Convergence test on the band
//!
//! Values are clipped to [-1, 1] before comparison so only the neighbourhood
//! of the front counts; far band values drifting under a saturated balloon
//! do not keep an evolution alive. A zero threshold is the exception: it
//! accepts only a band where no value changed at all.

use crate::band::NarrowBand;

const CLIP: f32 = 1.0;

#[inline]
fn clip(v: f32) -> f32 {
    v.clamp(-CLIP, CLIP)
}

/// Outcome of one convergence check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceCheck {
    /// Mean clipped drift per band voxel since the previous check
    pub metric: f32,
    /// Largest unclipped change of a band value
    pub max_drift: f32,
    pub converged: bool,
}

/// Band-aligned snapshot compared against at every check
#[derive(Debug, Clone, Default)]
pub struct ConvergenceMonitor {
    snapshot: Vec<f32>,
    threshold: f32,
}

impl ConvergenceMonitor {
    pub fn new(threshold: f32) -> Self {
        Self {
            snapshot: Vec::new(),
            threshold,
        }
    }

    /// Take a new snapshot; call after every band rebuild
    pub fn reset(&mut self, band: &NarrowBand, u: &[f32]) {
        self.snapshot.clear();
        self.snapshot.extend(band.indices().iter().map(|&i| u[i]));
    }

    /// Mean clipped drift since the snapshot
    pub fn measure(&self, band: &NarrowBand, u: &[f32]) -> f32 {
        if band.is_empty() {
            return 0.0;
        }
        let total: f64 = band
            .indices()
            .iter()
            .zip(&self.snapshot)
            .map(|(&i, &old)| f64::from((clip(u[i]) - clip(old)).abs()))
            .sum();
        (total / band.len() as f64) as f32
    }

    /// Largest unclipped change since the snapshot
    pub fn max_drift(&self, band: &NarrowBand, u: &[f32]) -> f32 {
        band.indices()
            .iter()
            .zip(&self.snapshot)
            .map(|(&i, &old)| (u[i] - old).abs())
            .fold(0.0, f32::max)
    }

    /// Compare against the snapshot, then refresh it
    pub fn check(&mut self, band: &NarrowBand, u: &[f32]) -> ConvergenceCheck {
        let metric = self.measure(band, u);
        let max_drift = self.max_drift(band, u);
        self.reset(band, u);
        let converged = if self.threshold > 0.0 {
            metric <= self.threshold
        } else {
            max_drift == 0.0
        };
        ConvergenceCheck {
            metric,
            max_drift,
            converged,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}
