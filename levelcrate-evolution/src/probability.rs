//! Tissue probability lookup table
//!
//! Each Gaussian class gives `exp(-(I - mean)^2 / (2 sd^2))`; the probability
//! of an intensity is the best match over all classes. Intensities are
//! expected in [0, 255] and rounded to the nearest table entry.

use levelcrate_core::Gaussian;

pub const LUT_SIZE: usize = 256;

/// Probability table and the balloon weights derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionMap {
    gaussians: Vec<Gaussian>,
    table: Vec<f32>,
    low: f32,
    high: f32,
}

impl ExpansionMap {
    /// `low` and `high` are the probability thresholds of the balloon ramp
    pub fn new(gaussians: &[Gaussian], low: f32, high: f32) -> Self {
        let mut map = Self {
            gaussians: gaussians.to_vec(),
            table: vec![0.0; LUT_SIZE],
            low,
            high,
        };
        map.rebuild();
        map
    }

    /// Replace the classes and recompute the table
    pub fn set_gaussians(&mut self, gaussians: &[Gaussian]) {
        self.gaussians = gaussians.to_vec();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        for (level, entry) in self.table.iter_mut().enumerate() {
            let intensity = level as f32;
            *entry = self
                .gaussians
                .iter()
                .map(|g| {
                    let d = intensity - g.mean;
                    (-d * d / (2.0 * g.sd * g.sd)).exp()
                })
                .fold(0.0, f32::max);
        }
    }

    pub fn gaussians(&self) -> &[Gaussian] {
        &self.gaussians
    }

    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    pub fn max_probability(&self) -> f32 {
        self.table.iter().copied().fold(0.0, f32::max)
    }

    pub fn probability(&self, intensity: f32) -> f32 {
        let level = if intensity.is_finite() {
            intensity.clamp(0.0, (LUT_SIZE - 1) as f32).round() as usize
        } else {
            0
        };
        self.table[level]
    }

    /// Balloon weight in [-1, 1]: negative under the low threshold, ramping
    /// to full expansion at the high threshold
    pub fn expansion(&self, intensity: f32) -> f32 {
        let p = self.probability(intensity);
        if self.high > self.low {
            ((p - self.low) / (self.high - self.low)).clamp(-1.0, 1.0)
        } else if p >= self.low {
            1.0
        } else {
            -1.0
        }
    }

    /// Balloon weight of `intensity`, rebuilding the table first when asked
    pub fn expansion_map(&mut self, intensity: f32, recompute: bool) -> f32 {
        if recompute {
            self.rebuild();
        }
        self.expansion(intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_peak_at_mean() {
        let map = ExpansionMap::new(&[Gaussian::new(120.0, 10.0)], 0.3, 0.6);
        assert_relative_eq!(map.probability(120.0), map.max_probability());
        assert_relative_eq!(map.max_probability(), 1.0);
        assert!(map.probability(0.0) < 1e-6);
        assert!(map.probability(255.0) < 1e-6);
        assert_relative_eq!(map.probability(130.0), (-0.5f32).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_best_class_wins() {
        let map = ExpansionMap::new(&[Gaussian::new(50.0, 5.0), Gaussian::new(200.0, 20.0)], 0.3, 0.6);
        assert_relative_eq!(map.probability(50.0), 1.0);
        assert_relative_eq!(map.probability(200.0), 1.0);
        assert!(map.probability(125.0) < 1e-3);
    }

    #[test]
    fn test_out_of_range_intensities_clamp() {
        let map = ExpansionMap::new(&[Gaussian::new(255.0, 4.0)], 0.3, 0.6);
        assert_relative_eq!(map.probability(1000.0), 1.0);
        assert_relative_eq!(map.probability(f32::NAN), map.table()[0]);
    }

    #[test]
    fn test_expansion_ramp() {
        let mut map = ExpansionMap::new(&[Gaussian::new(100.0, 10.0)], 0.3, 0.6);
        assert_relative_eq!(map.expansion(100.0), 1.0);
        assert_relative_eq!(map.expansion(250.0), -1.0);
        let p = map.probability(110.0);
        assert_relative_eq!(map.expansion(110.0), (p - 0.3) / 0.3, epsilon = 1e-6);

        map.set_gaussians(&[Gaussian::new(250.0, 10.0)]);
        assert_relative_eq!(map.expansion_map(250.0, false), 1.0);
        assert_relative_eq!(map.expansion_map(100.0, true), -1.0);
    }

    #[test]
    fn test_step_when_thresholds_coincide() {
        let map = ExpansionMap::new(&[Gaussian::new(100.0, 10.0)], 0.5, 0.5);
        assert_relative_eq!(map.expansion(100.0), 1.0);
        assert_relative_eq!(map.expansion(200.0), -1.0);
    }

    #[test]
    fn test_no_classes() {
        let map = ExpansionMap::new(&[], 0.3, 0.6);
        assert!(map.is_empty());
        assert_relative_eq!(map.max_probability(), 0.0);
    }
}
