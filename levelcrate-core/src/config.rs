//! Level-set evolution parameters
//!
//! [`LevelSetConfig`] is built once, validated when an evolution is set up,
//! and then only borrowed. Mode selectors are exhaustive enums; the legacy
//! integer codes convert through `TryFrom<i32>` and reject unknown values.

use crate::{Error, Result};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Algorithm used to (re)build the signed distance map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMethod {
    /// Iterative relaxation from a discrete ±½ front; coarse and slow
    Curves,
    /// Fast marching from a sub-voxel front
    #[default]
    FastMarching,
    /// Two-pass signed chamfer propagation
    Chamfer,
    /// Danielsson propagation combined with a skeleton image
    Shape,
}

impl TryFrom<i32> for DistanceMethod {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Curves),
            1 => Ok(Self::FastMarching),
            2 => Ok(Self::Chamfer),
            3 => Ok(Self::Shape),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported distance map method {}",
                other
            ))),
        }
    }
}

/// Discretisation of the advection term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdvectionScheme {
    /// Attachment vectors dotted with an upwind gradient of `u`
    #[default]
    UpwindVectors,
    /// Attachment vectors dotted with a central gradient of `u`
    CentralVectors,
    /// Morphological force from the second derivative along the image gradient
    Morpho,
}

impl TryFrom<i32> for AdvectionScheme {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::UpwindVectors),
            1 => Ok(Self::CentralVectors),
            2 => Ok(Self::Morpho),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported advection scheme {}",
                other
            ))),
        }
    }
}

/// Balloon force variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BalloonScheme {
    /// Signed expansion/contraction speed with entropy-satisfying upwinding
    #[default]
    BrockettMaragos,
    /// Expansion-only speed, suited to thin tubular structures
    Vessels,
}

impl TryFrom<i32> for BalloonScheme {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::BrockettMaragos),
            1 => Ok(Self::Vessels),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported balloon scheme {}",
                other
            ))),
        }
    }
}

/// Curvature used by the smoothing term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurvatureMode {
    /// Mean curvature
    #[default]
    Mean,
    /// Smallest principal curvature (codimension-2 smoothing); 3D only
    Minimal,
}

/// Which side of the threshold is the structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StructureIntensity {
    /// Structure brighter than its surroundings
    #[default]
    Bright,
    /// Structure darker than its surroundings
    Dark,
}

impl TryFrom<i32> for StructureIntensity {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Bright),
            1 => Ok(Self::Dark),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported structure intensity {}",
                other
            ))),
        }
    }
}

impl StructureIntensity {
    /// +1 for bright structures, -1 for dark ones
    pub fn sign(self) -> f32 {
        match self {
            Self::Bright => 1.0,
            Self::Dark => -1.0,
        }
    }
}

/// Evolve the whole volume or a single z-slice of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dimensionality {
    #[default]
    Volume,
    Slice(usize),
}

impl Dimensionality {
    /// Map the legacy `Dimension`/`SliceNum` pair
    pub fn from_legacy(dimension: i32, slice: usize) -> Result<Self> {
        match dimension {
            2 => Ok(Self::Slice(slice)),
            3 => Ok(Self::Volume),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported dimension {}",
                other
            ))),
        }
    }
}

/// Sphere (or disk on a slice) seeding the initial zero level set, in voxel units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl Seed {
    pub fn new(x: f32, y: f32, z: f32, radius: f32) -> Self {
        Self {
            center: Point3::new(x, y, z),
            radius,
        }
    }
}

/// Intensity class of the tissue of interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub mean: f32,
    pub sd: f32,
}

impl Gaussian {
    pub fn new(mean: f32, sd: f32) -> Self {
        Self { mean, sd }
    }
}

/// Complete parameter bundle of a level-set evolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelSetConfig {
    /// Threshold used to seed from an initial image or the input itself
    pub init_threshold: f32,
    /// Balloon contracts below this intensity
    pub low_threshold: Option<f32>,
    /// Balloon contracts above this intensity
    pub high_threshold: Option<f32>,
    pub structure: StructureIntensity,

    /// Explicit time step
    pub step_dt: f32,
    /// Iteration cap
    pub num_iters: usize,
    /// Convergence is checked every `check_freq` iterations
    pub check_freq: usize,
    /// The distance map is rebuilt every `reinit_freq` iterations
    pub reinit_freq: usize,
    /// Mean clipped drift per band voxel under which the evolution has converged
    pub converged_thresh: f32,

    /// Narrow band half-width, in voxels
    pub band: f32,
    /// Inner band thickness, in voxels; crossing it triggers a band rebuild
    pub tube: f32,

    pub distance_method: DistanceMethod,
    /// Minimum depth given to the skeleton in shape mode, in voxels
    pub shape_min_dist: f32,

    pub advection_scheme: AdvectionScheme,
    pub balloon_scheme: BalloonScheme,
    pub curvature_mode: CurvatureMode,

    pub curvature_coeff: f32,
    pub advection_coeff: f32,
    pub balloon_coeff: f32,
    pub velocity_coeff: f32,

    /// Fraction of gradient norms below the one mapped to unit attachment gain
    pub histo_grad_threshold: f32,
    /// Scale vector advection by |cos| between the front normal and the attachment
    pub use_cos_term: bool,

    /// Probability under which the balloon contracts
    pub probability_threshold: f32,
    /// Probability at which the balloon reaches full expansion speed
    pub probability_high_threshold: f32,
    pub gaussians: Vec<Gaussian>,
    pub seeds: Vec<Seed>,

    /// Worker threads for the band update; 0 picks the number of CPUs
    pub evolve_threads: usize,
    pub dimensionality: Dimensionality,

    /// Binarise the seed to ±0.5 before the first distance map
    pub iso_contour_bin: bool,
    /// Rescale the input intensities to [0, 255]
    pub rescale_image: bool,
    /// Ignore the input spacing and use unit voxels
    pub isotropic_voxels: bool,
    /// Fail with a divergence error when a band value becomes non-finite
    pub detect_divergence: bool,
    /// Record per-voxel force terms during each iteration
    pub capture_terms: bool,
}

impl Default for LevelSetConfig {
    fn default() -> Self {
        Self {
            init_threshold: 0.0,
            low_threshold: None,
            high_threshold: None,
            structure: StructureIntensity::Bright,
            step_dt: 0.4,
            num_iters: 50,
            check_freq: 5,
            reinit_freq: 5,
            converged_thresh: 0.01,
            band: 4.0,
            tube: 2.0,
            distance_method: DistanceMethod::FastMarching,
            shape_min_dist: 2.0,
            advection_scheme: AdvectionScheme::UpwindVectors,
            balloon_scheme: BalloonScheme::BrockettMaragos,
            curvature_mode: CurvatureMode::Mean,
            curvature_coeff: 0.2,
            advection_coeff: 0.0,
            balloon_coeff: 0.0,
            velocity_coeff: 0.0,
            histo_grad_threshold: 0.8,
            use_cos_term: false,
            probability_threshold: 0.3,
            probability_high_threshold: 0.6,
            gaussians: Vec::new(),
            seeds: Vec::new(),
            evolve_threads: 1,
            dimensionality: Dimensionality::Volume,
            iso_contour_bin: false,
            rescale_image: false,
            isotropic_voxels: false,
            detect_divergence: true,
            capture_terms: false,
        }
    }
}

impl LevelSetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step_dt: f32) -> Self {
        self.step_dt = step_dt;
        self
    }

    pub fn with_iterations(mut self, num_iters: usize) -> Self {
        self.num_iters = num_iters;
        self
    }

    pub fn with_check_frequency(mut self, check_freq: usize) -> Self {
        self.check_freq = check_freq;
        self
    }

    pub fn with_reinit_frequency(mut self, reinit_freq: usize) -> Self {
        self.reinit_freq = reinit_freq;
        self
    }

    pub fn with_converged_threshold(mut self, converged_thresh: f32) -> Self {
        self.converged_thresh = converged_thresh;
        self
    }

    /// Set band half-width and inner tube thickness
    pub fn with_band(mut self, band: f32, tube: f32) -> Self {
        self.band = band;
        self.tube = tube;
        self
    }

    pub fn with_distance_method(mut self, method: DistanceMethod) -> Self {
        self.distance_method = method;
        self
    }

    pub fn with_shape_min_dist(mut self, shape_min_dist: f32) -> Self {
        self.shape_min_dist = shape_min_dist;
        self
    }

    pub fn with_curvature(mut self, mode: CurvatureMode, coeff: f32) -> Self {
        self.curvature_mode = mode;
        self.curvature_coeff = coeff;
        self
    }

    pub fn with_advection(mut self, scheme: AdvectionScheme, coeff: f32) -> Self {
        self.advection_scheme = scheme;
        self.advection_coeff = coeff;
        self
    }

    pub fn with_balloon(mut self, scheme: BalloonScheme, coeff: f32) -> Self {
        self.balloon_scheme = scheme;
        self.balloon_coeff = coeff;
        self
    }

    pub fn with_velocity_coeff(mut self, coeff: f32) -> Self {
        self.velocity_coeff = coeff;
        self
    }

    /// Zero every force coefficient
    pub fn without_forces(mut self) -> Self {
        self.curvature_coeff = 0.0;
        self.advection_coeff = 0.0;
        self.balloon_coeff = 0.0;
        self.velocity_coeff = 0.0;
        self
    }

    pub fn with_init_threshold(mut self, threshold: f32) -> Self {
        self.init_threshold = threshold;
        self
    }

    pub fn with_thresholds(mut self, low: Option<f32>, high: Option<f32>) -> Self {
        self.low_threshold = low;
        self.high_threshold = high;
        self
    }

    pub fn with_structure(mut self, structure: StructureIntensity) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seeds.push(seed);
        self
    }

    pub fn with_gaussian(mut self, gaussian: Gaussian) -> Self {
        self.gaussians.push(gaussian);
        self
    }

    pub fn with_probability_thresholds(mut self, low: f32, high: f32) -> Self {
        self.probability_threshold = low;
        self.probability_high_threshold = high;
        self
    }

    pub fn with_histo_grad_threshold(mut self, fraction: f32) -> Self {
        self.histo_grad_threshold = fraction;
        self
    }

    pub fn with_cos_term(mut self, enabled: bool) -> Self {
        self.use_cos_term = enabled;
        self
    }

    pub fn with_threads(mut self, evolve_threads: usize) -> Self {
        self.evolve_threads = evolve_threads;
        self
    }

    pub fn with_dimensionality(mut self, dimensionality: Dimensionality) -> Self {
        self.dimensionality = dimensionality;
        self
    }

    pub fn with_iso_contour_bin(mut self, enabled: bool) -> Self {
        self.iso_contour_bin = enabled;
        self
    }

    pub fn with_rescale(mut self, enabled: bool) -> Self {
        self.rescale_image = enabled;
        self
    }

    pub fn with_isotropic_voxels(mut self, enabled: bool) -> Self {
        self.isotropic_voxels = enabled;
        self
    }

    pub fn with_divergence_detection(mut self, enabled: bool) -> Self {
        self.detect_divergence = enabled;
        self
    }

    pub fn with_term_capture(mut self, enabled: bool) -> Self {
        self.capture_terms = enabled;
        self
    }

    /// Check parameter consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfiguration(msg));

        if self.num_iters == 0 {
            return invalid("num_iters must be positive".to_string());
        }
        if self.check_freq == 0 {
            return invalid("check_freq must be positive".to_string());
        }
        if self.reinit_freq == 0 {
            return invalid("reinit_freq must be positive".to_string());
        }
        if !self.step_dt.is_finite() || self.step_dt <= 0.0 {
            return invalid(format!("step_dt must be finite and positive, got {}", self.step_dt));
        }
        if !self.converged_thresh.is_finite() || self.converged_thresh < 0.0 {
            return invalid(format!(
                "converged_thresh must be finite and non-negative, got {}",
                self.converged_thresh
            ));
        }
        if !(self.tube > 0.0 && self.tube < self.band && self.band.is_finite()) {
            return invalid(format!(
                "band/tube must satisfy 0 < tube < band, got band {} tube {}",
                self.band, self.tube
            ));
        }
        if !self.shape_min_dist.is_finite() || self.shape_min_dist < 0.0 {
            return invalid(format!("shape_min_dist must be non-negative, got {}", self.shape_min_dist));
        }
        if !(self.histo_grad_threshold > 0.0 && self.histo_grad_threshold <= 1.0) {
            return invalid(format!(
                "histo_grad_threshold must lie in (0, 1], got {}",
                self.histo_grad_threshold
            ));
        }
        if let (Some(low), Some(high)) = (self.low_threshold, self.high_threshold) {
            if low >= high {
                return invalid(format!("low threshold {} must be below high threshold {}", low, high));
            }
        }
        if !(0.0..=1.0).contains(&self.probability_threshold)
            || !(0.0..=1.0).contains(&self.probability_high_threshold)
            || self.probability_high_threshold < self.probability_threshold
        {
            return invalid(format!(
                "probability thresholds must satisfy 0 <= low <= high <= 1, got {} and {}",
                self.probability_threshold, self.probability_high_threshold
            ));
        }
        if let Some(g) = self.gaussians.iter().find(|g| !g.mean.is_finite() || !(g.sd > 0.0)) {
            return invalid(format!("gaussian ({}, {}) needs a positive deviation", g.mean, g.sd));
        }
        if let Some(s) = self.seeds.iter().find(|s| !(s.radius > 0.0)) {
            return invalid(format!("seed radius must be positive, got {}", s.radius));
        }
        let coefficients = [
            self.curvature_coeff,
            self.advection_coeff,
            self.balloon_coeff,
            self.velocity_coeff,
        ];
        if coefficients.iter().any(|c| !c.is_finite()) {
            return invalid("force coefficients must be finite".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LevelSetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.distance_method, DistanceMethod::FastMarching);
        assert_eq!(config.evolve_threads, 1);
    }

    #[test]
    fn test_builder_chain() {
        let config = LevelSetConfig::new()
            .with_iterations(10)
            .with_band(5.0, 3.0)
            .with_balloon(BalloonScheme::Vessels, 0.5)
            .with_seed(Seed::new(1.0, 2.0, 3.0, 4.0))
            .with_gaussian(Gaussian::new(100.0, 10.0));

        assert_eq!(config.num_iters, 10);
        assert_eq!(config.tube, 3.0);
        assert_eq!(config.balloon_scheme, BalloonScheme::Vessels);
        assert_eq!(config.seeds.len(), 1);
        assert_eq!(config.gaussians[0].sd, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_codes() {
        assert_eq!(DistanceMethod::try_from(2).unwrap(), DistanceMethod::Chamfer);
        assert_eq!(AdvectionScheme::try_from(2).unwrap(), AdvectionScheme::Morpho);
        assert_eq!(BalloonScheme::try_from(1).unwrap(), BalloonScheme::Vessels);
        assert_eq!(StructureIntensity::try_from(1).unwrap(), StructureIntensity::Dark);
        assert_eq!(Dimensionality::from_legacy(2, 7).unwrap(), Dimensionality::Slice(7));

        for err in [
            DistanceMethod::try_from(4).unwrap_err(),
            AdvectionScheme::try_from(-1).unwrap_err(),
            BalloonScheme::try_from(2).unwrap_err(),
            Dimensionality::from_legacy(4, 0).unwrap_err(),
        ] {
            assert!(matches!(err, Error::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            LevelSetConfig::new().with_iterations(0),
            LevelSetConfig::new().with_check_frequency(0),
            LevelSetConfig::new().with_reinit_frequency(0),
            LevelSetConfig::new().with_step(-0.1),
            LevelSetConfig::new().with_step(f32::NAN),
            LevelSetConfig::new().with_band(2.0, 2.0),
            LevelSetConfig::new().with_histo_grad_threshold(0.0),
            LevelSetConfig::new().with_thresholds(Some(10.0), Some(5.0)),
            LevelSetConfig::new().with_probability_thresholds(0.7, 0.2),
            LevelSetConfig::new().with_gaussian(Gaussian::new(10.0, 0.0)),
            LevelSetConfig::new().with_seed(Seed::new(0.0, 0.0, 0.0, -1.0)),
            LevelSetConfig::new().with_balloon(BalloonScheme::BrockettMaragos, f32::INFINITY),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfiguration(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn test_serde_roundtrip_with_defaults() {
        let json = r#"{ "num_iters": 12, "distance_method": "Chamfer", "dimensionality": { "Slice": 3 } }"#;
        let config: LevelSetConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.num_iters, 12);
        assert_eq!(config.distance_method, DistanceMethod::Chamfer);
        assert_eq!(config.dimensionality, Dimensionality::Slice(3));
        assert_eq!(config.band, LevelSetConfig::default().band);
    }
}
