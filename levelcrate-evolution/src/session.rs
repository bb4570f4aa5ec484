//! Evolution session
//!
//! A run goes through three stages:
//!
//! 1. [`LevelSet::init_param`] validates the configuration and every input
//!    field, then prepares a float working copy of the image.
//! 2. [`LevelSet::init_evolution`] seeds the implicit function, builds the
//!    first distance map and band, and precomputes the image-derived forces.
//! 3. [`Evolution::iterate`] advances one step per call, so a host can poll
//!    for cancellation between steps; [`Evolution::end_evolution`] hands
//!    back the field.
//!
//! The configuration and the caller's fields are borrowed for the whole run
//! and never written.

use crate::attachment::{precompute_data_attachment, DataAttachment};
use crate::band::NarrowBand;
use crate::convergence::ConvergenceMonitor;
use crate::evolver::{evolve_band, scatter, StepBuffers};
use crate::forces::{ForceField, ForceTerms};
use crate::parallel::{EvolutionPool, ThreadPoolConfig};
use crate::probability::ExpansionMap;
use crate::seeding::{initial_field, init_points_statistics, SeedStatistics};
use levelcrate_core::{
    Dimensionality, DistanceMethod, DistanceReport, Error, GridGeometry, LevelSetConfig, Result, VectorField,
    Volume,
};
use levelcrate_distance::distance_map;
use log::{debug, info, warn};
use std::borrow::Cow;

/// Image and optional auxiliary fields of one evolution
///
/// Every field must have the dimensions of `image`.
#[derive(Debug, Clone, Copy)]
pub struct EvolutionInputs<'a> {
    pub image: &'a Volume<f32>,
    pub init_image: Option<&'a Volume<f32>>,
    pub advection_field: Option<&'a VectorField>,
    pub velocity: Option<&'a VectorField>,
    pub balloon_image: Option<&'a Volume<f32>>,
    pub skeleton: Option<&'a Volume<u8>>,
    pub curvature_weights: Option<&'a Volume<f32>>,
}

impl<'a> EvolutionInputs<'a> {
    pub fn new(image: &'a Volume<f32>) -> Self {
        Self {
            image,
            init_image: None,
            advection_field: None,
            velocity: None,
            balloon_image: None,
            skeleton: None,
            curvature_weights: None,
        }
    }

    pub fn with_init_image(mut self, init_image: &'a Volume<f32>) -> Self {
        self.init_image = Some(init_image);
        self
    }

    pub fn with_advection_field(mut self, field: &'a VectorField) -> Self {
        self.advection_field = Some(field);
        self
    }

    pub fn with_velocity(mut self, velocity: &'a VectorField) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_balloon_image(mut self, balloon_image: &'a Volume<f32>) -> Self {
        self.balloon_image = Some(balloon_image);
        self
    }

    pub fn with_skeleton(mut self, skeleton: &'a Volume<u8>) -> Self {
        self.skeleton = Some(skeleton);
        self
    }

    pub fn with_curvature_weights(mut self, weights: &'a Volume<f32>) -> Self {
        self.curvature_weights = Some(weights);
        self
    }

    /// Reject any auxiliary field whose dimensions differ from the image
    pub fn validate_dimensions(&self) -> Result<()> {
        let grid = self.image.geometry();
        if let Some(v) = self.init_image {
            grid.ensure_same_dims("init image", v.dims())?;
        }
        if let Some(v) = self.advection_field {
            grid.ensure_same_dims("advection field", v.dims())?;
        }
        if let Some(v) = self.velocity {
            grid.ensure_same_dims("velocity", v.dims())?;
        }
        if let Some(v) = self.balloon_image {
            grid.ensure_same_dims("balloon image", v.dims())?;
        }
        if let Some(v) = self.skeleton {
            grid.ensure_same_dims("skeleton", v.dims())?;
        }
        if let Some(v) = self.curvature_weights {
            grid.ensure_same_dims("curvature weights", v.dims())?;
        }
        Ok(())
    }

    /// Reject NaN or infinite values in the image and the float fields
    pub fn validate_values(&self) -> Result<()> {
        ensure_finite("image", self.image.as_slice().iter().copied())?;
        for (field, volume) in [
            ("init image", self.init_image),
            ("balloon image", self.balloon_image),
            ("curvature weights", self.curvature_weights),
        ] {
            if let Some(v) = volume {
                ensure_finite(field, v.as_slice().iter().copied())?;
            }
        }
        for (field, vectors) in [("advection field", self.advection_field), ("velocity", self.velocity)] {
            if let Some(v) = vectors {
                ensure_finite(field, v.as_slice().iter().flat_map(|w| [w.x, w.y, w.z]))?;
            }
        }
        Ok(())
    }
}

fn ensure_finite(field: &str, values: impl Iterator<Item = f32>) -> Result<()> {
    let bad = values.filter(|v| !v.is_finite()).count();
    if bad > 0 {
        return Err(Error::InvalidData(format!("{} holds {} non-finite values", field, bad)));
    }
    Ok(())
}

/// Where an evolution stands after a call to [`Evolution::iterate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterationStatus {
    /// More iterations are needed
    Running,
    /// The convergence metric fell under the threshold
    Converged,
    /// The iteration cap was reached
    IterationLimit,
    /// No voxel is left near the zero level set
    EmptyBand,
    /// Stopped by the caller
    Aborted,
}

impl IterationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, IterationStatus::Running)
    }
}

/// Statistics of one iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// Iteration count after this step
    pub step: usize,
    pub band_size: usize,
    /// Force terms averaged over the band
    pub mean_terms: ForceTerms,
    pub sign_changes: usize,
    /// The distance map and band were rebuilt before this step
    pub reinitialized: bool,
    /// Convergence metric when a check ran on this step
    pub convergence: Option<f32>,
}

/// Full-grid force terms of the last iteration, zero outside the band
#[derive(Debug, Clone, PartialEq)]
pub struct TermFields {
    pub curvature: Vec<f32>,
    pub advection: Vec<f32>,
    pub balloon: Vec<f32>,
    pub velocity: Vec<f32>,
    /// Field right after the last distance map
    pub distance_map: Vec<f32>,
}

impl TermFields {
    fn new(len: usize) -> Self {
        Self {
            curvature: vec![0.0; len],
            advection: vec![0.0; len],
            balloon: vec![0.0; len],
            velocity: vec![0.0; len],
            distance_map: vec![0.0; len],
        }
    }

    fn record(&mut self, band: &NarrowBand, terms: &[ForceTerms]) {
        for field in [
            &mut self.curvature,
            &mut self.advection,
            &mut self.balloon,
            &mut self.velocity,
        ] {
            field.iter_mut().for_each(|v| *v = 0.0);
        }
        for (&i, t) in band.indices().iter().zip(terms) {
            self.curvature[i] = t.curvature;
            self.advection[i] = t.advection;
            self.balloon[i] = t.balloon;
            self.velocity[i] = t.velocity;
        }
    }
}

/// Final field and history of an evolution
#[derive(Debug, Clone)]
pub struct EvolutionResult {
    pub field: Volume<f32>,
    pub steps: usize,
    pub status: IterationStatus,
    pub reports: Vec<IterationReport>,
}

impl EvolutionResult {
    /// Binary mask of the voxels below `level`
    pub fn mask(&self, level: f32) -> Volume<u8> {
        self.field.map(|&v| u8::from(v < level))
    }

    /// Number of voxels inside the zero level set
    pub fn inside_count(&self) -> usize {
        self.field.as_slice().iter().filter(|v| **v < 0.0).count()
    }
}

/// Auxiliary fields after slicing, borrowed when no slicing was needed
#[derive(Debug, Clone)]
struct Fields<'a> {
    init_image: Option<Cow<'a, Volume<f32>>>,
    advection_field: Option<Cow<'a, VectorField>>,
    velocity: Option<Cow<'a, VectorField>>,
    balloon_image: Option<Cow<'a, Volume<f32>>>,
    skeleton: Option<Cow<'a, Volume<u8>>>,
    curvature_weights: Option<Cow<'a, Volume<f32>>>,
}

fn sliced_volume<'a, T: Copy>(
    volume: Option<&'a Volume<T>>,
    slice: Option<usize>,
) -> Result<Option<Cow<'a, Volume<T>>>> {
    match (volume, slice) {
        (Some(v), Some(z)) => Ok(Some(Cow::Owned(v.slice(z)?))),
        (Some(v), None) => Ok(Some(Cow::Borrowed(v))),
        (None, _) => Ok(None),
    }
}

fn sliced_vectors<'a>(field: Option<&'a VectorField>, slice: Option<usize>) -> Result<Option<Cow<'a, VectorField>>> {
    match (field, slice) {
        (Some(v), Some(z)) => Ok(Some(Cow::Owned(v.slice(z)?))),
        (Some(v), None) => Ok(Some(Cow::Borrowed(v))),
        (None, _) => Ok(None),
    }
}

/// Validated configuration and prepared inputs, ready to start evolving
#[derive(Debug, Clone)]
pub struct LevelSet<'a> {
    config: &'a LevelSetConfig,
    geometry: GridGeometry,
    image: Volume<f32>,
    fields: Fields<'a>,
}

impl<'a> LevelSet<'a> {
    /// Validate everything and build the float working copy of the image
    pub fn init_param(config: &'a LevelSetConfig, inputs: EvolutionInputs<'a>) -> Result<Self> {
        config.validate()?;
        if inputs.image.is_empty() {
            return Err(Error::InvalidConfiguration("input image is empty".to_string()));
        }
        inputs.validate_dimensions()?;
        inputs.validate_values()?;
        if config.distance_method == DistanceMethod::Shape && inputs.skeleton.is_none() {
            return Err(Error::InvalidConfiguration(
                "shape-based distance map requires a skeleton image".to_string(),
            ));
        }

        let slice = match config.dimensionality {
            Dimensionality::Volume => None,
            Dimensionality::Slice(z) => Some(z),
        };
        let mut image = match slice {
            Some(z) => inputs.image.slice(z)?,
            None => inputs.image.clone(),
        };
        if config.rescale_image {
            image = image.rescaled(0.0, 255.0);
        }
        let mut geometry = *image.geometry();
        if config.isotropic_voxels {
            geometry = geometry.with_unit_spacing();
            image = image.with_geometry(geometry)?;
        }

        let fields = Fields {
            init_image: sliced_volume(inputs.init_image, slice)?,
            advection_field: sliced_vectors(inputs.advection_field, slice)?,
            velocity: sliced_vectors(inputs.velocity, slice)?,
            balloon_image: sliced_volume(inputs.balloon_image, slice)?,
            skeleton: sliced_volume(inputs.skeleton, slice)?,
            curvature_weights: sliced_volume(inputs.curvature_weights, slice)?,
        };

        debug!(
            "level set prepared on grid {:?}, spacing ({}, {}, {})",
            geometry.dims(),
            geometry.spacing().x,
            geometry.spacing().y,
            geometry.spacing().z
        );
        Ok(Self {
            config,
            geometry,
            image,
            fields,
        })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Working copy of the image after slicing and rescaling
    pub fn image(&self) -> &Volume<f32> {
        &self.image
    }

    /// Intensity statistics inside the configured seeds
    pub fn init_points_statistics(&self) -> Option<SeedStatistics> {
        init_points_statistics(&self.geometry, self.image.as_slice(), &self.config.seeds)
    }

    /// Seed the implicit function and prepare the first iteration
    pub fn init_evolution(self) -> Result<Evolution<'a>> {
        let LevelSet {
            config,
            geometry,
            image,
            mut fields,
        } = self;

        let pool = EvolutionPool::new(&ThreadPoolConfig::default().with_threads(config.evolve_threads))?;

        let attachment = match fields.advection_field.take() {
            Some(user) => Some(precompute_data_attachment(
                config.advection_scheme,
                &image,
                config.histo_grad_threshold,
                Some(user),
            )?),
            None if config.advection_coeff != 0.0 => Some(precompute_data_attachment(
                config.advection_scheme,
                &image,
                config.histo_grad_threshold,
                None,
            )?),
            None => None,
        };
        let expansion = (!config.gaussians.is_empty()).then(|| {
            ExpansionMap::new(
                &config.gaussians,
                config.probability_threshold,
                config.probability_high_threshold,
            )
        });

        let seed = initial_field(
            config,
            &geometry,
            image.as_slice(),
            fields.init_image.as_deref().map(Volume::as_slice),
        );
        let min_spacing = geometry.spacing().min();
        let band = NarrowBand::build(&geometry, &seed, config.band * min_spacing, config.tube * min_spacing);

        let mut evolution = Evolution {
            config,
            geometry,
            image,
            fields,
            attachment,
            expansion,
            u: [seed.clone(), seed],
            current: 0,
            band,
            buffers: StepBuffers::default(),
            monitor: ConvergenceMonitor::new(config.converged_thresh),
            pool,
            step: 0,
            status: IterationStatus::Running,
            moved_since_rebuild: false,
            touched: false,
            captured: config.capture_terms.then(|| TermFields::new(geometry.len())),
            reports: Vec::new(),
            failure: None,
        };
        let report = evolution.distance_map()?;

        info!(
            "evolution initialised: grid {:?}, {} front voxels, band of {} voxels, {} threads",
            geometry.dims(),
            report.front_voxels,
            evolution.band.len(),
            evolution.pool.threads()
        );
        Ok(evolution)
    }
}

/// A running evolution
pub struct Evolution<'a> {
    config: &'a LevelSetConfig,
    geometry: GridGeometry,
    image: Volume<f32>,
    fields: Fields<'a>,
    attachment: Option<DataAttachment<'a>>,
    expansion: Option<ExpansionMap>,
    /// Ping-pong buffers; `u[current]` is the latest iterate
    u: [Vec<f32>; 2],
    current: usize,
    band: NarrowBand,
    buffers: StepBuffers,
    monitor: ConvergenceMonitor,
    pool: EvolutionPool,
    step: usize,
    status: IterationStatus,
    moved_since_rebuild: bool,
    touched: bool,
    captured: Option<TermFields>,
    reports: Vec<IterationReport>,
    failure: Option<Error>,
}

impl<'a> Evolution<'a> {
    pub fn config(&self) -> &LevelSetConfig {
        self.config
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn status(&self) -> IterationStatus {
        self.status
    }

    pub fn band(&self) -> &NarrowBand {
        &self.band
    }

    /// Latest iterate of the implicit function
    pub fn field(&self) -> &[f32] {
        &self.u[self.current]
    }

    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    pub fn data_attachment(&self) -> Option<&DataAttachment<'a>> {
        self.attachment.as_ref()
    }

    pub fn expansion_map(&self) -> Option<&ExpansionMap> {
        self.expansion.as_ref()
    }

    /// Per-voxel force terms, when term capture is enabled
    pub fn captured_terms(&self) -> Option<&TermFields> {
        self.captured.as_ref()
    }

    /// Rebuild the distance map from the current zero level set, then the band
    pub fn distance_map(&mut self) -> Result<DistanceReport> {
        let skeleton = self.fields.skeleton.as_deref().map(Volume::as_slice);
        let current = self.current;
        let report = distance_map(
            self.config.distance_method,
            &self.geometry,
            &mut self.u[current],
            skeleton,
            self.config.shape_min_dist,
        )?;

        let [a, b] = &mut self.u;
        if current == 0 {
            b.copy_from_slice(a.as_slice());
        } else {
            a.copy_from_slice(b.as_slice());
        }

        let u = &self.u[current];
        self.band.rebuild(u);
        self.monitor.reset(&self.band, u);
        if let Some(captured) = self.captured.as_mut() {
            captured.distance_map.copy_from_slice(u);
        }
        self.moved_since_rebuild = false;
        self.touched = false;
        debug!(
            "distance map {:?}: {} front voxels, band {} voxels",
            report.method,
            report.front_voxels,
            self.band.len()
        );
        Ok(report)
    }

    /// Advance one time step
    ///
    /// Calling again after a terminal status returns that status unchanged;
    /// after a divergence the same error is returned.
    pub fn iterate(&mut self) -> Result<IterationStatus> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        let due = self.step % self.config.reinit_freq == 0 || self.touched;
        let reinitialized = self.step > 0 && due && self.moved_since_rebuild;
        if reinitialized {
            self.distance_map()?;
        }

        if self.band.is_empty() {
            warn!("band is empty at step {}, the structure vanished or fills the grid", self.step);
            self.status = IterationStatus::EmptyBand;
            return Ok(self.status);
        }

        let outcome = {
            let forces = ForceField::new(self.config, &self.geometry, self.image.as_slice())
                .with_attachment(self.attachment.as_ref())
                .with_velocity(self.fields.velocity.as_deref())
                .with_balloon_image(self.fields.balloon_image.as_deref().map(Volume::as_slice))
                .with_expansion(self.expansion.as_ref())
                .with_curvature_weights(self.fields.curvature_weights.as_deref().map(Volume::as_slice));
            evolve_band(
                &self.pool,
                &forces,
                &self.band,
                &self.u[self.current],
                self.config.step_dt,
                &mut self.buffers,
            )
        };

        if outcome.non_finite > 0 && self.config.detect_divergence {
            let failure = Error::NumericalDivergence {
                step: self.step + 1,
                count: outcome.non_finite,
            };
            warn!("{}", failure);
            self.failure = Some(failure.clone());
            return Err(failure);
        }

        let next = 1 - self.current;
        scatter(&self.band, &self.buffers, &mut self.u[next]);
        self.current = next;
        self.step += 1;
        if outcome.sign_changes > 0 {
            self.moved_since_rebuild = true;
        }
        self.touched |= outcome.touched;
        if let Some(captured) = self.captured.as_mut() {
            captured.record(&self.band, &self.buffers.terms);
        }

        let mut convergence = None;
        if self.step % self.config.check_freq == 0 {
            let (metric, converged) = self.check_convergence();
            convergence = Some(metric);
            if converged {
                self.status = IterationStatus::Converged;
            }
        }
        if self.status == IterationStatus::Running && self.step >= self.config.num_iters {
            self.status = IterationStatus::IterationLimit;
        }

        let mean_terms = outcome.sums.scaled(1.0 / self.band.len() as f32);
        let report = IterationReport {
            step: self.step,
            band_size: self.band.len(),
            mean_terms,
            sign_changes: outcome.sign_changes,
            reinitialized,
            convergence,
        };
        debug!(
            "step {}: band {}, curvature {:.5}, advection {:.5}, balloon {:.5}, velocity {:.5}, {} sign changes",
            report.step,
            report.band_size,
            mean_terms.curvature,
            mean_terms.advection,
            mean_terms.balloon,
            mean_terms.velocity,
            report.sign_changes
        );
        self.reports.push(report);
        Ok(self.status)
    }

    /// Compare the band with the last snapshot and refresh it
    ///
    /// Returns the metric and whether it is under the threshold.
    pub fn check_convergence(&mut self) -> (f32, bool) {
        let check = self.monitor.check(&self.band, &self.u[self.current]);
        debug!(
            "convergence at step {}: {:.6}, max drift {:.6} (threshold {})",
            self.step,
            check.metric,
            check.max_drift,
            self.monitor.threshold()
        );
        (check.metric, check.converged)
    }

    /// Stop the evolution at the caller's request
    pub fn abort(&mut self) {
        if !self.status.is_terminal() {
            self.status = IterationStatus::Aborted;
        }
    }

    /// Snapshot of the current field
    pub fn update_result(&self) -> Result<Volume<f32>> {
        Volume::new(self.geometry, self.u[self.current].clone())
    }

    /// Finish the run and hand back the field
    pub fn end_evolution(self) -> Result<EvolutionResult> {
        let Evolution {
            geometry,
            mut u,
            current,
            step,
            status,
            reports,
            ..
        } = self;
        info!("evolution finished after {} steps: {:?}", step, status);
        let field = Volume::new(geometry, std::mem::take(&mut u[current]))?;
        Ok(EvolutionResult {
            field,
            steps: step,
            status,
            reports,
        })
    }
}

impl std::fmt::Debug for Evolution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evolution")
            .field("dims", &self.geometry.dims())
            .field("step", &self.step)
            .field("status", &self.status)
            .field("band", &self.band.len())
            .field("pool", &self.pool)
            .finish()
    }
}
