//! Per-voxel speed of the implicit function
//!
//! `u_t = curvature + advection + balloon + velocity`, each term using the
//! differencing its motion needs: central differences for curvature, the
//! Osher-Sethian norm for motion along the normal and one-sided differences
//! taken against the flow for advection by a vector field. Terms whose
//! coefficient is zero are never evaluated and contribute exactly zero.

use crate::attachment::DataAttachment;
use crate::probability::ExpansionMap;
use crate::stencil::Stencil;
use levelcrate_core::{
    AdvectionScheme, BalloonScheme, CurvatureMode, GridGeometry, LevelSetConfig, SpacingTerms, VectorField,
};
use nalgebra::Vector3;
use std::ops::{Add, AddAssign};

const COS_EPS: f32 = 1e-12;

/// Contribution of each force to `u_t` at one voxel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceTerms {
    pub curvature: f32,
    pub advection: f32,
    pub balloon: f32,
    pub velocity: f32,
}

impl ForceTerms {
    pub fn total(&self) -> f32 {
        self.curvature + self.advection + self.balloon + self.velocity
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            curvature: self.curvature * factor,
            advection: self.advection * factor,
            balloon: self.balloon * factor,
            velocity: self.velocity * factor,
        }
    }
}

impl Add for ForceTerms {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            curvature: self.curvature + other.curvature,
            advection: self.advection + other.advection,
            balloon: self.balloon + other.balloon,
            velocity: self.velocity + other.velocity,
        }
    }
}

impl AddAssign for ForceTerms {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Everything the speed function reads, borrowed for one iteration
#[derive(Debug, Clone, Copy)]
pub struct ForceField<'s> {
    config: &'s LevelSetConfig,
    geometry: &'s GridGeometry,
    terms: SpacingTerms,
    image: &'s [f32],
    attachment: Option<&'s DataAttachment<'s>>,
    velocity: Option<&'s VectorField>,
    balloon_image: Option<&'s [f32]>,
    expansion: Option<&'s ExpansionMap>,
    curvature_weights: Option<&'s [f32]>,
}

impl<'s> ForceField<'s> {
    pub fn new(config: &'s LevelSetConfig, geometry: &'s GridGeometry, image: &'s [f32]) -> Self {
        Self {
            config,
            geometry,
            terms: geometry.spacing_terms(),
            image,
            attachment: None,
            velocity: None,
            balloon_image: None,
            expansion: None,
            curvature_weights: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Option<&'s DataAttachment<'s>>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn with_velocity(mut self, velocity: Option<&'s VectorField>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_balloon_image(mut self, balloon_image: Option<&'s [f32]>) -> Self {
        self.balloon_image = balloon_image;
        self
    }

    pub fn with_expansion(mut self, expansion: Option<&'s ExpansionMap>) -> Self {
        self.expansion = expansion.filter(|map| !map.is_empty());
        self
    }

    pub fn with_curvature_weights(mut self, weights: Option<&'s [f32]>) -> Self {
        self.curvature_weights = weights;
        self
    }

    /// Force terms at `index` for the field `u`
    pub fn evaluate(&self, u: &[f32], index: usize) -> ForceTerms {
        let config = self.config;
        let s = Stencil::gather(self.geometry, &self.terms, u, index);
        let mut terms = ForceTerms::default();

        if config.curvature_coeff != 0.0 {
            let kappa = match config.curvature_mode {
                CurvatureMode::Minimal if !self.geometry.is_planar() => s.minimal_curvature_term(),
                CurvatureMode::Minimal | CurvatureMode::Mean => s.mean_curvature_term(),
            };
            let weight = self.curvature_weights.map_or(1.0, |w| w[index]);
            terms.curvature = config.curvature_coeff * weight * kappa;
        }

        if config.advection_coeff != 0.0 {
            if let Some(attachment) = self.attachment {
                terms.advection = self.advection(&s, attachment, index);
            }
        }

        if config.balloon_coeff != 0.0 {
            let speed = config.balloon_coeff * self.balloon_weight(index);
            terms.balloon = -speed * s.upwind_norm(speed);
        }

        if config.velocity_coeff != 0.0 {
            if let Some(velocity) = self.velocity {
                let v = velocity.at(index) * config.velocity_coeff;
                terms.velocity = -s.upwind_dot(&v);
            }
        }

        terms
    }

    fn advection(&self, s: &Stencil, attachment: &DataAttachment<'_>, index: usize) -> f32 {
        let config = self.config;
        match (config.advection_scheme, attachment) {
            (AdvectionScheme::UpwindVectors | AdvectionScheme::CentralVectors, DataAttachment::Vectors(field)) => {
                let mut v = field.at(index) * config.advection_coeff;
                if config.use_cos_term {
                    v *= abs_cos(&v, &s.central);
                }
                if config.advection_scheme == AdvectionScheme::UpwindVectors {
                    -s.upwind_dot(&v)
                } else {
                    -s.central_dot(&v)
                }
            }
            (AdvectionScheme::Morpho, DataAttachment::Morpho(field)) => {
                let speed = -config.structure.sign()
                    * field.secdergrad[index]
                    * field.normgrad[index]
                    * config.advection_coeff;
                -speed * s.upwind_norm(speed)
            }
            // the session never pairs a scheme with the other kind of data
            _ => 0.0,
        }
    }

    /// Balloon weight before the coefficient is applied
    pub fn balloon_weight(&self, index: usize) -> f32 {
        let config = self.config;
        let weight = if let Some(balloon) = self.balloon_image {
            balloon[index]
        } else if let Some(map) = self.expansion {
            map.expansion(self.image[index])
        } else if config.low_threshold.is_some() || config.high_threshold.is_some() {
            let v = self.image[index];
            let below = config.low_threshold.is_some_and(|low| v < low);
            let above = config.high_threshold.is_some_and(|high| v > high);
            if below || above {
                -1.0
            } else {
                1.0
            }
        } else {
            1.0
        };

        match config.balloon_scheme {
            BalloonScheme::BrockettMaragos => weight,
            BalloonScheme::Vessels => weight.max(0.0),
        }
    }
}

fn abs_cos(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let denom = a.norm_squared() * b.norm_squared();
    if denom < COS_EPS {
        0.0
    } else {
        a.dot(b).abs() / denom.sqrt()
    }
}
