//! # levelcrate evolution
//!
//! Narrow-band level-set evolution of an implicit surface over a 2D or 3D
//! image.
//!
//! The implicit function is negative inside the structure. Each iteration
//! moves it with a weighted sum of four speeds:
//! - curvature (mean or minimal principal curvature), optionally weighted per voxel
//! - advection along image-derived vectors or by a morphological force
//! - a balloon force driven by a constant, an image, Gaussian tissue classes or thresholds
//! - an external velocity field
//!
//! Only voxels near the zero level set are updated. The band is rebuilt from
//! a fresh distance map periodically and whenever the front leaves its inner
//! tube. See [`session`] for the lifecycle and [`pipeline`] for the driver.

pub mod attachment;
pub mod band;
pub mod convergence;
pub mod evolver;
pub mod forces;
pub mod parallel;
pub mod pipeline;
pub mod probability;
pub mod seeding;
pub mod session;
pub mod stencil;

pub use attachment::{precompute_data_attachment, DataAttachment, MorphoField};
pub use band::NarrowBand;
pub use convergence::{ConvergenceCheck, ConvergenceMonitor};
pub use forces::{ForceField, ForceTerms};
pub use parallel::{split_band, EvolutionPool, ThreadPoolConfig};
pub use pipeline::{evolve, finished_naturally, segment};
pub use probability::ExpansionMap;
pub use seeding::{init_points_statistics, initial_field, SeedStatistics};
pub use session::{
    Evolution, EvolutionInputs, EvolutionResult, IterationReport, IterationStatus, LevelSet, TermFields,
};
pub use stencil::Stencil;
