//! # levelcrate
//!
//! Narrow-band level-set segmentation of 2D and 3D images.
//!
//! This is the umbrella crate. It re-exports the grid, volume and
//! configuration types and, behind feature flags, the distance-map builders
//! and the evolution engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use levelcrate::prelude::*;
//!
//! let grid = GridGeometry::isotropic([32, 32, 32]).unwrap();
//! let image = Volume::filled(grid, 100.0f32);
//! let config = LevelSetConfig::new()
//!     .with_seed(Seed::new(16.0, 16.0, 16.0, 3.0))
//!     .with_balloon(BalloonScheme::BrockettMaragos, 1.0)
//!     .with_iterations(20);
//!
//! let result = segment(&config, EvolutionInputs::new(&image)).unwrap();
//! println!("{} voxels inside after {} steps", result.inside_count(), result.steps);
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: distance and evolution
//! - `distance`: distance-map builders and the medial axis helper
//! - `evolution`: the evolution engine (implies `distance`)

pub use levelcrate_core::*;

#[cfg(feature = "distance")]
pub use levelcrate_distance as distance;

#[cfg(feature = "evolution")]
pub use levelcrate_evolution as evolution;

/// Convenient imports for common use cases
pub mod prelude {
    pub use levelcrate_core::phantom;
    pub use levelcrate_core::*;

    #[cfg(feature = "distance")]
    pub use levelcrate_distance::{distance_map, medial_axis};

    #[cfg(feature = "evolution")]
    pub use levelcrate_evolution::{
        evolve, segment, Evolution, EvolutionInputs, EvolutionResult, IterationReport, IterationStatus, LevelSet,
    };
}
