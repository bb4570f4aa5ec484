//! Core data structures for levelcrate
//!
//! This crate provides the voxel grid geometry, scalar volumes and vector
//! fields, the level-set configuration bundle, and the shared error type.

pub mod config;
pub mod error;
pub mod grid;
pub mod phantom;
pub mod traits;
pub mod volume;

pub use config::*;
pub use error::*;
pub use grid::*;
pub use traits::*;
pub use volume::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
