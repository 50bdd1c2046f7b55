//! Lesion measurement on CT/MRI volumes.
//!
//! A nodule is marked by a center fiducial and three orthogonal rulers
//! (width, height, depth) in physical RAS space. The rulers are stepped
//! through slices of the reference volume, turned into an ellipsoid model and
//! a voxel labelmap on the volume's grid, and logged to a CSV report.

pub mod axis;
pub mod common;
pub mod ellipsoid;
pub mod engine;
pub mod error;
pub mod labelmap;
pub mod nodule;
pub mod report;
pub mod scene;
pub mod session;
pub mod volume;

pub use error::{LesionError, Result};
