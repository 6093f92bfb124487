//! # ScanAlign Algorithms
//!
//! Iterative closest point registration of 3D scans.
//!
//! This crate provides closest point search, radius subsampling,
//! correspondence pruning, the linearized point-to-point and point-to-plane
//! solvers, and a [`RegistrationSession`] that owns scans and their poses.

pub mod nearest_neighbor;
pub mod sampling;
pub mod correspondence;
pub mod registration;
pub mod session;

// Re-export commonly used items
pub use nearest_neighbor::*;
pub use sampling::*;
pub use correspondence::*;
pub use registration::*;
pub use session::*;
