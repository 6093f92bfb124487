//! # ScanAlign
//!
//! Rigid registration of 3D scans with iterative closest point.
//!
//! This is the umbrella crate that provides convenient access to all ScanAlign
//! functionality. Use the individual crates for more granular control over
//! dependencies.
//!
//! ## Quick Start
//!
//! ```rust
//! use scanalign::prelude::*;
//!
//! # fn main() -> scanalign::Result<()> {
//! let points: Vec<Point3f> = (0..100)
//!     .map(|i| Point3f::new((i % 10) as f32, (i / 10) as f32, 0.0))
//!     .collect();
//! let normals = vec![Vector3f::z(); points.len()];
//! let lifted: Vec<Point3f> = points.iter().map(|p| p + Vector3f::new(0.0, 0.0, 0.1)).collect();
//!
//! let mut session = RegistrationSession::new(RegistrationConfig {
//!     subsample_radius: SubsampleRadius::Fixed(0.5),
//!     seed: Some(1),
//!     ..Default::default()
//! });
//! let reference = session.load_scan(points, normals.clone())?;
//! let scan = session.load_scan(lifted, normals)?;
//!
//! let pose = session.perform_registration_step(scan, reference, RegistrationMode::PointToPlane)?;
//! assert!((pose.translation.z + 0.1).abs() < 1e-4);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables algorithms and io
//! - `algorithms`: Subsampling, correspondences, solvers and the registration session
//! - `io`: Scan point export
//! - `all`: Enables all features

// Re-export core functionality
pub use scanalign_core::*;

// Re-export sub-crates
#[cfg(feature = "algorithms")]
pub use scanalign_algorithms as algorithms;

#[cfg(feature = "io")]
pub use scanalign_io as io;

/// Convenient imports for common use cases
pub mod prelude {
    pub use scanalign_core::*;

    #[cfg(feature = "algorithms")]
    pub use scanalign_algorithms::*;

    #[cfg(feature = "io")]
    pub use scanalign_io::*;
}
