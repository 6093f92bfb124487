//! Core data structures and traits for scanalign
//!
//! This crate provides the fundamental types for rigid scan registration:
//! points, point clouds, triangle meshes, rigid transforms and the shared
//! error type.

pub mod point;
pub mod point_cloud;
pub mod mesh;
pub mod traits;
pub mod transform;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use mesh::*;
pub use traits::*;
pub use transform::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4, Isometry3};
