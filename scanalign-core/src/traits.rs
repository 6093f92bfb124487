//! Core traits for scanalign

use crate::{point::Point3f, transform::RigidTransform, Result};

/// Trait for nearest neighbor search over a fixed point set
pub trait NearestNeighborSearch {
    /// Index of the point closest to `query` (Euclidean distance)
    fn nearest(&self, query: &Point3f) -> Result<usize>;

    /// The `k` closest points as `(index, distance)`, nearest first
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Result<Vec<(usize, f32)>>;
}

/// Trait for objects that can be rigidly moved
pub trait Transformable {
    /// Apply a transformation to the object in place
    fn transform(&mut self, transform: &RigidTransform);
}
