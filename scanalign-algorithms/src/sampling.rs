//! Uniform radius subsampling of point sets

use crate::nearest_neighbor::ClosestPointIndex;
use rand::seq::SliceRandom;
use rand::Rng;
use scanalign_core::{NearestNeighborSearch, Point3f, Result};
use serde::{Deserialize, Serialize};

/// Default multiple of the sample spacing used as subsampling radius
pub const DEFAULT_SPACING_FACTOR: f32 = 8.0;

/// How the subsampling radius of a registration step is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SubsampleRadius {
    /// `spacing * factor`, where spacing is the scan's average edge length
    /// (meshes) or mean nearest neighbor distance (bare points)
    SpacingFactor(f32),
    /// A fixed radius in scan units
    Fixed(f32),
}

impl SubsampleRadius {
    /// Concrete radius for a scan with the given sample spacing
    pub fn resolve(&self, spacing: f32) -> f32 {
        match *self {
            SubsampleRadius::SpacingFactor(factor) => spacing * factor,
            SubsampleRadius::Fixed(radius) => radius,
        }
    }
}

impl Default for SubsampleRadius {
    fn default() -> Self {
        SubsampleRadius::SpacingFactor(DEFAULT_SPACING_FACTOR)
    }
}

/// Greedy radius subsampling in a random visiting order.
///
/// Points are visited in an order shuffled with `rng`. A point is kept when
/// it is at least `radius` away from every point kept so far; the first
/// visited point is always kept. Returns indices into `points` in the order
/// they were accepted. Seed `rng` for reproducible results.
pub fn subsample<R: Rng + ?Sized>(points: &[Point3f], radius: f32, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.shuffle(rng);
    subsample_with_order(points, radius, order)
}

/// Greedy radius subsampling visiting the points in input order
pub fn subsample_in_order(points: &[Point3f], radius: f32) -> Vec<usize> {
    subsample_with_order(points, radius, 0..points.len())
}

fn subsample_with_order(
    points: &[Point3f],
    radius: f32,
    order: impl IntoIterator<Item = usize>,
) -> Vec<usize> {
    let mut sampled: Vec<usize> = Vec::new();

    for idx in order {
        let p = points[idx];
        let keep = sampled
            .iter()
            .all(|&s| (p - points[s]).norm() >= radius);
        if keep {
            sampled.push(idx);
        }
    }

    sampled
}

/// Mean distance from each point to its nearest other point.
///
/// Used as the sample spacing of scans loaded without connectivity.
/// Returns `0.0` for fewer than two points.
pub fn estimate_point_spacing(points: &[Point3f]) -> Result<f32> {
    if points.len() < 2 {
        return Ok(0.0);
    }

    let index = ClosestPointIndex::build(points);
    let mut total = 0.0f32;
    for p in points {
        // the closest hit is the point itself (or a duplicate at distance 0)
        let neighbors = index.find_k_nearest(p, 2)?;
        total += neighbors.last().map_or(0.0, |&(_, d)| d);
    }

    Ok(total / points.len() as f32)
}
