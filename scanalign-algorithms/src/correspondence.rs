//! Closest point correspondences with outlier rejection

use crate::nearest_neighbor::ClosestPointIndex;
use scanalign_core::{Error, Point3f, Result, Vector3f};
use serde::{Deserialize, Serialize};

/// Thresholds used to prune candidate correspondences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceOptions {
    /// Candidates farther than `distance_factor * median distance` are rejected
    pub distance_factor: f32,
    /// Minimum cosine between the target-to-source direction and the target normal
    pub normal_cosine_threshold: f32,
}

impl Default for CorrespondenceOptions {
    fn default() -> Self {
        Self {
            distance_factor: 3.0,
            // cos(60°)
            normal_cosine_threshold: 0.5,
        }
    }
}

/// Accepted correspondences as three index-aligned lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceSet {
    /// Source points, already in the current pose
    pub source: Vec<Point3f>,
    pub target: Vec<Point3f>,
    pub target_normals: Vec<Vector3f>,
    /// Number of candidate pairs considered before pruning
    pub candidates: usize,
}

impl CorrespondenceSet {
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    fn push(&mut self, source: Point3f, target: Point3f, normal: Vector3f) {
        self.source.push(source);
        self.target.push(target);
        self.target_normals.push(normal);
    }

    /// Iterate over `(source, target, target normal)` triples
    pub fn iter(&self) -> impl Iterator<Item = (&Point3f, &Point3f, &Vector3f)> + '_ {
        self.source
            .iter()
            .zip(self.target.iter())
            .zip(self.target_normals.iter())
            .map(|((p, q), n)| (p, q, n))
    }

    /// Mean source-to-target distance, `0.0` when empty
    pub fn mean_distance(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let total: f32 = self.iter().map(|(p, q, _)| (p - q).norm()).sum();
        total / self.len() as f32
    }
}

/// Median of a non-empty slice; even counts average the two middle values
fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Match every source point to its closest target point and prune the pairs.
///
/// `source` must already be transformed into the current pose and `index`
/// must be built over `target`. A candidate is rejected when its distance
/// exceeds `distance_factor` times the median candidate distance, when the
/// two points coincide, or when the unit direction from target to source
/// deviates too far from the target normal. An empty source yields an empty
/// set; `target` and `target_normals` of different lengths are
/// [`Error::InvalidData`].
pub fn find_correspondences(
    source: &[Point3f],
    target: &[Point3f],
    target_normals: &[Vector3f],
    index: &ClosestPointIndex,
    options: &CorrespondenceOptions,
) -> Result<CorrespondenceSet> {
    if target.len() != target_normals.len() {
        return Err(Error::InvalidData(format!(
            "{} target points but {} target normals",
            target.len(),
            target_normals.len()
        )));
    }

    let mut candidates = Vec::with_capacity(source.len());
    for p in source {
        let best = index.closest_point(p)?;
        let q = target[best];
        candidates.push((*p, q, target_normals[best], (p - q).norm()));
    }

    let mut set = CorrespondenceSet {
        candidates: candidates.len(),
        ..Default::default()
    };
    if candidates.is_empty() {
        return Ok(set);
    }

    let distances: Vec<f32> = candidates.iter().map(|c| c.3).collect();
    let distance_threshold = options.distance_factor * median(&distances);

    for (p, q, n, d) in candidates {
        if d > distance_threshold {
            continue;
        }

        let offset = p - q;
        let length = offset.norm();
        if length == 0.0 {
            continue;
        }

        if (offset / length).dot(&n) < options.normal_cosine_threshold {
            continue;
        }

        set.push(p, q, n);
    }

    log::debug!(
        "correspondences: {} of {} candidates accepted (distance threshold {:.5})",
        set.len(),
        set.candidates,
        distance_threshold
    );

    Ok(set)
}
