//! Nearest neighbor search implementations

use rstar::RTree;
use scanalign_core::{Error, NearestNeighborSearch, Point3f, Result};

/// A point with its index for spatial data structures
#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedPoint {
    position: Point3f,
    index: usize,
}

impl IndexedPoint {
    fn query(position: &Point3f) -> Self {
        Self {
            position: *position,
            index: usize::MAX,
        }
    }
}

impl rstar::Point for IndexedPoint {
    type Scalar = f32;
    const DIMENSIONS: usize = 3;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        Self {
            position: Point3f::new(generator(0), generator(1), generator(2)),
            index: usize::MAX,
        }
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        self.position[index]
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        &mut self.position[index]
    }
}

/// Closest point queries over a fixed target point set.
///
/// Built once over the target points (an R*-tree, bulk loaded) and then
/// queried read-only any number of times. Changing the target points requires
/// calling [`ClosestPointIndex::init`] again.
#[derive(Debug, Default)]
pub struct ClosestPointIndex {
    tree: Option<RTree<IndexedPoint>>,
}

impl ClosestPointIndex {
    /// Create an index that has not been initialized yet
    pub fn new() -> Self {
        Self { tree: None }
    }

    /// Create and initialize an index over `points`
    pub fn build(points: &[Point3f]) -> Self {
        let mut index = Self::new();
        index.init(points);
        index
    }

    /// (Re)build the index over `points`
    pub fn init(&mut self, points: &[Point3f]) {
        let indexed = points
            .iter()
            .enumerate()
            .map(|(index, position)| IndexedPoint { position: *position, index })
            .collect();
        self.tree = Some(RTree::bulk_load(indexed));
    }

    pub fn is_initialized(&self) -> bool {
        self.tree.is_some()
    }

    /// Number of indexed points (zero when not initialized)
    pub fn len(&self) -> usize {
        self.tree.as_ref().map_or(0, |tree| tree.size())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the target point nearest to `query`
    pub fn closest_point(&self, query: &Point3f) -> Result<usize> {
        self.tree()?
            .nearest_neighbor(&IndexedPoint::query(query))
            .map(|p| p.index)
            .ok_or(Error::EmptyIndex)
    }

    fn tree(&self) -> Result<&RTree<IndexedPoint>> {
        match &self.tree {
            None => Err(Error::NotInitialized),
            Some(tree) if tree.size() == 0 => Err(Error::EmptyIndex),
            Some(tree) => Ok(tree),
        }
    }
}

impl NearestNeighborSearch for ClosestPointIndex {
    fn nearest(&self, query: &Point3f) -> Result<usize> {
        self.closest_point(query)
    }

    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Result<Vec<(usize, f32)>> {
        Ok(self
            .tree()?
            .nearest_neighbor_iter_with_distance_2(&IndexedPoint::query(query))
            .take(k)
            .map(|(p, distance_2)| (p.index, distance_2.sqrt()))
            .collect())
    }
}

/// Simple brute force nearest neighbor search for small datasets
pub struct BruteForceSearch {
    points: Vec<Point3f>,
}

impl BruteForceSearch {
    pub fn new(points: &[Point3f]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    fn distances(&self, query: &Point3f) -> impl Iterator<Item = (usize, f32)> + '_ {
        let query = *query;
        self.points
            .iter()
            .enumerate()
            .map(move |(idx, point)| (idx, (point - query).norm()))
    }
}

impl NearestNeighborSearch for BruteForceSearch {
    fn nearest(&self, query: &Point3f) -> Result<usize> {
        // first minimizer wins ties
        self.distances(query)
            .fold(None, |best: Option<(usize, f32)>, candidate| match best {
                Some(b) if b.1 <= candidate.1 => Some(b),
                _ => Some(candidate),
            })
            .map(|(idx, _)| idx)
            .ok_or(Error::EmptyIndex)
    }

    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Result<Vec<(usize, f32)>> {
        if self.points.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let mut distances: Vec<(usize, f32)> = self.distances(query).collect();

        // Sort by distance and take k nearest
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances.truncate(k);
        Ok(distances)
    }
}
