//! Scans, poses and the registration loop
//!
//! A [`RegistrationSession`] exclusively owns every loaded scan together with
//! its pose. Scans are addressed through [`ScanHandle`]s; the reference scan
//! of a registration step is always passed explicitly.

use crate::correspondence::{find_correspondences, CorrespondenceOptions, CorrespondenceSet};
use crate::nearest_neighbor::ClosestPointIndex;
use crate::registration::{solve_increment, IncrementalSolution, RegistrationMode, SolverOptions};
use crate::sampling::{estimate_point_spacing, subsample, SubsampleRadius};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scanalign_core::{
    Error, NormalPoint3f, Point3f, PointCloud, Result, RigidTransform, Transformable, TriangleMesh,
    Vector3f,
};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a scan inside a [`RegistrationSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanHandle(usize);

impl ScanHandle {
    /// Position of the scan in load order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A point set with index-aligned normals and its current pose
#[derive(Debug, Clone)]
pub struct Scan {
    points: Vec<Point3f>,
    normals: Vec<Vector3f>,
    pose: RigidTransform,
    spacing: f32,
}

impl Scan {
    /// Create a scan at identity pose.
    ///
    /// Normals are used as given (unit length is the caller's responsibility).
    /// The sample spacing is the mean nearest neighbor distance.
    pub fn new(points: Vec<Point3f>, normals: Vec<Vector3f>) -> Result<Self> {
        if points.len() != normals.len() {
            return Err(Error::InvalidData(format!(
                "{} points but {} normals",
                points.len(),
                normals.len()
            )));
        }

        let spacing = estimate_point_spacing(&points)?;
        Ok(Self {
            points,
            normals,
            pose: RigidTransform::identity(),
            spacing,
        })
    }

    /// Create a scan from a mesh.
    ///
    /// Vertices are centered on their centroid, normals are taken from the
    /// mesh or computed (area weighted), and the spacing is the average edge
    /// length. Fails with [`Error::InvalidData`] for out of range face
    /// indices or a stored normal count that differs from the vertex count.
    pub fn from_mesh(mesh: &TriangleMesh) -> Result<Self> {
        if mesh.vertices.is_empty() {
            return Err(Error::EmptyPointSet);
        }
        mesh.validate()?;

        let normals = mesh.vertex_normals();
        let mut centered = mesh.clone();
        centered.center();

        let spacing = match centered.average_edge_length() {
            Some(length) => length,
            None => estimate_point_spacing(&centered.vertices)?,
        };

        Ok(Self {
            points: centered.vertices,
            normals,
            pose: RigidTransform::identity(),
            spacing,
        })
    }

    /// Points in scan coordinates (pose not applied)
    pub fn points(&self) -> &[Point3f] {
        &self.points
    }

    pub fn normals(&self) -> &[Vector3f] {
        &self.normals
    }

    pub fn pose(&self) -> RigidTransform {
        self.pose
    }

    /// Average sample spacing used by the subsampling radius policy
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with the current pose applied
    pub fn posed_points(&self) -> Vec<Point3f> {
        self.pose.transform_points(&self.points)
    }

    /// Normals rotated by the current pose
    pub fn posed_normals(&self) -> Vec<Vector3f> {
        self.normals
            .iter()
            .map(|n| self.pose.transform_vector(n))
            .collect()
    }

    /// Points and normals in the current pose
    pub fn export(&self) -> PointCloud<NormalPoint3f> {
        let mut cloud = PointCloud::from_positions_and_normals(&self.points, &self.normals);
        cloud.transform(&self.pose);
        cloud
    }
}

/// Settings of a [`RegistrationSession`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub subsample_radius: SubsampleRadius,
    pub correspondence: CorrespondenceOptions,
    pub solver: SolverOptions,
    /// Seed of the subsampling order. `None` draws a fresh seed from the OS.
    pub seed: Option<u64>,
}

/// When [`RegistrationSession::register`] stops iterating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCriteria {
    pub max_iterations: usize,
    /// Rotation angle of the increment, radians
    pub rotation_tolerance: f32,
    /// Translation norm of the increment, scan units
    pub translation_tolerance: f32,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            rotation_tolerance: 1e-5,
            translation_tolerance: 1e-5,
        }
    }
}

/// Everything computed by the latest successful registration step
#[derive(Debug, Clone)]
pub struct StepReport {
    pub scan: ScanHandle,
    pub reference: ScanHandle,
    /// Indices into the untransformed points of the moving scan
    pub sampled_indices: Vec<usize>,
    pub subsample_radius: f32,
    pub correspondences: CorrespondenceSet,
    pub increment: IncrementalSolution,
    /// Mean correspondence distance before the step was applied
    pub residual_before: f32,
    /// Pose of the moving scan after the step
    pub pose: RigidTransform,
}

/// Outcome of [`RegistrationSession::register`]
#[derive(Debug, Clone)]
pub struct RegistrationSummary {
    pub pose: RigidTransform,
    /// Number of steps that were applied
    pub iterations: usize,
    pub converged: bool,
    /// Mean correspondence distance measured by the last applied step
    pub residual: f32,
}

/// Owns scans and their poses and runs registration steps between them
#[derive(Debug)]
pub struct RegistrationSession {
    scans: Vec<Scan>,
    config: RegistrationConfig,
    rng: StdRng,
    last_step: Option<StepReport>,
}

impl RegistrationSession {
    /// Create a session. The subsampling order is seeded from `config.seed`.
    pub fn new(config: RegistrationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    /// Create a session with an explicit random source for subsampling
    pub fn with_rng(config: RegistrationConfig, rng: StdRng) -> Self {
        Self {
            scans: Vec::new(),
            config,
            rng,
            last_step: None,
        }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Load a scan from index-aligned points and normals
    pub fn load_scan(&mut self, points: Vec<Point3f>, normals: Vec<Vector3f>) -> Result<ScanHandle> {
        let scan = Scan::new(points, normals)?;
        Ok(self.push(scan))
    }

    /// Load a scan from a triangle mesh (see [`Scan::from_mesh`])
    pub fn load_mesh(&mut self, mesh: &TriangleMesh) -> Result<ScanHandle> {
        let scan = Scan::from_mesh(mesh)?;
        log::debug!("mesh with {} vertices and {} faces", mesh.vertex_count(), mesh.face_count());
        Ok(self.push(scan))
    }

    fn push(&mut self, scan: Scan) -> ScanHandle {
        log::debug!("loaded scan {} with {} points, spacing {:.5}", self.scans.len(), scan.len(), scan.spacing);
        self.scans.push(scan);
        ScanHandle(self.scans.len() - 1)
    }

    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }

    pub fn scan(&self, handle: ScanHandle) -> Result<&Scan> {
        self.scans.get(handle.0).ok_or(Error::UnknownScan(handle.0))
    }

    fn scan_mut(&mut self, handle: ScanHandle) -> Result<&mut Scan> {
        self.scans.get_mut(handle.0).ok_or(Error::UnknownScan(handle.0))
    }

    /// Current pose of a scan
    pub fn pose(&self, handle: ScanHandle) -> Result<RigidTransform> {
        Ok(self.scan(handle)?.pose)
    }

    /// Replace the pose of a scan
    pub fn set_pose(&mut self, handle: ScanHandle, pose: RigidTransform) -> Result<()> {
        self.scan_mut(handle)?.pose = pose;
        Ok(())
    }

    /// Apply a manual motion on top of the current pose (`pose = motion ∘ pose`)
    pub fn apply_transform(&mut self, handle: ScanHandle, motion: &RigidTransform) -> Result<RigidTransform> {
        let scan = self.scan_mut(handle)?;
        scan.pose = motion.compose(&scan.pose);
        Ok(scan.pose)
    }

    /// Points and normals of a scan in its current pose
    pub fn export_points(&self, handle: ScanHandle) -> Result<PointCloud<NormalPoint3f>> {
        Ok(self.scan(handle)?.export())
    }

    /// Report of the latest successful registration step
    pub fn last_step(&self) -> Option<&StepReport> {
        self.last_step.as_ref()
    }

    /// Run one ICP step of `scan` against `reference` and return the new pose.
    ///
    /// Subsamples the moving scan, matches the samples (in the current pose)
    /// to the reference scan (in its own pose), prunes the matches and solves
    /// for an incremental transform with the given objective. The increment is
    /// left-composed onto the pose of `scan`. On error the pose is untouched.
    pub fn perform_registration_step(
        &mut self,
        scan: ScanHandle,
        reference: ScanHandle,
        mode: RegistrationMode,
    ) -> Result<RigidTransform> {
        if scan == reference {
            return Err(Error::InvalidData(format!(
                "scan {} cannot be registered against itself",
                scan.0
            )));
        }

        let moving = self.scans.get(scan.0).ok_or(Error::UnknownScan(scan.0))?;
        let fixed = self.scans.get(reference.0).ok_or(Error::UnknownScan(reference.0))?;

        let radius = self.config.subsample_radius.resolve(moving.spacing);
        let sampled_indices = subsample(&moving.points, radius, &mut self.rng);
        let source: Vec<Point3f> = sampled_indices
            .iter()
            .map(|&i| moving.pose.transform_point(&moving.points[i]))
            .collect();

        let target = fixed.posed_points();
        let target_normals = fixed.posed_normals();
        let index = ClosestPointIndex::build(&target);
        let correspondences = find_correspondences(
            &source,
            &target,
            &target_normals,
            &index,
            &self.config.correspondence,
        )
        .map_err(|e| {
            log::warn!("correspondence search for scan {} against {} failed: {}", scan.0, reference.0, e);
            e
        })?;

        let residual_before = correspondences.mean_distance();
        let increment = match solve_increment(&correspondences, mode, &self.config.solver) {
            Ok(increment) => increment,
            Err(e) => {
                log::warn!("registration step of scan {} against {} rejected: {}", scan.0, reference.0, e);
                return Err(e);
            }
        };

        let pose = increment.transform.compose(&moving.pose);
        log::debug!(
            "{:?} step: {} samples (radius {:.4}), {} correspondences, residual {:.6}",
            mode,
            sampled_indices.len(),
            radius,
            correspondences.len(),
            residual_before
        );

        self.scans[scan.0].pose = pose;
        self.last_step = Some(StepReport {
            scan,
            reference,
            sampled_indices,
            subsample_radius: radius,
            correspondences,
            increment,
            residual_before,
            pose,
        });

        Ok(pose)
    }

    /// Repeat registration steps until the increment becomes negligible.
    ///
    /// Fails only when the first step fails. A later failing step (for
    /// example when every match coincides exactly) ends the loop with the pose
    /// of the last successful step and `converged = false`.
    pub fn register(
        &mut self,
        scan: ScanHandle,
        reference: ScanHandle,
        mode: RegistrationMode,
        criteria: &ConvergenceCriteria,
    ) -> Result<RegistrationSummary> {
        let mut summary = RegistrationSummary {
            pose: self.pose(scan)?,
            iterations: 0,
            converged: false,
            residual: f32::INFINITY,
        };

        while summary.iterations < criteria.max_iterations {
            match self.perform_registration_step(scan, reference, mode) {
                Ok(pose) => summary.pose = pose,
                Err(e) if summary.iterations == 0 => return Err(e),
                Err(e) => {
                    log::warn!("stopping after {} iterations: {}", summary.iterations, e);
                    break;
                }
            }
            summary.iterations += 1;

            let Some(step) = &self.last_step else {
                break;
            };
            summary.residual = step.residual_before;

            let increment = &step.increment.transform;
            if increment.rotation_angle() < criteria.rotation_tolerance
                && increment.translation.norm() < criteria.translation_tolerance
            {
                summary.converged = true;
                log::info!(
                    "scan {} converged after {} iterations (residual {:.6})",
                    scan.0,
                    summary.iterations,
                    summary.residual
                );
                break;
            }
        }

        Ok(summary)
    }
}

impl Default for RegistrationSession {
    fn default() -> Self {
        Self::new(RegistrationConfig::default())
    }
}
