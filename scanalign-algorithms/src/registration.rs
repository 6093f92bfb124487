//! Registration algorithms
//!
//! One linearized ICP step: given correspondences, solve for the small
//! rotation `(α, β, γ)` and translation `(tx, ty, tz)` that best move the
//! source points onto the target, either point-to-point or point-to-plane.

use crate::correspondence::CorrespondenceSet;
use nalgebra::{DMatrix, DVector, Vector6};
use scanalign_core::{Error, Result, RigidTransform, Vector3f};
use serde::{Deserialize, Serialize};

/// Minimum number of correspondences for a solve to be attempted
pub const MIN_CORRESPONDENCES: usize = 6;

/// Objective minimized by a registration step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegistrationMode {
    /// Minimize the squared distance between matched points
    #[default]
    PointToPoint,
    /// Minimize the squared distance along the target normal. Lets the
    /// source slide tangentially over the target surface.
    PointToPlane,
}

impl RegistrationMode {
    /// `tangential = true` selects point-to-plane
    pub fn from_tangential(tangential: bool) -> Self {
        if tangential {
            RegistrationMode::PointToPlane
        } else {
            RegistrationMode::PointToPoint
        }
    }
}

/// What to do when the linear system is rank deficient or badly conditioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DegeneracyPolicy {
    /// Log a warning and return the minimum-norm solution, flagged as degenerate
    #[default]
    Warn,
    /// Fail with [`Error::DegenerateGeometry`]
    Reject,
}

/// Solver settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Systems with a larger condition number count as degenerate
    pub max_condition_number: f64,
    pub degeneracy: DegeneracyPolicy,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_condition_number: 1e6,
            degeneracy: DegeneracyPolicy::Warn,
        }
    }
}

/// Minimum-norm least-squares solution with diagnostics
#[derive(Debug, Clone)]
pub struct LeastSquaresSolution {
    pub x: DVector<f64>,
    /// Number of singular values above the rank tolerance
    pub rank: usize,
    /// `σ_max / σ_min`, infinite for rank deficient systems
    pub condition_number: f64,
}

/// Result of one registration solve
#[derive(Debug, Clone)]
pub struct IncrementalSolution {
    /// Transform to left-compose onto the current pose
    pub transform: RigidTransform,
    /// `(α, β, γ, tx, ty, tz)`
    pub parameters: Vector6<f64>,
    pub mode: RegistrationMode,
    /// Number of correspondences used
    pub correspondences: usize,
    pub rank: usize,
    pub condition_number: f64,
    /// Whether the system was flagged as degenerate (only with [`DegeneracyPolicy::Warn`])
    pub degenerate: bool,
}

/// Build the `3N x 6` point-to-point system.
///
/// For each pair `(p, q)` the rows linearize `p + [α, β, γ] × p + t = q`.
pub fn point_to_point_system(correspondences: &CorrespondenceSet) -> (DMatrix<f64>, DVector<f64>) {
    let n = correspondences.len();
    let mut a = Vec::with_capacity(n * 18);
    let mut b = Vec::with_capacity(n * 3);

    for (p, q, _) in correspondences.iter() {
        let (px, py, pz) = (p.x as f64, p.y as f64, p.z as f64);
        let (qx, qy, qz) = (q.x as f64, q.y as f64, q.z as f64);

        #[rustfmt::skip]
        let rows = [
            0.0,  pz,  -py, 1.0, 0.0, 0.0,
            -pz,  0.0, px,  0.0, 1.0, 0.0,
            py,   -px, 0.0, 0.0, 0.0, 1.0,
        ];
        a.extend_from_slice(&rows);
        b.extend_from_slice(&[qx - px, qy - py, qz - pz]);
    }

    (DMatrix::from_row_slice(n * 3, 6, &a), DVector::from_vec(b))
}

/// Build the `N x 6` point-to-plane system.
///
/// For each triple `(p, q, n)` the row is `[p × n, n] · x = n · (q − p)`.
pub fn point_to_plane_system(correspondences: &CorrespondenceSet) -> (DMatrix<f64>, DVector<f64>) {
    let count = correspondences.len();
    let mut a = Vec::with_capacity(count * 6);
    let mut b = Vec::with_capacity(count);

    for (p, q, n) in correspondences.iter() {
        let p = p.coords.cast::<f64>();
        let q = q.coords.cast::<f64>();
        let n = n.cast::<f64>();

        a.extend_from_slice(&[
            n.z * p.y - n.y * p.z,
            n.x * p.z - n.z * p.x,
            n.y * p.x - n.x * p.y,
            n.x,
            n.y,
            n.z,
        ]);
        b.push(n.dot(&(q - p)));
    }

    (DMatrix::from_row_slice(count, 6, &a), DVector::from_vec(b))
}

/// Minimize `‖A x − b‖²` through an SVD.
///
/// Singular values below `max(m, n) · ε · σ_max` are treated as zero, which
/// yields the minimum-norm solution for rank deficient systems instead of an
/// error.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<LeastSquaresSolution> {
    let (rows, cols) = a.shape();
    if rows != b.len() {
        return Err(Error::InvalidData(format!(
            "system has {} rows but right hand side has {}",
            rows,
            b.len()
        )));
    }

    let svd = a.clone().svd(true, true);
    let singular_values = &svd.singular_values;
    let sigma_max = singular_values.max();
    let sigma_min = singular_values.min();
    let tolerance = rows.max(cols) as f64 * f64::EPSILON * sigma_max;

    let rank = singular_values.iter().filter(|&&s| s > tolerance).count();
    let condition_number = if rank < cols || sigma_min <= 0.0 {
        f64::INFINITY
    } else {
        sigma_max / sigma_min
    };

    let x = svd
        .solve(b, tolerance)
        .map_err(|e| Error::Algorithm(e.to_string()))?;

    Ok(LeastSquaresSolution {
        x,
        rank,
        condition_number,
    })
}

/// Solve one registration step.
///
/// # Arguments
/// * `correspondences` - Pruned correspondences, source points in the current pose
/// * `mode` - Point-to-point or point-to-plane objective
/// * `options` - Degeneracy handling
///
/// # Returns
/// * `Result<IncrementalSolution>` - Incremental transform (built with
///   [`RigidTransform::from_increment`]) plus solver diagnostics. Fails with
///   [`Error::InsufficientCorrespondences`] for fewer than
///   [`MIN_CORRESPONDENCES`] pairs.
pub fn solve_increment(
    correspondences: &CorrespondenceSet,
    mode: RegistrationMode,
    options: &SolverOptions,
) -> Result<IncrementalSolution> {
    let found = correspondences.len();
    if found < MIN_CORRESPONDENCES {
        return Err(Error::InsufficientCorrespondences {
            found,
            required: MIN_CORRESPONDENCES,
        });
    }

    let (a, b) = match mode {
        RegistrationMode::PointToPoint => point_to_point_system(correspondences),
        RegistrationMode::PointToPlane => point_to_plane_system(correspondences),
    };
    let solution = solve_least_squares(&a, &b)?;

    let degenerate = solution.rank < 6 || solution.condition_number > options.max_condition_number;
    if degenerate {
        match options.degeneracy {
            DegeneracyPolicy::Reject => {
                return Err(Error::DegenerateGeometry {
                    rank: solution.rank,
                    condition_number: solution.condition_number,
                })
            }
            DegeneracyPolicy::Warn => log::warn!(
                "{:?} system is degenerate (rank {}, condition number {:e}); the increment may be meaningless",
                mode,
                solution.rank,
                solution.condition_number
            ),
        }
    }

    let x = &solution.x;
    let parameters = Vector6::new(x[0], x[1], x[2], x[3], x[4], x[5]);
    let angles = Vector3f::new(x[0] as f32, x[1] as f32, x[2] as f32);
    let translation = Vector3f::new(x[3] as f32, x[4] as f32, x[5] as f32);

    Ok(IncrementalSolution {
        transform: RigidTransform::from_increment(&angles, translation),
        parameters,
        mode,
        correspondences: found,
        rank: solution.rank,
        condition_number: solution.condition_number,
        degenerate,
    })
}

/// Point-to-point registration step
pub fn register_point_to_point(
    correspondences: &CorrespondenceSet,
    options: &SolverOptions,
) -> Result<IncrementalSolution> {
    solve_increment(correspondences, RegistrationMode::PointToPoint, options)
}

/// Point-to-plane registration step
pub fn register_point_to_plane(
    correspondences: &CorrespondenceSet,
    options: &SolverOptions,
) -> Result<IncrementalSolution> {
    solve_increment(correspondences, RegistrationMode::PointToPlane, options)
}
