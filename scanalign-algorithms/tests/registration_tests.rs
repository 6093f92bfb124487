//! End-to-end registration scenarios through [`RegistrationSession`]

use scanalign_algorithms::{
    BruteForceSearch, ConvergenceCriteria, CorrespondenceOptions, DegeneracyPolicy,
    RegistrationConfig, RegistrationMode, RegistrationSession, SubsampleRadius,
};
use scanalign_core::{Error, NearestNeighborSearch, Point3f, RigidTransform, TriangleMesh, Vector3f};

fn helix() -> Vec<Point3f> {
    (0..24)
        .map(|i| {
            let t = i as f32;
            let r = 1.0 + 0.3 * (1.7 * t).sin();
            Point3f::new(r * (2.4 * t).cos(), r * (2.4 * t).sin(), 0.5 * t - 6.0)
        })
        .collect()
}

fn grid(n: usize, z: f32) -> Vec<Point3f> {
    let half = (n as f32 - 1.0) * 0.5;
    (0..n * n)
        .map(|i| Point3f::new((i % n) as f32 - half, (i / n) as f32 - half, z))
        .collect()
}

/// Mean distance from every point to its nearest reference point
fn mean_residual(points: &[Point3f], reference: &[Point3f]) -> f32 {
    let search = BruteForceSearch::new(reference);
    let total: f32 = points
        .iter()
        .map(|p| (reference[search.nearest(p).unwrap()] - p).norm())
        .sum();
    total / points.len() as f32
}

/// Keeps every sample and ignores normals, which carry no surface meaning on a helix
fn helix_config() -> RegistrationConfig {
    RegistrationConfig {
        subsample_radius: SubsampleRadius::Fixed(0.5),
        correspondence: CorrespondenceOptions {
            normal_cosine_threshold: -2.0,
            ..Default::default()
        },
        seed: Some(5),
        ..Default::default()
    }
}

fn generating_transform() -> RigidTransform {
    RigidTransform::from_axis_angle_translation(30.0, &Vector3f::z(), Vector3f::new(0.1, 0.0, 0.0))
}

#[test]
fn test_point_to_point_step_reduces_residual() {
    let _ = env_logger::builder().is_test(true).try_init();

    let reference = helix();
    let moved = generating_transform().transform_points(&reference);
    let normals = vec![Vector3f::z(); reference.len()];

    let mut session = RegistrationSession::new(helix_config());
    let target = session.load_scan(reference.clone(), normals.clone()).unwrap();
    let scan = session.load_scan(moved.clone(), normals).unwrap();

    let before = mean_residual(&moved, &reference);
    let pose = session
        .perform_registration_step(scan, target, RegistrationMode::PointToPoint)
        .unwrap();
    let after = mean_residual(&pose.transform_points(&moved), &reference);

    assert!(after <= 0.5 * before, "residual {} -> {}", before, after);

    let step = session.last_step().unwrap();
    assert_eq!(step.sampled_indices.len(), moved.len());
    assert_eq!(step.correspondences.len(), moved.len());
    assert!(!step.increment.degenerate);
    assert!((step.residual_before - before).abs() < 1e-4);
}

#[test]
fn test_point_to_point_recovers_generating_transform() {
    let reference = helix();
    let generator = generating_transform();
    let moved = generator.transform_points(&reference);
    let normals = vec![Vector3f::z(); reference.len()];

    let mut session = RegistrationSession::new(helix_config());
    let target = session.load_scan(reference.clone(), normals.clone()).unwrap();
    let scan = session.load_scan(moved.clone(), normals).unwrap();

    for _ in 0..6 {
        let pose = session
            .perform_registration_step(scan, target, RegistrationMode::PointToPoint)
            .unwrap();
        if mean_residual(&pose.transform_points(&moved), &reference) < 1e-3 {
            break;
        }
    }

    let pose = session.pose(scan).unwrap();
    assert!(
        pose.approx_eq(&generator.inverse(), 1e-3),
        "pose {:?} differs from {:?}",
        pose,
        generator.inverse()
    );
}

#[test]
fn test_register_loop() {
    let reference = helix();
    let generator = generating_transform();
    let moved = generator.transform_points(&reference);
    let normals = vec![Vector3f::z(); reference.len()];

    let mut session = RegistrationSession::new(helix_config());
    let target = session.load_scan(reference, normals.clone()).unwrap();
    let scan = session.load_scan(moved, normals).unwrap();

    let criteria = ConvergenceCriteria {
        max_iterations: 10,
        ..Default::default()
    };
    let summary = session
        .register(scan, target, RegistrationMode::PointToPoint, &criteria)
        .unwrap();

    assert!(summary.iterations >= 2);
    assert!(summary.iterations <= 10);
    assert!(summary.pose.approx_eq(&generator.inverse(), 1e-3));
    assert!(summary.pose.approx_eq(&session.pose(scan).unwrap(), 0.0));
}

#[test]
fn test_point_to_plane_lifted_patch() {
    let reference = grid(8, 0.0);
    let lifted = grid(8, 0.2);
    let normals = vec![Vector3f::z(); reference.len()];

    let mut session = RegistrationSession::new(RegistrationConfig {
        subsample_radius: SubsampleRadius::Fixed(0.5),
        seed: Some(9),
        ..Default::default()
    });
    let target = session.load_scan(reference, normals.clone()).unwrap();
    let scan = session.load_scan(lifted, normals).unwrap();

    let pose = session
        .perform_registration_step(scan, target, RegistrationMode::PointToPlane)
        .unwrap();

    assert!((pose.translation - Vector3f::new(0.0, 0.0, -0.2)).norm() < 1e-5);
    assert!(pose.rotation_angle() < 1e-5);

    // a flat patch leaves three motions unconstrained
    let step = session.last_step().unwrap();
    assert!(step.increment.degenerate);
    assert_eq!(step.increment.rank, 3);
    assert_eq!(step.correspondences.len(), 64);
}

#[test]
fn test_degenerate_patch_rejected_by_policy() {
    let reference = grid(8, 0.0);
    let lifted = grid(8, 0.2);
    let normals = vec![Vector3f::z(); reference.len()];

    let mut config = RegistrationConfig {
        subsample_radius: SubsampleRadius::Fixed(0.5),
        seed: Some(9),
        ..Default::default()
    };
    config.solver.degeneracy = DegeneracyPolicy::Reject;

    let mut session = RegistrationSession::new(config);
    let target = session.load_scan(reference, normals.clone()).unwrap();
    let scan = session.load_scan(lifted, normals).unwrap();

    let result = session.perform_registration_step(scan, target, RegistrationMode::PointToPlane);
    assert!(matches!(result, Err(Error::DegenerateGeometry { rank: 3, .. })));
    assert!(session.pose(scan).unwrap().is_identity(0.0));
}

#[test]
fn test_no_correspondences_leaves_pose_unchanged() {
    let reference = grid(8, 0.0);
    let below = grid(8, -50.0);
    let normals = vec![Vector3f::z(); reference.len()];

    let mut session = RegistrationSession::new(RegistrationConfig {
        subsample_radius: SubsampleRadius::Fixed(0.5),
        seed: Some(1),
        ..Default::default()
    });
    let target = session.load_scan(reference, normals.clone()).unwrap();
    let scan = session.load_scan(below, normals).unwrap();

    let shift = RigidTransform::from_translation(Vector3f::new(0.0, 0.0, 1.0));
    session.set_pose(scan, shift).unwrap();

    let result = session.perform_registration_step(scan, target, RegistrationMode::PointToPoint);
    assert!(matches!(
        result,
        Err(Error::InsufficientCorrespondences { found: 0, required: 6 })
    ));
    assert!(session.pose(scan).unwrap().approx_eq(&shift, 0.0));
    assert!(session.last_step().is_none());

    // the first failing step is reported by the loop as well
    let result = session.register(scan, target, RegistrationMode::PointToPoint, &Default::default());
    assert!(result.is_err());
}

#[test]
fn test_reference_pose_is_respected() {
    let reference = helix();
    let normals = vec![Vector3f::z(); reference.len()];

    let mut session = RegistrationSession::new(helix_config());
    let target = session.load_scan(reference.clone(), normals.clone()).unwrap();
    let scan = session.load_scan(reference.clone(), normals).unwrap();

    // move the reference; the scan has to follow it
    let placement = RigidTransform::from_axis_angle_translation(10.0, &Vector3f::x(), Vector3f::new(0.05, 0.1, 0.0));
    session.set_pose(target, placement).unwrap();

    for _ in 0..6 {
        let pose = session
            .perform_registration_step(scan, target, RegistrationMode::PointToPoint)
            .unwrap();
        let posed = pose.transform_points(&reference);
        if mean_residual(&posed, &placement.transform_points(&reference)) < 1e-3 {
            break;
        }
    }

    assert!(session.pose(scan).unwrap().approx_eq(&placement, 1e-3));
    assert!(session.pose(target).unwrap().approx_eq(&placement, 0.0));
}

#[test]
fn test_exported_points_follow_registration() {
    let reference = grid(8, 0.0);
    let lifted = grid(8, 0.2);
    let normals = vec![Vector3f::z(); reference.len()];

    let mut session = RegistrationSession::new(RegistrationConfig {
        subsample_radius: SubsampleRadius::Fixed(0.5),
        seed: Some(2),
        ..Default::default()
    });
    let target = session.load_scan(reference.clone(), normals.clone()).unwrap();
    let scan = session.load_scan(lifted, normals).unwrap();
    session
        .perform_registration_step(scan, target, RegistrationMode::PointToPlane)
        .unwrap();

    let exported = session.export_points(scan).unwrap();
    assert_eq!(exported.len(), reference.len());
    for (point, expected) in exported.iter().zip(reference.iter()) {
        assert!((point.position - expected).norm() < 1e-5);
        assert!((point.normal - Vector3f::z()).norm() < 1e-5);
    }
}

#[test]
fn test_load_mesh_centers_and_measures() {
    // 5x5 vertex grid, spacing 2, offset far from the origin
    let n = 5;
    let vertices: Vec<Point3f> = (0..n * n)
        .map(|i| Point3f::new(100.0 + 2.0 * (i % n) as f32, -40.0 + 2.0 * (i / n) as f32, 7.0))
        .collect();
    let mut faces = Vec::new();
    for y in 0..n - 1 {
        for x in 0..n - 1 {
            let i = y * n + x;
            faces.push([i, i + 1, i + n + 1]);
            faces.push([i, i + n + 1, i + n]);
        }
    }
    let mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    let mut session = RegistrationSession::default();
    let handle = session.load_mesh(&mesh).unwrap();
    let scan = session.scan(handle).unwrap();

    assert_eq!(scan.len(), 25);
    assert!((scan.points()[12] - Point3f::origin()).norm() < 1e-4);
    // 40 axis edges of length 2 and 16 diagonals of length 2√2
    let expected = (40.0 * 2.0 + 16.0 * 8f32.sqrt()) / 56.0;
    assert!((scan.spacing() - expected).abs() < 1e-5);
    assert!(scan.normals().iter().all(|n| (n - Vector3f::z()).norm() < 1e-5));

    assert!(matches!(
        session.load_mesh(&TriangleMesh::new()),
        Err(Error::EmptyPointSet)
    ));
}
