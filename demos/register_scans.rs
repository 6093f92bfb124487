//! Register two scans and export them in their final poses
//!
//! Without `--reference`/`--moving` a synthetic wavy surface and a displaced
//! copy of it are generated. Run with `RUST_LOG=debug` to follow every step.

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use scanalign_algorithms::{
    ConvergenceCriteria, RegistrationConfig, RegistrationMode, RegistrationSession, SubsampleRadius,
};
use scanalign_core::{NormalPointCloud3f, Point3f, RigidTransform, Vector3f};
use scanalign_io::{ScanPointReader, ScanPointWriter};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Objective {
    Point,
    Plane,
}

impl From<Objective> for RegistrationMode {
    fn from(objective: Objective) -> Self {
        RegistrationMode::from_tangential(matches!(objective, Objective::Plane))
    }
}

#[derive(Parser, Debug)]
#[command(about = "Align a moving scan onto a reference scan with ICP")]
struct Args {
    /// Reference scan in `v x y z vn nx ny nz` format
    #[arg(long, requires = "moving")]
    reference: Option<PathBuf>,

    /// Scan to move onto the reference
    #[arg(long, requires = "reference")]
    moving: Option<PathBuf>,

    /// Synthetic surface resolution (points per side)
    #[arg(long, default_value_t = 60)]
    size: usize,

    /// Rotation of the synthetic displacement, degrees about z
    #[arg(long, default_value_t = 4.0)]
    angle: f32,

    /// Translation of the synthetic displacement
    #[arg(long, num_args = 3, allow_negative_numbers = true, default_values_t = [0.15, -0.1, 0.05])]
    shift: Vec<f32>,

    #[arg(short, long, value_enum, default_value_t = Objective::Plane)]
    objective: Objective,

    #[arg(long, default_value_t = 30)]
    max_iterations: usize,

    /// Fixed subsampling radius instead of a multiple of the scan spacing
    #[arg(long)]
    radius: Option<f32>,

    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with a full registration config; overrides `--radius` and `--seed`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write both scans after registration
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Height field `z = 0.4 sin(x) cos(0.7 y)` with analytic normals
fn synthetic_surface(n: usize) -> (Vec<Point3f>, Vec<Vector3f>) {
    let step = 6.0 / n.max(2) as f32;
    let mut points = Vec::with_capacity(n * n);
    let mut normals = Vec::with_capacity(n * n);

    for i in 0..n * n {
        let x = (i % n) as f32 * step - 3.0;
        let y = (i / n) as f32 * step - 3.0;
        points.push(Point3f::new(x, y, 0.4 * x.sin() * (0.7 * y).cos()));
        let dx = 0.4 * x.cos() * (0.7 * y).cos();
        let dy = -0.28 * x.sin() * (0.7 * y).sin();
        normals.push(Vector3f::new(-dx, -dy, 1.0).normalize());
    }

    (points, normals)
}

fn split(cloud: NormalPointCloud3f) -> (Vec<Point3f>, Vec<Vector3f>) {
    cloud.into_iter().map(|p| (p.position, p.normal)).unzip()
}

fn load_config(args: &Args) -> Result<RegistrationConfig> {
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        return serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()));
    }

    let mut config = RegistrationConfig {
        seed: args.seed,
        ..Default::default()
    };
    if let Some(radius) = args.radius {
        config.subsample_radius = SubsampleRadius::Fixed(radius);
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let mut displacement = None;
    let ((reference_points, reference_normals), (moving_points, moving_normals)) =
        match (&args.reference, &args.moving) {
            (Some(reference), Some(moving)) => (
                split(ScanPointReader::read(reference).with_context(|| format!("reading {}", reference.display()))?),
                split(ScanPointReader::read(moving).with_context(|| format!("reading {}", moving.display()))?),
            ),
            _ => {
                ensure!(args.size >= 3, "--size must be at least 3");
                let (points, normals) = synthetic_surface(args.size);
                let offset = RigidTransform::from_axis_angle_translation(
                    args.angle,
                    &Vector3f::z(),
                    Vector3f::new(args.shift[0], args.shift[1], args.shift[2]),
                );
                let moved = offset.transform_points(&points);
                let moved_normals: Vec<Vector3f> = normals.iter().map(|n| offset.transform_vector(n)).collect();
                displacement = Some(offset);
                ((points, normals), (moved, moved_normals))
            }
        };

    let mut session = RegistrationSession::new(config);
    let reference = session.load_scan(reference_points, reference_normals)?;
    let scan = session.load_scan(moving_points, moving_normals)?;
    log::info!(
        "reference: {} points, moving: {} points",
        session.scan(reference)?.len(),
        session.scan(scan)?.len()
    );

    let criteria = ConvergenceCriteria {
        max_iterations: args.max_iterations,
        ..Default::default()
    };
    let summary = session.register(scan, reference, args.objective.into(), &criteria)?;

    println!(
        "{} after {} iterations, mean correspondence distance {:.6}",
        if summary.converged { "converged" } else { "stopped" },
        summary.iterations,
        summary.residual
    );
    println!("pose:{}", summary.pose.to_homogeneous());

    if let Some(offset) = displacement {
        let error = summary.pose.compose(&offset);
        println!(
            "remaining error: {:.5} degrees, {:.6} translation",
            error.rotation_angle().to_degrees(),
            error.translation.norm()
        );
    }

    if let Some(path) = &args.output {
        let clouds = [session.export_points(reference)?, session.export_points(scan)?];
        ScanPointWriter::write(path, clouds.iter())
            .with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }

    Ok(())
}
