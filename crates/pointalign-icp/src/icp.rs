use crate::correspondence::find_nearest_targets;
use crate::error::IcpError;
use crate::kabsch::fit_rigid_transform;
use pointalign_3d::linalg::{
    compose_hom, euclidean_distance, hom_from_rt, hom_identity, transform_points,
};
use pointalign_3d::pointcloud::PointCloud;

/// Parameters of an ICP run.
#[derive(Debug, Clone)]
pub struct IcpConfig {
    /// Number of iterations to run.
    pub max_iterations: usize,
    /// Threshold on the improvement of the mean distance between two
    /// consecutive iterations.
    pub tolerance: f64,
    /// Stride used by [`run_icp_downsampled`] to thin the input clouds
    /// before the expensive matching math.
    pub downsample_factor: usize,
    /// Report to the render sink every this many iterations. Zero disables
    /// per-iteration checkpoints; the pre-loop checkpoint is always taken.
    pub visualize_every: usize,
    /// Stop as soon as the tolerance is reached instead of running the full
    /// iteration budget. Off by default, matching the historical behavior of
    /// recording the convergence iteration but running to `max_iterations`.
    pub stop_on_convergence: bool,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 80,
            tolerance: 1e-5,
            downsample_factor: 50,
            visualize_every: 8,
            stop_on_convergence: false,
        }
    }
}

/// State of the moving cloud at one reporting checkpoint.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Checkpoint label index: 0 before the loop, `i + 1` for iteration `i`.
    pub iteration: usize,
    /// Full-resolution moving points at this checkpoint.
    pub moving_points: Vec<[f64; 3]>,
    /// Cumulative homogeneous transform applied to the moving cloud so far.
    pub transform: [[f64; 4]; 4],
}

/// Result of an ICP run.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// Mean distance at the last executed iteration.
    pub final_mean_distance: f64,
    /// First iteration at which the improvement dropped below the tolerance,
    /// or `None` if the run never converged within the iteration budget.
    /// Callers must treat `None` as a failed registration, not a success.
    pub tolerance_iteration: Option<usize>,
    /// Checkpoints gathered over the run.
    pub snapshots: Vec<Snapshot>,
}

/// External collaborator receiving visualization checkpoints.
///
/// The driver calls this once before the loop and once every
/// [`IcpConfig::visualize_every`] iterations, fire and forget: the
/// mathematical state never depends on what the sink does, and adapters must
/// swallow their own failures rather than surface them here.
pub trait RenderSink {
    /// Report the current state of the run.
    ///
    /// * `moving_full` / `fixed_full` - full-resolution clouds.
    /// * `moving_pose` - cumulative transform applied to the moving cloud.
    /// * `fixed_pose` - pose of the fixed cloud's frame (identity).
    /// * `label` - checkpoint label, e.g. `icp-0`.
    fn render(
        &mut self,
        moving_full: &[[f64; 3]],
        fixed_full: &[[f64; 3]],
        moving_pose: &[[f64; 4]; 4],
        fixed_pose: &[[f64; 4]; 4],
        label: &str,
    );
}

/// Sink that discards every checkpoint, for headless runs and tests.
#[derive(Debug, Default)]
pub struct NoopSink;

impl RenderSink for NoopSink {
    fn render(
        &mut self,
        _moving_full: &[[f64; 3]],
        _fixed_full: &[[f64; 3]],
        _moving_pose: &[[f64; 4]; 4],
        _fixed_pose: &[[f64; 4]; 4],
        _label: &str,
    ) {
    }
}

// Index-aligned mean L2 distance between two equally long point arrays.
// This is the reference convergence proxy: it compares slot k of one array
// with slot k of the other, not matched correspondences, and is only
// meaningful as a stopping heuristic once the clouds are roughly aligned.
fn mean_pointwise_distance(a: &[[f64; 3]], b: &[[f64; 3]]) -> f64 {
    let total: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(p, q)| euclidean_distance(p, q))
        .sum();
    total / a.len() as f64
}

/// Align a moving point cloud onto a fixed one with point-to-point ICP.
///
/// Each iteration matches the downsampled clouds by brute-force nearest
/// neighbor, estimates the incremental rigid transform in closed form, and
/// applies it to both the downsampled and the full-resolution moving points
/// (two applications of the same transform, keeping both resolutions at the
/// identical pose). Convergence is tracked with the index-aligned mean
/// distance between the downsampled arrays; the first iteration whose
/// improvement falls below `config.tolerance` is recorded, and unless
/// `config.stop_on_convergence` is set the loop still runs to
/// `config.max_iterations`.
///
/// # Arguments
///
/// * `moving_down` / `fixed_down` - downsampled clouds used for the math;
///   must be non-empty and of equal length.
/// * `moving_full` / `fixed_full` - full-resolution clouds used only for
///   checkpoint reporting; must be non-empty.
/// * `config` - run parameters.
/// * `sink` - render sink receiving checkpoints.
///
/// # Errors
///
/// * [`IcpError::InputSizeMismatch`] / [`IcpError::EmptyPointCloud`] for
///   precondition violations, checked before the loop.
/// * [`IcpError::AlignmentFailed`] when the estimator hits a degenerate
///   iteration; carries the snapshots gathered so far.
pub fn run_icp(
    moving_down: &[[f64; 3]],
    fixed_down: &[[f64; 3]],
    moving_full: &[[f64; 3]],
    fixed_full: &[[f64; 3]],
    config: &IcpConfig,
    sink: &mut dyn RenderSink,
) -> Result<IcpResult, IcpError> {
    if moving_down.len() != fixed_down.len() {
        return Err(IcpError::InputSizeMismatch {
            moving: moving_down.len(),
            fixed: fixed_down.len(),
        });
    }
    if moving_down.is_empty() || moving_full.is_empty() || fixed_full.is_empty() {
        return Err(IcpError::EmptyPointCloud);
    }

    let mut moving_down = moving_down.to_vec();
    let mut moving_full = moving_full.to_vec();

    let mut cumulative = hom_identity();
    let fixed_pose = hom_identity();

    let mut mean_distance = f64::INFINITY;
    let mut tolerance_iteration = None;
    let mut snapshots = Vec::new();

    log::debug!("using {} points for alignment", moving_down.len());

    // starting configuration, before any alignment
    sink.render(&moving_full, fixed_full, &cumulative, &fixed_pose, "icp-0");
    snapshots.push(Snapshot {
        iteration: 0,
        moving_points: moving_full.clone(),
        transform: cumulative,
    });

    for i in 0..config.max_iterations {
        let current_mean_distance = mean_pointwise_distance(&moving_down, fixed_down);
        let distance_diff = mean_distance - current_mean_distance;

        if distance_diff < config.tolerance && tolerance_iteration.is_none() {
            tolerance_iteration = Some(i);
            if config.stop_on_convergence {
                mean_distance = current_mean_distance;
                log::debug!("converged at iteration {}, stopping early", i);
                break;
            }
        }
        mean_distance = current_mean_distance;

        let targets = find_nearest_targets(&moving_down, fixed_down);

        let (rotation, translation) = match fit_rigid_transform(&moving_down, &targets) {
            Ok(rt) => rt,
            Err(source) => {
                return Err(IcpError::AlignmentFailed {
                    iteration: i,
                    source,
                    snapshots,
                });
            }
        };

        let delta = hom_from_rt(&rotation, &translation);
        cumulative = compose_hom(&delta, &cumulative);

        let mut next_down = vec![[0.0; 3]; moving_down.len()];
        transform_points(&moving_down, &rotation, &translation, &mut next_down);
        moving_down = next_down;

        let mut next_full = vec![[0.0; 3]; moving_full.len()];
        transform_points(&moving_full, &rotation, &translation, &mut next_full);
        moving_full = next_full;

        if config.visualize_every != 0 && i % config.visualize_every == 0 {
            log::debug!(
                "iteration {}: mean distance {}, improvement {:e}",
                i,
                mean_distance,
                distance_diff
            );
            let label = format!("icp-{}", i + 1);
            sink.render(&moving_full, fixed_full, &cumulative, &fixed_pose, &label);
            snapshots.push(Snapshot {
                iteration: i + 1,
                moving_points: moving_full.clone(),
                transform: cumulative,
            });
        }
    }

    match tolerance_iteration {
        Some(iteration) => log::debug!(
            "tolerance of {:e} first reached at iteration {}",
            config.tolerance,
            iteration
        ),
        None => log::debug!(
            "tolerance not reached within {} iterations",
            config.max_iterations
        ),
    }

    Ok(IcpResult {
        final_mean_distance: mean_distance,
        tolerance_iteration,
        snapshots,
    })
}

/// Downsample two clouds by `config.downsample_factor` and run
/// [`run_icp`] on them, keeping the originals as the full-resolution pair.
pub fn run_icp_downsampled(
    moving: &PointCloud,
    fixed: &PointCloud,
    config: &IcpConfig,
    sink: &mut dyn RenderSink,
) -> Result<IcpResult, IcpError> {
    let moving_down = moving.downsample(config.downsample_factor)?;
    let fixed_down = fixed.downsample(config.downsample_factor)?;
    run_icp(
        moving_down.points(),
        fixed_down.points(),
        moving.points(),
        fixed.points(),
        config,
        sink,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KabschError;
    use approx::assert_relative_eq;
    use pointalign_3d::transforms::axis_angle_to_rotation_matrix;

    /// Sink recording the labels it was called with.
    #[derive(Debug, Default)]
    struct RecordingSink {
        labels: Vec<String>,
    }

    impl RenderSink for RecordingSink {
        fn render(
            &mut self,
            _moving_full: &[[f64; 3]],
            _fixed_full: &[[f64; 3]],
            _moving_pose: &[[f64; 4]; 4],
            _fixed_pose: &[[f64; 4]; 4],
            label: &str,
        ) {
            self.labels.push(label.to_string());
        }
    }

    fn unit_cube() -> Vec<[f64; 3]> {
        let mut points = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    points.push([x, y, z]);
                }
            }
        }
        points
    }

    fn random_cloud(num_points: usize) -> Vec<[f64; 3]> {
        (0..num_points)
            .map(|_| {
                [
                    rand::random::<f64>() * 2.0 - 1.0,
                    rand::random::<f64>() * 2.0 - 1.0,
                    rand::random::<f64>() * 2.0 - 1.0,
                ]
            })
            .collect()
    }

    fn apply(points: &[[f64; 3]], rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> Vec<[f64; 3]> {
        let mut out = vec![[0.0; 3]; points.len()];
        transform_points(points, rotation, translation, &mut out);
        out
    }

    #[test]
    fn test_cube_converges_and_recovers_transform() -> Result<(), Box<dyn std::error::Error>> {
        let _ = env_logger::builder().is_test(true).try_init();

        let moving = unit_cube();
        let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 30f64.to_radians())?;
        let translation = [0.3, -0.1, 0.2];
        let fixed = apply(&moving, &rotation, &translation);

        let config = IcpConfig {
            downsample_factor: 1,
            ..Default::default()
        };
        let result = run_icp(&moving, &fixed, &moving, &fixed, &config, &mut NoopSink)?;

        assert!(result.final_mean_distance < 1e-6);
        assert!(result.tolerance_iteration.is_some());

        // the cumulative pose reproduces the transform that built `fixed`
        let expected = hom_from_rt(&rotation, &translation);
        let last = result.snapshots.last().unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert_relative_eq!(last.transform[i][j], expected[i][j], epsilon = 1e-3);
            }
        }
        Ok(())
    }

    #[test]
    fn test_random_cloud_converges() -> Result<(), Box<dyn std::error::Error>> {
        let moving = random_cloud(100);
        let rotation = axis_angle_to_rotation_matrix(&[0.2, -1.0, 0.5], 0.3)?;
        let translation = [0.2, -0.1, 0.15];
        let fixed = apply(&moving, &rotation, &translation);

        let config = IcpConfig {
            downsample_factor: 1,
            ..Default::default()
        };
        let result = run_icp(&moving, &fixed, &moving, &fixed, &config, &mut NoopSink)?;

        assert!(result.final_mean_distance < 1e-6);
        assert!(result.tolerance_iteration.is_some());
        Ok(())
    }

    #[test]
    fn test_identical_clouds_stay_put() -> Result<(), IcpError> {
        let points = unit_cube();
        let config = IcpConfig {
            downsample_factor: 1,
            max_iterations: 5,
            ..Default::default()
        };
        let result = run_icp(&points, &points, &points, &points, &config, &mut NoopSink)?;

        assert_relative_eq!(result.final_mean_distance, 0.0, epsilon = 1e-12);
        // iteration 0 still sees the sentinel improvement; the zero
        // improvement shows up at iteration 1
        assert_eq!(result.tolerance_iteration, Some(1));

        let last = result.snapshots.last().unwrap();
        for (p, q) in last.moving_points.iter().zip(points.iter()) {
            for (a, b) in p.iter().zip(q.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn test_checkpoint_cadence() -> Result<(), IcpError> {
        let points = unit_cube();
        let config = IcpConfig {
            downsample_factor: 1,
            max_iterations: 17,
            visualize_every: 8,
            ..Default::default()
        };
        let mut sink = RecordingSink::default();
        let result = run_icp(&points, &points, &points, &points, &config, &mut sink)?;

        // pre-loop checkpoint plus iterations 0, 8 and 16
        assert_eq!(sink.labels, vec!["icp-0", "icp-1", "icp-9", "icp-17"]);
        assert_eq!(result.snapshots.len(), 4);
        assert_eq!(
            result
                .snapshots
                .iter()
                .map(|s| s.iteration)
                .collect::<Vec<_>>(),
            vec![0, 1, 9, 17]
        );
        Ok(())
    }

    #[test]
    fn test_runs_full_budget_by_default() -> Result<(), Box<dyn std::error::Error>> {
        let moving = unit_cube();
        let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.1)?;
        let fixed = apply(&moving, &rotation, &[0.05, 0.0, 0.0]);

        let config = IcpConfig {
            downsample_factor: 1,
            max_iterations: 40,
            visualize_every: 10,
            ..Default::default()
        };
        let mut sink = RecordingSink::default();
        let result = run_icp(&moving, &fixed, &moving, &fixed, &config, &mut sink)?;

        let tolerance_iteration = result.tolerance_iteration.expect("run should converge");
        assert!(tolerance_iteration < 39);
        // detect-but-keep-running: checkpoints past the convergence point
        assert_eq!(sink.labels.len(), 5);
        Ok(())
    }

    #[test]
    fn test_stop_on_convergence_breaks_early() -> Result<(), Box<dyn std::error::Error>> {
        let moving = unit_cube();
        let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.1)?;
        let fixed = apply(&moving, &rotation, &[0.05, 0.0, 0.0]);

        let config = IcpConfig {
            downsample_factor: 1,
            max_iterations: 80,
            visualize_every: 1,
            stop_on_convergence: true,
            ..Default::default()
        };
        let result = run_icp(&moving, &fixed, &moving, &fixed, &config, &mut NoopSink)?;

        let tolerance_iteration = result.tolerance_iteration.expect("run should converge");
        // one pre-loop snapshot plus one per completed iteration
        assert_eq!(result.snapshots.len(), tolerance_iteration + 1);
        Ok(())
    }

    #[test]
    fn test_size_mismatch_is_fatal() {
        let moving = unit_cube();
        let fixed = moving[..4].to_vec();
        let result = run_icp(
            &moving,
            &fixed,
            &moving,
            &moving,
            &IcpConfig::default(),
            &mut NoopSink,
        );
        assert!(matches!(
            result,
            Err(IcpError::InputSizeMismatch {
                moving: 8,
                fixed: 4
            })
        ));
    }

    #[test]
    fn test_empty_cloud_is_fatal() {
        let result = run_icp(
            &[],
            &[],
            &[],
            &[],
            &IcpConfig::default(),
            &mut NoopSink,
        );
        assert!(matches!(result, Err(IcpError::EmptyPointCloud)));
    }

    #[test]
    fn test_degenerate_run_returns_partial_snapshots() {
        // colinear clouds make the very first fit degenerate
        let moving = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        let fixed = vec![[0.1, 0.0, 0.0], [1.1, 1.0, 1.0], [2.1, 2.0, 2.0]];

        let config = IcpConfig {
            downsample_factor: 1,
            ..Default::default()
        };
        let result = run_icp(&moving, &fixed, &moving, &fixed, &config, &mut NoopSink);

        match result {
            Err(IcpError::AlignmentFailed {
                iteration,
                source,
                snapshots,
            }) => {
                assert_eq!(iteration, 0);
                assert_eq!(source, KabschError::DegenerateCovariance);
                // the pre-loop checkpoint was gathered before the failure
                assert_eq!(snapshots.len(), 1);
                assert_eq!(snapshots[0].iteration, 0);
            }
            other => panic!("expected AlignmentFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_two_point_run_fails_alignment() {
        let moving = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let fixed = vec![[0.5, 0.0, 0.0], [1.5, 0.0, 0.0]];
        let config = IcpConfig {
            downsample_factor: 1,
            ..Default::default()
        };
        let result = run_icp(&moving, &fixed, &moving, &fixed, &config, &mut NoopSink);
        assert!(matches!(
            result,
            Err(IcpError::AlignmentFailed {
                source: KabschError::TooFewPoints(2),
                ..
            })
        ));
    }

    #[test]
    fn test_downsampled_run_matches_stride() -> Result<(), Box<dyn std::error::Error>> {
        // 200 points so a stride of 4 leaves 50 for the matching math
        let moving_full = random_cloud(200);
        let rotation = axis_angle_to_rotation_matrix(&[0.0, 1.0, 0.0], 0.2)?;
        let translation = [0.1, 0.0, -0.1];
        let fixed_full = apply(&moving_full, &rotation, &translation);

        let moving = PointCloud::new(moving_full);
        let fixed = PointCloud::new(fixed_full);

        let config = IcpConfig {
            downsample_factor: 4,
            ..Default::default()
        };
        let result = run_icp_downsampled(&moving, &fixed, &config, &mut NoopSink)?;

        assert!(result.final_mean_distance < 1e-6);
        assert!(result.tolerance_iteration.is_some());

        // snapshots carry the full-resolution cloud, not the strided one
        assert_eq!(result.snapshots[0].moving_points.len(), moving.len());
        Ok(())
    }
}
