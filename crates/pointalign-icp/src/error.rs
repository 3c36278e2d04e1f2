use crate::icp::Snapshot;
use pointalign_3d::pointcloud::PointCloudError;

/// Error types for the rigid alignment estimator.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KabschError {
    /// Fewer than 3 point pairs; a unique 3D rotation is not determined.
    #[error("need at least 3 point pairs for alignment, got {0}")]
    TooFewPoints(usize),

    /// The moving and target sets must be paired index by index.
    #[error("moving and target sets differ in length ({moving} vs {target})")]
    LengthMismatch {
        /// Length of the moving set.
        moving: usize,
        /// Length of the target set.
        target: usize,
    },

    /// The cross-covariance is rank-deficient: the points are colinear or
    /// coincident and the rotation has an ambiguous null space.
    #[error("degenerate correspondences: points are colinear or coincident")]
    DegenerateCovariance,
}

/// Error types for an ICP run.
#[derive(Debug, thiserror::Error)]
pub enum IcpError {
    /// The downsampled moving and fixed clouds must have equal length.
    #[error("downsampled clouds differ in length ({moving} vs {fixed})")]
    InputSizeMismatch {
        /// Length of the downsampled moving cloud.
        moving: usize,
        /// Length of the downsampled fixed cloud.
        fixed: usize,
    },

    /// One of the input clouds is empty.
    #[error("point clouds must not be empty")]
    EmptyPointCloud,

    /// Downsampling the input clouds failed.
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),

    /// The alignment estimator failed; the run terminates with the
    /// checkpoints gathered up to the failing iteration.
    #[error("alignment failed at iteration {iteration}: {source}")]
    AlignmentFailed {
        /// Iteration at which the estimator failed.
        iteration: usize,
        /// The underlying estimator error.
        source: KabschError,
        /// Checkpoints gathered before the failure.
        snapshots: Vec<Snapshot>,
    },
}
