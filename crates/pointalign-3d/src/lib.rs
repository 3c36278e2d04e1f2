#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Linear algebra utilities for rigid transforms.
pub mod linalg;

/// Point cloud container.
pub mod pointcloud;

/// 3D rotation constructions.
pub mod transforms;
