/// Error types for the point cloud container.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PointCloudError {
    /// The downsampling stride must be at least 1.
    #[error("downsampling stride must be at least 1")]
    ZeroStride,
}

/// An ordered set of 3D points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    points: Vec<[f64; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from a vector of points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Take every `stride`-th point, starting with the first.
    ///
    /// The result has `ceil(len / stride)` points and preserves the order of
    /// the retained points. A stride of 1 copies the cloud unchanged.
    pub fn downsample(&self, stride: usize) -> Result<Self, PointCloudError> {
        if stride == 0 {
            return Err(PointCloudError::ZeroStride);
        }
        Ok(Self {
            points: self.points.iter().step_by(stride).copied().collect(),
        })
    }
}
