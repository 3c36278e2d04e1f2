/// Transform a set of points using a rotation and translation.
///
/// Computes `dst[i] = R * src[i] + t` for every point, preserving order.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated slice to store the transformed points.
///
/// PRECONDITION: dst_points has the same length as src_points.
///
/// Example:
///
/// ```
/// use pointalign_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &rotation, &translation, &mut dst_points);
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) {
    assert_eq!(src_points.len(), dst_points.len());

    let dst_r_src_mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| dst_r_src[i][j]);

    // view the contiguous Nx3 row-major storage as a matrix of points
    let points_in_src = {
        let src_points_slice = unsafe {
            std::slice::from_raw_parts(src_points.as_ptr() as *const f64, src_points.len() * 3)
        };
        faer::mat::from_row_major_slice(src_points_slice, src_points.len(), 3)
    };

    // the same Nx3 row-major memory read column-major is the 3xN transpose,
    // so writing columns here writes the destination points in place
    let mut points_in_dst = {
        let dst_points_slice = unsafe {
            std::slice::from_raw_parts_mut(
                dst_points.as_mut_ptr() as *mut f64,
                dst_points.len() * 3,
            )
        };
        faer::mat::from_column_major_slice_mut(dst_points_slice, 3, dst_points.len())
    };

    faer::linalg::matmul::matmul(
        &mut points_in_dst,
        dst_r_src_mat.as_ref(),
        points_in_src.transpose(),
        None,
        1.0,
        faer::Parallelism::None,
    );

    for mut col in points_in_dst.col_iter_mut() {
        col.write(0, col.read(0) + dst_t_src[0]);
        col.write(1, col.read(1) + dst_t_src[1]);
        col.write(2, col.read(2) + dst_t_src[2]);
    }
}

/// Build a 4x4 homogeneous transform from a rotation matrix and translation vector.
///
/// The top-left 3x3 block is the rotation, the top-right 3x1 block the
/// translation, and the bottom row is `[0, 0, 0, 1]`. The rotation is taken
/// as given; orthonormality is the caller's responsibility.
pub fn hom_from_rt(rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> [[f64; 4]; 4] {
    let mut transform = [[0.0; 4]; 4];
    for i in 0..3 {
        transform[i][..3].copy_from_slice(&rotation[i]);
        transform[i][3] = translation[i];
    }
    transform[3][3] = 1.0;
    transform
}

/// The 4x4 identity transform.
pub fn hom_identity() -> [[f64; 4]; 4] {
    hom_from_rt(
        &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        &[0.0; 3],
    )
}

/// Apply a 4x4 homogeneous transform to a single 3D point.
pub fn apply_hom(transform: &[[f64; 4]; 4], point: &[f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, row) in transform.iter().take(3).enumerate() {
        out[i] = row[0] * point[0] + row[1] * point[1] + row[2] * point[2] + row[3];
    }
    out
}

/// Compose two 4x4 homogeneous transforms as the matrix product `a * b`.
///
/// Applying the result is equivalent to applying `b` first, then `a`.
pub fn compose_hom(a: &[[f64; 4]; 4], b: &[[f64; 4]; 4]) -> [[f64; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            let mut acc = 0.0;
            for (k, b_row) in b.iter().enumerate() {
                acc += a[i][k] * b_row[j];
            }
            out[i][j] = acc;
        }
    }
    out
}

/// Multiply two 3x3 matrices into a pre-allocated output.
pub fn matmul33(lhs: &[[f64; 3]; 3], rhs: &[[f64; 3]; 3], out: &mut [[f64; 3]; 3]) {
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = lhs[i][0] * rhs[0][j] + lhs[i][1] * rhs[1][j] + lhs[i][2] * rhs[2][j];
        }
    }
}

/// Compute the determinant of a 3x3 matrix.
pub fn det_mat33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Compute the Euclidean distance between two points.
///
/// Example:
/// ```
/// use pointalign_3d::linalg::euclidean_distance;
///
/// let a = [1.0, 2.0, 3.0];
/// let b = [4.0, 5.0, 6.0];
/// let dst = euclidean_distance(&a, &b);
/// ```
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}
