use crate::linalg::matmul33;

/// Compute the rotation matrix from an axis and angle.
///
/// Uses the Rodrigues formula `R = I + sin(a) K + (1 - cos(a)) K^2` where `K`
/// is the skew-symmetric matrix of the normalized axis.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. Normalized internally; must be non-zero.
/// * `angle` - The angle of rotation in radians.
///
/// Example:
///
/// ```
/// use pointalign_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [0.0, 0.0, 1.0];
/// let angle = std::f64::consts::PI;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], &'static str> {
    let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
    if magnitude < 1e-10 {
        return Err("cannot compute rotation matrix from a zero vector");
    }
    let (x, y, z) = (
        axis[0] / magnitude,
        axis[1] / magnitude,
        axis[2] / magnitude,
    );

    let k = [[0.0, -z, y], [z, 0.0, -x], [-y, x, 0.0]];
    let mut k2 = [[0.0; 3]; 3];
    matmul33(&k, &k, &mut k2);

    let s = angle.sin();
    let c1 = 1.0 - angle.cos();

    let mut rotation = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            let identity = if i == j { 1.0 } else { 0.0 };
            rotation[i][j] = identity + s * k[i][j] + c1 * k2[i][j];
        }
    }
    Ok(rotation)
}
