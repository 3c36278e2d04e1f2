use crate::error::KabschError;
use pointalign_3d::linalg::det_mat33;

// relative rank threshold on the second singular value of the covariance
const RANK_EPS: f64 = 1e-12;

/// Compute the centroids of two equally sized point sets.
pub(crate) fn compute_centroids(
    points1: &[[f64; 3]],
    points2: &[[f64; 3]],
) -> ([f64; 3], [f64; 3]) {
    let mut centroid1 = [0.0; 3];
    let mut centroid2 = [0.0; 3];

    for (p1, p2) in points1.iter().zip(points2.iter()) {
        for i in 0..3 {
            centroid1[i] += p1[i];
            centroid2[i] += p2[i];
        }
    }

    let n = points1.len() as f64;
    for i in 0..3 {
        centroid1[i] /= n;
        centroid2[i] /= n;
    }

    (centroid1, centroid2)
}

/// Compute the least-squares rigid transform between two paired point sets.
///
/// Solves the orthogonal Procrustes problem in closed form (Kabsch):
///
/// 1. Center both sets at their centroids.
/// 2. Accumulate the cross-covariance `H = Σ (m_i - m̄)(t_i - t̄)^T`.
/// 3. Decompose `H = U Σ V^T`.
/// 4. Take `R = V U^T`; if `det(R) < 0` the candidate is a reflection, so
///    negate the column of `V` paired with the smallest singular value and
///    recompute.
/// 5. `t = t̄ - R m̄`.
///
/// The returned `(R, t)` maps each moving point onto its paired target with
/// minimal summed squared error, and `R` is always a proper rotation.
///
/// # Errors
///
/// * [`KabschError::LengthMismatch`] when the sets are not paired.
/// * [`KabschError::TooFewPoints`] when fewer than 3 pairs are given.
/// * [`KabschError::DegenerateCovariance`] when the pairs are colinear or
///   coincident and the rotation is not uniquely determined. A small but
///   nonzero covariance, as seen late in an ICP run, is fine.
pub fn fit_rigid_transform(
    moving: &[[f64; 3]],
    target: &[[f64; 3]],
) -> Result<([[f64; 3]; 3], [f64; 3]), KabschError> {
    if moving.len() != target.len() {
        return Err(KabschError::LengthMismatch {
            moving: moving.len(),
            target: target.len(),
        });
    }
    if moving.len() < 3 {
        return Err(KabschError::TooFewPoints(moving.len()));
    }

    let (moving_centroid, target_centroid) = compute_centroids(moving, target);

    // cross-covariance H = Σ[(moving - moving_mean) * (target - target_mean)^T]
    let mut h = faer::Mat::<f64>::zeros(3, 3);
    for (m, t) in moving.iter().zip(target.iter()) {
        for i in 0..3 {
            for j in 0..3 {
                let value = (m[i] - moving_centroid[i]) * (t[j] - target_centroid[j]);
                h.write(i, j, h.read(i, j) + value);
            }
        }
    }

    let svd = h.svd();
    let s = svd.s_diagonal();
    // rank < 2 leaves a free rotation about the point axis
    if s[1] <= s[0].max(1.0) * RANK_EPS {
        return Err(KabschError::DegenerateCovariance);
    }

    let u = svd.u();
    let mut v = svd.v().to_owned();

    let mut rotation = rotation_from_uv(u, v.as_ref());
    if det_mat33(&rotation) < 0.0 {
        // reflection: flip the column of V for the smallest singular value
        // (faer sorts them in non-increasing order, so column 2)
        for i in 0..3 {
            v.write(i, 2, -v.read(i, 2));
        }
        rotation = rotation_from_uv(u, v.as_ref());
    }

    let mut translation = [0.0; 3];
    for (i, row) in rotation.iter().enumerate() {
        translation[i] = target_centroid[i]
            - (row[0] * moving_centroid[0]
                + row[1] * moving_centroid[1]
                + row[2] * moving_centroid[2]);
    }

    Ok((rotation, translation))
}

// R = V * U^T, copied out to a plain array
fn rotation_from_uv(u: faer::MatRef<'_, f64>, v: faer::MatRef<'_, f64>) -> [[f64; 3]; 3] {
    let r = v * u.transpose();
    let mut rotation = [[0.0; 3]; 3];
    for (i, row) in rotation.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = r.read(i, j);
        }
    }
    rotation
}
