use pointalign_3d::linalg::euclidean_distance;

/// Find the matched fixed-set point for every slot of the moving set.
///
/// Conceptually builds the full pairwise distance matrix with the moving
/// points as rows and the fixed points as columns, then takes the argmin
/// along the moving axis for every fixed column and reads that row index
/// back into the *fixed* array. The matching is not injective: several
/// slots may receive the same fixed point. Ties resolve to the lowest
/// moving index.
///
/// Brute force on purpose: O(n^2) distance evaluations, no spatial index.
///
/// # Arguments
///
/// * `moving` - The downsampled moving points (matrix rows).
/// * `fixed` - The downsampled fixed points (matrix columns), same length.
///
/// # Returns
///
/// One matched fixed point per input slot, `fixed.len()` entries.
pub fn find_nearest_targets(moving: &[[f64; 3]], fixed: &[[f64; 3]]) -> Vec<[f64; 3]> {
    fixed
        .iter()
        .map(|fixed_point| {
            let mut best_idx = 0;
            let mut best_dist = f64::INFINITY;
            for (idx, moving_point) in moving.iter().enumerate() {
                let dist = euclidean_distance(moving_point, fixed_point);
                if dist < best_dist {
                    best_dist = dist;
                    best_idx = idx;
                }
            }
            fixed[best_idx]
        })
        .collect()
}
