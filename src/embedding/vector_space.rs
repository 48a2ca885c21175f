//! Exact vector-space queries over an embedding matrix
//!
//! Both queries are brute force over the full set. Quiz corpora are a few
//! thousand messages at most, so exact answers are affordable and keep the
//! output reproducible.

use super::Embeddings;
use ndarray::{Array1, ArrayView1, Axis};

/// Indices of rows farther than `threshold` (L2, strict) from the mean row
///
/// Distance from the centroid is a tunable proxy for "distinctive"
/// messages. It is a selection policy, not a measure of how fun a quote is.
pub fn find_outliers(vectors: &Embeddings, threshold: f32) -> Vec<usize> {
    let Some(mean) = vectors.mean_axis(Axis(0)) else {
        return Vec::new();
    };

    distances_from(vectors, &mean)
        .into_iter()
        .enumerate()
        .filter(|(_, distance)| *distance > threshold)
        .map(|(index, _)| index)
        .collect()
}

/// L2 distance of every row to `point`
pub fn distances_from(vectors: &Embeddings, point: &Array1<f32>) -> Vec<f32> {
    vectors
        .rows()
        .into_iter()
        .map(|row| squared_l2(row, point.view()).sqrt())
        .collect()
}

/// The `k` nearest rows of every row, nearest first
///
/// Each list starts with the row itself; remaining ties are broken by the
/// lower index. `k` is capped at the number of rows.
pub fn find_neighbors(vectors: &Embeddings, k: usize) -> Vec<Vec<usize>> {
    let rows = vectors.nrows();
    let k = k.min(rows);

    (0..rows)
        .map(|i| {
            let query = vectors.row(i);
            let mut ranked: Vec<(f32, bool, usize)> = vectors
                .rows()
                .into_iter()
                .enumerate()
                .map(|(j, row)| (squared_l2(query, row), j != i, j))
                .collect();

            // Self leads even when distances are NaN or duplicated
            ranked.sort_by(|a, b| {
                a.1.cmp(&b.1)
                    .then(a.0.total_cmp(&b.0))
                    .then(a.2.cmp(&b.2))
            });

            ranked.into_iter().take(k).map(|(_, _, j)| j).collect()
        })
        .collect()
}

fn squared_l2(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
