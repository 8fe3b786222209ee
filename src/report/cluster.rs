//! Average-linkage hierarchical clustering for heatmap ordering.

use nalgebra::DMatrix;
use rayon::prelude::*;

/// Pairwise Euclidean distances between the rows of `data`.
///
/// NaN cells count as zero.
pub fn euclidean_distances(data: &DMatrix<f64>) -> Vec<Vec<f64>> {
    let n = data.nrows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    data.row(i)
                        .iter()
                        .zip(data.row(j).iter())
                        .map(|(a, b)| {
                            let d = zero_nan(*a) - zero_nan(*b);
                            d * d
                        })
                        .sum::<f64>()
                        .sqrt()
                })
                .collect()
        })
        .collect()
}

#[inline]
fn zero_nan(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

struct Cluster {
    id: usize,
    leaves: Vec<usize>,
}

/// Leaf order of an average-linkage (UPGMA) dendrogram over the rows of `data`.
///
/// At each step the closest pair of clusters merges; the cluster created
/// earlier (leaves before merges, lower index first) becomes the left child.
/// Ties go to the first pair in row-major scan order.
pub fn average_linkage_order(data: &DMatrix<f64>) -> Vec<usize> {
    let n = data.nrows();
    if n < 2 {
        return (0..n).collect();
    }

    let mut dist = euclidean_distances(data);
    let mut clusters: Vec<Option<Cluster>> = (0..n)
        .map(|i| {
            Some(Cluster {
                id: i,
                leaves: vec![i],
            })
        })
        .collect();
    let mut next_id = n;

    for _ in 1..n {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if clusters[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if clusters[j].is_none() {
                    continue;
                }
                if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                    best = Some((i, j, dist[i][j]));
                }
            }
        }

        let Some((i, j, _)) = best else { break };
        let (Some(a), Some(b)) = (clusters[i].take(), clusters[j].take()) else {
            break;
        };

        let (size_a, size_b) = (a.leaves.len() as f64, b.leaves.len() as f64);
        for k in 0..n {
            if k == i || k == j || clusters[k].is_none() {
                continue;
            }
            let d = (size_a * dist[i][k] + size_b * dist[j][k]) / (size_a + size_b);
            dist[i][k] = d;
            dist[k][i] = d;
        }

        let (left, right) = if a.id < b.id { (a, b) } else { (b, a) };
        let mut leaves = left.leaves;
        leaves.extend(right.leaves);
        clusters[i] = Some(Cluster { id: next_id, leaves });
        next_id += 1;
    }

    clusters
        .into_iter()
        .flatten()
        .next()
        .map(|c| c.leaves)
        .unwrap_or_default()
}
