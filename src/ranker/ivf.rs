/// Inverted-file index over unit vectors.
///
/// Spherical k-means partitions the corpus into `nlist` cells. A query scans
/// only the chunks in its `nprobe` closest cells. Centroid seeding picks
/// evenly spaced chunks, so the same corpus always yields the same index.
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::IndexConfig;
use crate::embedder::l2_normalize;
use crate::pool::parallel_map;

use super::dot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfIndex {
    centroids: Vec<Vec<f32>>,
    /// Chunk positions per cell, ascending.
    lists: Vec<Vec<u32>>,
    nprobe: usize,
}

/// Index of the centroid with the highest dot product; lowest index wins ties.
fn nearest(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let s = dot(c, v);
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}

impl IvfIndex {
    /// Build an index over `vectors` (all of length `dimensions`).
    pub fn build(vectors: &[&[f32]], dimensions: usize, config: &IndexConfig, workers: usize) -> Self {
        let n = vectors.len();
        let nlist = if config.nlist == 0 {
            (n as f64).sqrt().round() as usize
        } else {
            config.nlist
        }
        .clamp(1, n.max(1));

        let mut centroids: Vec<Vec<f32>> = (0..nlist)
            .map(|i| vectors[i * n / nlist].to_vec())
            .collect();

        let mut assignment = vec![0usize; n];
        for _ in 0..config.iterations.max(1) {
            let next = parallel_map(vectors, workers, |v| nearest(&centroids, v));
            let converged = next == assignment;
            assignment = next;

            let mut sums = vec![vec![0.0f32; dimensions]; nlist];
            let mut counts = vec![0usize; nlist];
            for (v, &cell) in vectors.iter().zip(&assignment) {
                counts[cell] += 1;
                for (s, x) in sums[cell].iter_mut().zip(v.iter()) {
                    *s += x;
                }
            }
            for (cell, mut sum) in sums.into_iter().enumerate() {
                // Empty cells keep their previous centroid
                if counts[cell] > 0 {
                    l2_normalize(&mut sum);
                    centroids[cell] = sum;
                }
            }
            if converged {
                break;
            }
        }

        let mut lists = vec![Vec::new(); nlist];
        for (pos, &cell) in assignment.iter().enumerate() {
            lists[cell].push(pos as u32);
        }

        info!(
            "Built IVF index: {n} vectors in {nlist} lists (nprobe {})",
            config.nprobe
        );

        Self {
            centroids,
            lists,
            nprobe: config.nprobe.clamp(1, nlist),
        }
    }

    #[must_use]
    pub fn nlist(&self) -> usize {
        self.centroids.len()
    }

    #[must_use]
    pub fn nprobe(&self) -> usize {
        self.nprobe
    }

    /// Positions of the candidate chunks for `query`, ascending.
    #[must_use]
    pub fn probe(&self, query: &[f32]) -> Vec<usize> {
        let mut cells: Vec<(f32, usize)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (dot(c, query), i))
            .collect();
        cells.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut candidates: Vec<usize> = cells
            .iter()
            .take(self.nprobe)
            .flat_map(|&(_, cell)| self.lists[cell].iter().map(|&p| p as usize))
            .collect();
        candidates.sort_unstable();
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: &[f32]) -> Vec<f32> {
        let mut v = v.to_vec();
        l2_normalize(&mut v);
        v
    }

    fn clustered() -> Vec<Vec<f32>> {
        // Three contiguous blocks so evenly spaced seeding hits each cluster
        let jitter = |i: usize| i as f32 * 0.001;
        let mut out = Vec::new();
        out.extend((0..30).map(|i| unit(&[1.0, jitter(i), 0.0])));
        out.extend((0..30).map(|i| unit(&[0.0, 1.0, jitter(i)])));
        out.extend((0..30).map(|i| unit(&[jitter(i), 0.0, 1.0])));
        out
    }

    #[test]
    fn test_every_vector_in_exactly_one_list() {
        let data = clustered();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let config = IndexConfig {
            nlist: 3,
            nprobe: 1,
            ..IndexConfig::default()
        };
        let index = IvfIndex::build(&refs, 3, &config, 2);
        let total: usize = index.lists.iter().map(Vec::len).sum();
        assert_eq!(total, data.len());
        assert_eq!(index.nlist(), 3);
    }

    #[test]
    fn test_probe_finds_own_cluster() {
        let data = clustered();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let config = IndexConfig {
            nlist: 3,
            nprobe: 1,
            ..IndexConfig::default()
        };
        let index = IvfIndex::build(&refs, 3, &config, 1);
        let candidates = index.probe(&unit(&[0.0, 0.0, 1.0]));
        assert!(!candidates.is_empty());
        for pos in &candidates {
            assert!(data[*pos][2] > 0.9, "candidate {pos} is from another cluster");
        }
        assert!(candidates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_deterministic_build() {
        let data = clustered();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let config = IndexConfig::default();
        let a = IvfIndex::build(&refs, 3, &config, 1);
        let b = IvfIndex::build(&refs, 3, &config, 4);
        assert_eq!(a.lists, b.lists);
    }
}
