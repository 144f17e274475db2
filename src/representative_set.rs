use std::collections::HashSet;

use crate::genome_index::GenomeIndex;

pub const MIN_THRESHOLD: i64 = 5;
pub const MAX_THRESHOLD: i64 = 200;
/// Bisection stops once the threshold is bracketed this tightly.
pub const THRESHOLD_BRACKET: i64 = 4;
pub const MIN_BISECTION_ITERATIONS: usize = 4;

/// Chooses representative genomes so that no two representatives share
/// max_sim or more k-mers.
pub struct RepresentativeSetSolver<'a> {
    index: &'a GenomeIndex,
}

impl<'a> RepresentativeSetSolver<'a> {
    pub fn new(index: &'a GenomeIndex) -> RepresentativeSetSolver<'a> {
        RepresentativeSetSolver { index }
    }

    /// Greedily accept candidates in order, excluding every neighbour of an
    /// accepted genome that shares at least max_sim k-mers with it. The result
    /// depends on the candidate order.
    pub fn thin(&self, max_sim: i64, candidates: &[usize]) -> Vec<usize> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut representatives = vec![];
        for candidate in candidates {
            if !seen.insert(*candidate) {
                continue;
            }
            representatives.push(*candidate);
            if max_sim <= 0 {
                continue;
            }
            // Neighbours are sorted by descending count
            for neighbor in self.index.neighbors(*candidate) {
                if i64::from(neighbor.count) < max_sim {
                    break;
                }
                seen.insert(neighbor.index);
            }
        }
        trace!(
            "Thinned {} candidates to {} at max_sim {}",
            candidates.len(),
            representatives.len(),
            max_sim
        );
        representatives
    }

    /// Representatives of all genomes, preferring those in keep.
    pub fn rep_set_for_threshold(&self, max_sim: i64, keep: &[usize]) -> Vec<usize> {
        let candidates: Vec<usize> = keep.iter().copied().chain(0..self.index.len()).collect();
        self.thin(max_sim, &candidates)
    }

    /// Bisect the threshold to get about target_size representatives. Returns
    /// the last threshold tried and its representatives, which need not be
    /// exactly target_size.
    pub fn rep_set_for_target_size(&self, target_size: usize, keep: &[usize]) -> (i64, Vec<usize>) {
        let mut lo = MIN_THRESHOLD;
        let mut hi = MAX_THRESHOLD;
        let mut iterations = 0;
        loop {
            let mid = (lo + hi) / 2;
            let representatives = self.rep_set_for_threshold(mid, keep);
            debug!(
                "Threshold {} gives {} representatives",
                mid,
                representatives.len()
            );
            if representatives.len() < target_size {
                lo = mid;
            } else {
                hi = mid;
            }
            iterations += 1;
            if iterations >= MIN_BISECTION_ITERATIONS && hi - lo <= THRESHOLD_BRACKET {
                return (mid, representatives);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn all_share(num_genomes: usize, count: u32) -> GenomeIndex {
        GenomeIndex::from_parts(
            (0..num_genomes).map(|i| format!("g{}", i)).collect(),
            vec![None; num_genomes],
            (0..num_genomes)
                .map(|i| {
                    (0..num_genomes)
                        .filter(|j| *j != i)
                        .map(|j| (count, j))
                        .collect()
                })
                .collect(),
            8,
            None,
        )
    }

    /// 0-2: 150, 0-4: 20, 1-3: 60, 2-4: 15, 3-4: 8
    fn chain() -> GenomeIndex {
        GenomeIndex::from_parts(
            (0..5).map(|i| format!("g{}", i)).collect(),
            vec![None; 5],
            vec![
                vec![(150, 2), (20, 4)],
                vec![(60, 3)],
                vec![(150, 0), (15, 4)],
                vec![(60, 1), (8, 4)],
                vec![(20, 0), (15, 2), (8, 3)],
            ],
            5,
            None,
        )
    }

    #[test]
    fn test_all_sharing() {
        init();
        let index = all_share(5, 50);
        let solver = RepresentativeSetSolver::new(&index);
        assert_eq!(vec![0], solver.rep_set_for_threshold(40, &[]));
        assert_eq!(vec![0, 1, 2, 3, 4], solver.rep_set_for_threshold(60, &[]));
        assert_eq!(vec![3], solver.rep_set_for_threshold(50, &[3]));
    }

    #[test]
    fn test_thin_edge_cases() {
        init();
        let index = chain();
        let solver = RepresentativeSetSolver::new(&index);
        assert_eq!(vec![2, 0, 4], solver.thin(0, &[2, 0, 2, 4]));
        assert_eq!(vec![0, 1, 3, 4], solver.thin(-1, &[0, 1, 3, 4]));
        assert!(solver.thin(10, &[]).is_empty());
    }

    #[test]
    fn test_keep_first() {
        init();
        let index = chain();
        let solver = RepresentativeSetSolver::new(&index);
        assert_eq!(vec![0, 1, 3, 4], solver.rep_set_for_threshold(100, &[]));
        assert_eq!(vec![2, 1, 3, 4], solver.rep_set_for_threshold(100, &[2]));
        assert_eq!(vec![0, 1], solver.rep_set_for_threshold(10, &[]));
    }

    #[test]
    fn test_monotonic_in_threshold() {
        init();
        let index = chain();
        let solver = RepresentativeSetSolver::new(&index);
        let mut last = 0;
        for max_sim in 1..200 {
            let size = solver.rep_set_for_threshold(max_sim, &[]).len();
            assert!(size >= last, "size dropped at max_sim {}", max_sim);
            last = size;
        }
        assert_eq!(5, last);
    }

    #[test]
    fn test_target_size() {
        init();
        let index = chain();
        let solver = RepresentativeSetSolver::new(&index);
        let (threshold, representatives) = solver.rep_set_for_target_size(3, &[]);
        assert_eq!(20, threshold);
        assert_eq!(vec![0, 1], representatives);

        for target in 0..7 {
            let (threshold, representatives) = solver.rep_set_for_target_size(target, &[1]);
            assert!(threshold >= MIN_THRESHOLD && threshold <= MAX_THRESHOLD);
            assert_eq!(solver.rep_set_for_threshold(threshold, &[1]), representatives);
        }
    }
}
