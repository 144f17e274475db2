use anyhow::{anyhow, Result};

use crate::score_vector::ScoreVector;
use crate::BasisStrategy;

/// Keep every reference genome.
pub struct NormalBasis;

impl BasisStrategy for NormalBasis {
    fn compute(&self, _raw_vectors: &[&ScoreVector], num_genomes: usize) -> Vec<usize> {
        (0..num_genomes).collect()
    }

    fn method_name(&self) -> &str {
        "normal"
    }
}

/// Keep only reference genomes that are the best hit of at least one contig,
/// most popular first.
pub struct HotGroupBasis {
    pub group_size: Option<usize>,
}

impl BasisStrategy for HotGroupBasis {
    fn compute(&self, raw_vectors: &[&ScoreVector], num_genomes: usize) -> Vec<usize> {
        let mut top_counts = vec![0usize; num_genomes];
        for vector in raw_vectors {
            if let Some(best) = vector.best_coordinate() {
                top_counts[best] += 1;
            }
        }
        let mut hot: Vec<usize> = (0..num_genomes).filter(|i| top_counts[*i] > 0).collect();
        // Stable, so ties stay in reference genome order
        hot.sort_by_key(|i| std::cmp::Reverse(top_counts[*i]));
        debug!("Found {} genomes which are a best hit: {:?}", hot.len(), hot);
        if let Some(group_size) = self.group_size {
            hot.truncate(group_size);
        }
        hot
    }

    fn method_name(&self) -> &str {
        "hot-group"
    }
}

pub fn basis_from_name(name: &str, hot_group_size: Option<usize>) -> Result<Box<dyn BasisStrategy>> {
    match name {
        "normal" => Ok(Box::new(NormalBasis)),
        "hot-group" => Ok(Box::new(HotGroupBasis {
            group_size: hot_group_size,
        })),
        _ => Err(anyhow!("Unknown basis method '{}'", name)),
    }
}

/// Choose the basis, truncating it to max_basis coordinates if given.
pub fn select_basis(
    strategy: &dyn BasisStrategy,
    raw_vectors: &[&ScoreVector],
    num_genomes: usize,
    max_basis: Option<usize>,
) -> Vec<usize> {
    let mut basis = strategy.compute(raw_vectors, num_genomes);
    if let Some(max) = max_basis {
        if basis.len() > max {
            info!(
                "Truncating {} basis of {} genomes to {}",
                strategy.method_name(),
                basis.len(),
                max
            );
            basis.truncate(max);
        }
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f64]) -> ScoreVector {
        ScoreVector::from_values(values.to_vec())
    }

    #[test]
    fn test_normal() {
        let vectors = vec![v(&[1.0, 0.0, 0.0])];
        let refs: Vec<&ScoreVector> = vectors.iter().collect();
        assert_eq!(vec![0, 1, 2], select_basis(&NormalBasis, &refs, 3, None));
        assert_eq!(vec![0, 1], select_basis(&NormalBasis, &refs, 3, Some(2)));
    }

    #[test]
    fn test_hot_group() {
        let vectors = vec![
            v(&[0.0, 90.0, 10.0, 0.0]),
            v(&[0.0, 0.0, 99.0, 0.0]),
            v(&[0.0, 95.0, 0.0, 80.0]),
            v(&[0.0, 0.0, 0.0, 0.0]),
        ];
        let refs: Vec<&ScoreVector> = vectors.iter().collect();
        let hot = HotGroupBasis { group_size: None };
        assert_eq!(vec![1, 2], select_basis(&hot, &refs, 4, None));
        let capped = HotGroupBasis {
            group_size: Some(1),
        };
        assert_eq!(vec![1], select_basis(&capped, &refs, 4, None));
    }
}
