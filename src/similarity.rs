use anyhow::{anyhow, Result};

use crate::score_vector::ScoreVector;
use crate::ContigSimilarity;

/// Number of top ranked coordinates which must agree for BinSimilarity.
pub const BIN_RANK_DEPTH: usize = 3;

pub struct DotSimilarity;

impl ContigSimilarity for DotSimilarity {
    fn compare(&self, vector1: &ScoreVector, vector2: &ScoreVector) -> f64 {
        vector1
            .values()
            .iter()
            .zip(vector2.values().iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    fn sort_needed(&self) -> bool {
        true
    }

    fn method_name(&self) -> &str {
        "dot"
    }
}

/// Count of reference genomes both contigs hit with similar scores.
pub struct DistSimilarity {
    pub tolerance: f64,
}

impl ContigSimilarity for DistSimilarity {
    fn compare(&self, vector1: &ScoreVector, vector2: &ScoreVector) -> f64 {
        vector1
            .values()
            .iter()
            .zip(vector2.values().iter())
            .filter(|(a, b)| **a > 0.0 && **b > 0.0 && (**a - **b).abs() <= self.tolerance)
            .count() as f64
    }

    fn sort_needed(&self) -> bool {
        true
    }

    fn method_name(&self) -> &str {
        "dist"
    }
}

/// 1 when both contigs have the same best reference genome.
pub struct BestSimilarity;

impl ContigSimilarity for BestSimilarity {
    fn compare(&self, vector1: &ScoreVector, vector2: &ScoreVector) -> f64 {
        match (vector1.best_coordinate(), vector2.best_coordinate()) {
            (Some(best1), Some(best2)) if best1 == best2 => 1.0,
            _ => 0.0,
        }
    }

    fn sort_needed(&self) -> bool {
        false
    }

    fn method_name(&self) -> &str {
        "best"
    }
}

/// 1 when the top ranked reference genomes of both contigs come in the same
/// order.
pub struct BinSimilarity;

impl ContigSimilarity for BinSimilarity {
    fn compare(&self, vector1: &ScoreVector, vector2: &ScoreVector) -> f64 {
        let mut ranks1 = vector1.ranked_coordinates();
        let mut ranks2 = vector2.ranked_coordinates();
        if ranks1.is_empty() || ranks2.is_empty() {
            return 0.0;
        }
        ranks1.truncate(BIN_RANK_DEPTH);
        ranks2.truncate(BIN_RANK_DEPTH);
        if ranks1 == ranks2 {
            1.0
        } else {
            0.0
        }
    }

    fn sort_needed(&self) -> bool {
        false
    }

    fn method_name(&self) -> &str {
        "bin"
    }
}

pub fn similarity_from_name(name: &str, dist_tolerance: f64) -> Result<Box<dyn ContigSimilarity>> {
    match name {
        "dot" => Ok(Box::new(DotSimilarity)),
        "dist" => Ok(Box::new(DistSimilarity {
            tolerance: dist_tolerance,
        })),
        "best" => Ok(Box::new(BestSimilarity)),
        "bin" => Ok(Box::new(BinSimilarity)),
        _ => Err(anyhow!("Unknown similarity method '{}'", name)),
    }
}
