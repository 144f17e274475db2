use std::path::Path;

use anyhow::Result;
use concurrent_queue::ConcurrentQueue;
use rayon::prelude::*;

use crate::contig::Contig;
use crate::similarity_cache::{
    read_similarity_cache, write_similarity_cache, CacheSignature, SimilarityRecord,
};
use crate::ContigSimilarity;

/// Compare every pair of contigs, keeping pairs scoring more than
/// min_similarity. This is quadratic in the number of contigs, but each pair
/// is independent so the comparisons are spread over the rayon thread pool.
///
/// The result is ordered by descending score if the similarity method needs
/// it, otherwise by contig names. Ties are broken by contig names, so the
/// order does not depend on the thread count or the order of the contigs.
pub fn compute_similarities(
    contigs: &[Contig],
    similarity: &dyn ContigSimilarity,
    min_similarity: f64,
) -> Vec<SimilarityRecord> {
    info!(
        "Calculating {} similarities between {} contigs ..",
        similarity.method_name(),
        contigs.len()
    );
    let queue = ConcurrentQueue::unbounded();
    contigs.par_iter().enumerate().for_each(|(i, contig1)| {
        contigs[(i + 1)..contigs.len()]
            .iter()
            .for_each(|contig2| {
                let score = similarity.compare(&contig1.vector, &contig2.vector);
                trace!("Similarity of {} and {} is {}", contig1.name, contig2.name, score);
                if score > min_similarity {
                    // Cannot fail since the queue is unbounded and never closed
                    let _ = queue.push(SimilarityRecord::new(score, &contig1.name, &contig2.name));
                }
            });
    });

    let mut records = Vec::with_capacity(queue.len());
    while let Ok(record) = queue.pop() {
        records.push(record);
    }
    if similarity.sort_needed() {
        records.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (&a.contig_a, &a.contig_b).cmp(&(&b.contig_a, &b.contig_b)))
        });
    } else {
        records.sort_by(|a, b| (&a.contig_a, &a.contig_b).cmp(&(&b.contig_a, &b.contig_b)));
    }
    info!("Found {} pairs above similarity {}", records.len(), min_similarity);
    records
}

/// Similarities from the cache if it was made with the same signature,
/// otherwise computed and then cached.
pub fn cached_similarities(
    cache_path: Option<&Path>,
    signature: &CacheSignature,
    contigs: &[Contig],
    similarity: &dyn ContigSimilarity,
) -> Result<Vec<SimilarityRecord>> {
    if let Some(path) = cache_path {
        if let Some(records) = read_similarity_cache(path, signature)? {
            return Ok(records);
        }
    }
    let records = compute_similarities(contigs, similarity, signature.min_similarity);
    if let Some(path) = cache_path {
        write_similarity_cache(path, signature, &records)?;
        info!("Cached similarities in {}", path.display());
    }
    Ok(records)
}
