use std::collections::BTreeMap;

use crate::role_file::RoleCounts;
use crate::score_vector::ScoreVector;

/// A contig ready for clustering.
#[derive(Debug, Clone)]
pub struct Contig {
    pub name: String,
    pub length: u64,
    pub coverage: f64,
    /// Projected onto the basis but not normalised. Used for reporting.
    pub raw_scores: ScoreVector,
    /// What is compared during clustering.
    pub vector: ScoreVector,
    pub roles: RoleCounts,
}

/// Optional per-contig annotations.
#[derive(Default)]
pub struct ContigAnnotations {
    pub lengths: Option<BTreeMap<String, u64>>,
    pub coverages: BTreeMap<String, f64>,
    pub roles: BTreeMap<String, RoleCounts>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ContigSetSummary {
    pub num_with_hits: usize,
    pub num_dropped: usize,
    pub num_missing_coverage: usize,
    pub num_missing_length: usize,
    pub num_unknown_coverage_rows: usize,
}

/// Project each contig's raw vector onto the basis, adjust it, and attach the
/// annotations. Degenerate contigs are dropped. The result is sorted by contig
/// name.
pub fn build_contigs(
    raw_vectors: BTreeMap<String, ScoreVector>,
    basis: &[usize],
    normalize: bool,
    max_total_score: Option<f64>,
    mut annotations: ContigAnnotations,
) -> (Vec<Contig>, ContigSetSummary) {
    let mut summary = ContigSetSummary {
        num_with_hits: raw_vectors.len(),
        ..Default::default()
    };
    summary.num_unknown_coverage_rows = annotations
        .coverages
        .keys()
        .filter(|name| !raw_vectors.contains_key(*name))
        .count();
    if summary.num_unknown_coverage_rows > 0 {
        warn!(
            "Skipping {} coverage rows for contigs without hits",
            summary.num_unknown_coverage_rows
        );
    }

    let mut contigs = Vec::with_capacity(raw_vectors.len());
    for (name, raw) in raw_vectors.into_iter() {
        let raw_scores = raw.project(basis);
        let mut vector = raw_scores.clone();
        if !vector.adjust_vector(normalize, max_total_score) {
            debug!("Dropping contig {} with degenerate score vector", name);
            summary.num_dropped += 1;
            continue;
        }

        let coverage = match annotations.coverages.get(&name) {
            Some(c) => *c,
            None => {
                warn!("No coverage found for contig {}, using 0", name);
                summary.num_missing_coverage += 1;
                0.0
            }
        };
        let length = match &annotations.lengths {
            Some(lengths) => match lengths.get(&name) {
                Some(l) => *l,
                None => {
                    warn!("No sequence found for contig {}, using length 0", name);
                    summary.num_missing_length += 1;
                    0
                }
            },
            None => 0,
        };
        let roles = annotations.roles.remove(&name).unwrap_or_default();

        contigs.push(Contig {
            name,
            length,
            coverage,
            raw_scores,
            vector,
            roles,
        });
    }
    (contigs, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_build_contigs() {
        init();
        let mut raw = BTreeMap::new();
        raw.insert("b".to_string(), ScoreVector::from_values(vec![0.0, 3.0, 4.0]));
        raw.insert("a".to_string(), ScoreVector::from_values(vec![5.0, 0.0, 0.0]));
        raw.insert("z".to_string(), ScoreVector::from_values(vec![0.0, 0.0, 9.0]));

        let mut annotations = ContigAnnotations::default();
        annotations.coverages.insert("a".to_string(), 5.0);
        annotations.coverages.insert("q".to_string(), 5.0);

        // Basis without the first genome means 'a' has nothing left.
        let (contigs, summary) = build_contigs(raw, &[1, 2], true, None, annotations);
        assert_eq!(
            vec!["b", "z"],
            contigs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(&[3.0, 4.0], contigs[0].raw_scores.values());
        assert_eq!(&[0.6, 0.8], contigs[0].vector.values());
        assert_eq!(0.0, contigs[0].coverage);
        assert_eq!(
            ContigSetSummary {
                num_with_hits: 3,
                num_dropped: 1,
                num_missing_coverage: 2,
                num_missing_length: 0,
                num_unknown_coverage_rows: 1,
            },
            summary
        );
    }
}
