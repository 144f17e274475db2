use std;
use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use disjoint::DisjointSet;

use crate::bin_report::MERGE_LOG_HEADER;
use crate::cluster_engine::{MergeConstraints, MergeEvent, MergeOutcome};
use crate::contig_lengths::read_contig_lengths;
use crate::coverage_file::read_coverage_file;
use crate::role_file::{read_role_file, RoleCounts};

/// Per-contig inputs of the binning run. Those given are used to recompute
/// the role overlaps and coverages written in the merge log, rather than
/// trusting them.
#[derive(Default)]
pub struct ReplayAnnotations {
    pub coverages: Option<BTreeMap<String, f64>>,
    pub lengths: Option<BTreeMap<String, u64>>,
    pub roles: Option<BTreeMap<String, RoleCounts>>,
}

impl ReplayAnnotations {
    pub fn from_files(
        coverage_file: Option<&str>,
        contig_fasta: Option<&str>,
        role_file: Option<&str>,
    ) -> Result<ReplayAnnotations> {
        Ok(ReplayAnnotations {
            coverages: coverage_file.map(read_coverage_file).transpose()?,
            lengths: contig_fasta.map(read_contig_lengths).transpose()?,
            roles: role_file.map(read_role_file).transpose()?,
        })
    }
}

/// A replayed bin, merged the same way as during clustering.
struct ReplayedBin {
    size: usize,
    length: u64,
    coverage: f64,
    roles: RoleCounts,
}

impl ReplayedBin {
    fn new(contig: &str, annotations: &ReplayAnnotations) -> ReplayedBin {
        ReplayedBin {
            size: 1,
            length: annotations
                .lengths
                .as_ref()
                .and_then(|l| l.get(contig).copied())
                .unwrap_or(0),
            coverage: annotations
                .coverages
                .as_ref()
                .and_then(|c| c.get(contig).copied())
                .unwrap_or(0.0),
            roles: annotations
                .roles
                .as_ref()
                .and_then(|r| r.get(contig).cloned())
                .unwrap_or_default(),
        }
    }

    fn role_overlap(&self, other: &ReplayedBin) -> usize {
        self.roles
            .keys()
            .filter(|role| other.roles.contains_key(*role))
            .count()
    }

    fn absorb(&mut self, other: ReplayedBin) {
        let total_length = self.length + other.length;
        self.coverage = if total_length > 0 {
            (self.coverage * self.length as f64 + other.coverage * other.length as f64)
                / total_length as f64
        } else {
            (self.coverage * self.size as f64 + other.coverage * other.size as f64)
                / (self.size + other.size) as f64
        };
        self.length = total_length;
        self.size += other.size;
        for (role, count) in other.roles {
            *self.roles.entry(role).or_insert(0) += count;
        }
    }
}

fn close_enough(logged: f64, recomputed: f64) -> bool {
    (logged - recomputed).abs() <= 1e-9 * logged.abs().max(recomputed.abs()).max(1.0)
}

#[derive(Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub num_merges: usize,
    /// Bins of 2 or more contigs
    pub num_bins: usize,
    pub num_role_overlap_violations: usize,
    pub num_coverage_violations: usize,
    pub num_redundant_merges: usize,
    /// Logged role overlaps or coverages which differ from those recomputed
    pub num_value_mismatches: usize,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.num_role_overlap_violations == 0
            && self.num_coverage_violations == 0
            && self.num_redundant_merges == 0
            && self.num_value_mismatches == 0
    }
}

/// Replay the merges of a merge log, checking each was allowed under the
/// given constraints and joined two separate bins. Where annotations are
/// given, the logged role overlaps and coverages are checked against those
/// of the replayed bins.
pub fn validate_merges(
    merge_log: &[MergeEvent],
    constraints: &MergeConstraints,
    annotations: &ReplayAnnotations,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut contig_ids: HashMap<&str, usize> = HashMap::new();
    let mut replayed: Vec<Option<ReplayedBin>> = vec![];
    for event in merge_log {
        if event.outcome == MergeOutcome::UnknownContig {
            continue;
        }
        for contig in [event.contig_a.as_str(), event.contig_b.as_str()].iter() {
            if !contig_ids.contains_key(*contig) {
                contig_ids.insert(*contig, replayed.len());
                replayed.push(Some(ReplayedBin::new(contig, annotations)));
            }
        }
    }
    let mut bins = DisjointSet::with_len(contig_ids.len());
    // Index into replayed of each contig's current bin
    let mut contig_to_bin: Vec<usize> = (0..contig_ids.len()).collect();

    for event in merge_log {
        if event.outcome == MergeOutcome::UnknownContig {
            continue;
        }
        let a = contig_ids[event.contig_a.as_str()];
        let b = contig_ids[event.contig_b.as_str()];
        let (bin_a, bin_b) = (contig_to_bin[a], contig_to_bin[b]);
        if bin_a != bin_b {
            if let (Some(replayed_a), Some(replayed_b)) = (&replayed[bin_a], &replayed[bin_b]) {
                if annotations.roles.is_some() {
                    let role_overlap = replayed_a.role_overlap(replayed_b);
                    if role_overlap != event.role_overlap {
                        error!(
                            "Merge log gives {} roles in common for {} and {}, but their bins have {}",
                            event.role_overlap, event.contig_a, event.contig_b, role_overlap
                        );
                        report.num_value_mismatches += 1;
                    }
                }
                if annotations.coverages.is_some()
                    && !(close_enough(event.coverage_a, replayed_a.coverage)
                        && close_enough(event.coverage_b, replayed_b.coverage))
                {
                    error!(
                        "Merge log gives coverages {} and {} for {} and {}, but their bins have {} and {}",
                        event.coverage_a,
                        event.coverage_b,
                        event.contig_a,
                        event.contig_b,
                        replayed_a.coverage,
                        replayed_b.coverage
                    );
                    report.num_value_mismatches += 1;
                }
            }
        }
        if event.outcome != MergeOutcome::Merged {
            continue;
        }

        report.num_merges += 1;
        if !constraints.role_overlap_ok(event.role_overlap) {
            error!(
                "Merge of {} and {} is not ok: {} roles in common",
                event.contig_a, event.contig_b, event.role_overlap
            );
            report.num_role_overlap_violations += 1;
        }
        if !constraints.coverage_ratio_ok(event.coverage_a, event.coverage_b) {
            error!(
                "Merge of {} and {} is not ok: coverages {} and {}",
                event.contig_a, event.contig_b, event.coverage_a, event.coverage_b
            );
            report.num_coverage_violations += 1;
        }
        if !bins.join(a, b) {
            error!(
                "Merge of {} and {} is not ok: they were already in the same bin",
                event.contig_a, event.contig_b
            );
            report.num_redundant_merges += 1;
        } else {
            debug!("Merge of {} and {} is ok", event.contig_a, event.contig_b);
            if let Some(absorbed) = replayed[bin_b].take() {
                for bin in contig_to_bin.iter_mut() {
                    if *bin == bin_b {
                        *bin = bin_a;
                    }
                }
                if let Some(kept) = replayed[bin_a].as_mut() {
                    kept.absorb(absorbed);
                }
            }
        }
    }
    report.num_bins = bins.sets().iter().filter(|s| s.len() > 1).count();
    report
}

pub fn read_merge_log(merge_log_file: &str) -> Result<Vec<MergeEvent>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(
            std::fs::File::open(merge_log_file)
                .with_context(|| format!("Failed to open merge log {}", merge_log_file))?,
        );

    let headers = rdr
        .headers()
        .with_context(|| format!("Failed to find headers in merge log {}", merge_log_file))?;
    if headers.iter().collect::<Vec<_>>() != MERGE_LOG_HEADER.to_vec() {
        bail!("Incorrect headers found in merge log {}", merge_log_file);
    }

    let mut events = vec![];
    for record_res in rdr.records() {
        let record = record_res.with_context(|| format!("Failed to parse merge log {}", merge_log_file))?;
        if record.len() != MERGE_LOG_HEADER.len() {
            bail!(
                "Unexpectedly didn't find exactly {} fields in merge log: {:?}",
                MERGE_LOG_HEADER.len(),
                record
            );
        }
        events.push(MergeEvent {
            score: record[0].parse().with_context(|| format!("Bad score in {:?}", record))?,
            contig_a: record[1].to_string(),
            contig_b: record[2].to_string(),
            role_overlap: record[3]
                .parse()
                .with_context(|| format!("Bad role overlap in {:?}", record))?,
            coverage_a: record[4]
                .parse()
                .with_context(|| format!("Bad coverage in {:?}", record))?,
            coverage_b: record[5]
                .parse()
                .with_context(|| format!("Bad coverage in {:?}", record))?,
            outcome: MergeOutcome::from_name(&record[6])?,
        });
    }
    Ok(events)
}

/// Validate a merge log file, returning an error if any merge broke the
/// constraints.
pub fn validate_merge_log_file(
    merge_log_file: &str,
    constraints: &MergeConstraints,
    annotations: &ReplayAnnotations,
) -> Result<ValidationReport> {
    let merge_log = read_merge_log(merge_log_file)?;
    info!("Read in {} merge decisions", merge_log.len());
    let report = validate_merges(&merge_log, constraints, annotations);
    info!(
        "Replayed {} merges into {} bins of 2 or more contigs",
        report.num_merges, report.num_bins
    );
    if !report.is_ok() {
        bail!(
            "Merge log {} is not valid: {} role overlap, {} coverage ratio, {} redundant merges, {} mismatched values",
            merge_log_file,
            report.num_role_overlap_violations,
            report.num_coverage_violations,
            report.num_redundant_merges,
            report.num_value_mismatches
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn event(a: &str, b: &str, role_overlap: usize, coverage_a: f64, coverage_b: f64, outcome: MergeOutcome) -> MergeEvent {
        MergeEvent {
            score: 1.0,
            contig_a: a.to_string(),
            contig_b: b.to_string(),
            role_overlap,
            coverage_a,
            coverage_b,
            outcome,
        }
    }

    fn constraints() -> MergeConstraints {
        MergeConstraints {
            coverage_ratio_limit: 1.5,
            role_overlap_limit: 2,
        }
    }

    #[test]
    fn test_valid_log() {
        init();
        let log = vec![
            event("a", "b", 0, 10.0, 12.0, MergeOutcome::Merged),
            event("a", "c", 0, 11.0, 100.0, MergeOutcome::CoverageRatio),
            event("c", "d", 2, 100.0, 110.0, MergeOutcome::Merged),
        ];
        let report = validate_merges(&log, &constraints(), &ReplayAnnotations::default());
        assert!(report.is_ok());
        assert_eq!(2, report.num_merges);
        assert_eq!(2, report.num_bins);
    }

    #[test]
    fn test_invalid_log() {
        init();
        let log = vec![
            event("a", "b", 3, 10.0, 12.0, MergeOutcome::Merged),
            event("b", "c", 0, 10.0, 100.0, MergeOutcome::Merged),
            event("a", "c", 0, 10.0, 10.0, MergeOutcome::Merged),
        ];
        let report = validate_merges(&log, &constraints(), &ReplayAnnotations::default());
        assert_eq!(
            ValidationReport {
                num_merges: 3,
                num_bins: 1,
                num_role_overlap_violations: 1,
                num_coverage_violations: 1,
                num_redundant_merges: 1,
                num_value_mismatches: 0,
            },
            report
        );
    }

    #[test]
    fn test_validate_file() {
        init();
        let report = validate_merge_log_file(
            "tests/data/bins/merge_log.tsv",
            &constraints(),
            &ReplayAnnotations::default(),
        )
        .unwrap();
        assert_eq!(1, report.num_merges);
        assert!(validate_merge_log_file(
            "tests/data/bins/merge_log.tsv",
            &MergeConstraints {
                coverage_ratio_limit: 1.1,
                role_overlap_limit: 2
            },
            &ReplayAnnotations::default(),
        )
        .is_err());
    }

    fn bin_inputs() -> ReplayAnnotations {
        ReplayAnnotations::from_files(
            Some("tests/data/bins/coverage.tsv"),
            Some("tests/data/bins/contigs.fna"),
            Some("tests/data/bins/roles.tsv"),
        )
        .unwrap()
    }

    #[test]
    fn test_recomputed_values_match() {
        init();
        let report = validate_merge_log_file(
            "tests/data/bins/merge_log.tsv",
            &constraints(),
            &bin_inputs(),
        )
        .unwrap();
        assert_eq!(0, report.num_value_mismatches);
    }

    #[test]
    fn test_recomputed_values_mismatch() {
        init();
        let mut log = read_merge_log("tests/data/bins/merge_log.tsv").unwrap();
        assert!(validate_merges(&log, &constraints(), &bin_inputs()).is_ok());

        // c1 and c5 were compared after c1 merged with c2
        log[1].coverage_a = 10.0;
        // c3 and c4 share 3 roles
        log[3].role_overlap = 1;
        let report = validate_merges(&log, &constraints(), &bin_inputs());
        assert_eq!(2, report.num_value_mismatches);
        assert!(!report.is_ok());

        // Only the values with inputs given are checked
        let roles_only = ReplayAnnotations {
            roles: bin_inputs().roles,
            ..Default::default()
        };
        assert_eq!(
            1,
            validate_merges(&log, &constraints(), &roles_only).num_value_mismatches
        );
    }
}
