use std;
use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::contig::Contig;
use crate::role_file::RoleCounts;
use crate::similarity_cache::SimilarityRecord;

/// Hard limits on which clusters may be merged.
#[derive(Debug, Clone, Copy)]
pub struct MergeConstraints {
    /// Reject if the higher coverage is more than this multiple of the lower.
    pub coverage_ratio_limit: f64,
    /// Reject if more than this many universal roles are found in both.
    pub role_overlap_limit: usize,
}

impl MergeConstraints {
    pub fn coverage_ratio_ok(&self, coverage1: f64, coverage2: f64) -> bool {
        let (low, high) = if coverage1 < coverage2 {
            (coverage1, coverage2)
        } else {
            (coverage2, coverage1)
        };
        high <= self.coverage_ratio_limit * low
    }

    pub fn role_overlap_ok(&self, role_overlap: usize) -> bool {
        role_overlap <= self.role_overlap_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeOutcome {
    Merged,
    SameCluster,
    RoleOverlap,
    CoverageRatio,
    UnknownContig,
}

impl MergeOutcome {
    pub fn name(&self) -> &str {
        match self {
            MergeOutcome::Merged => "merged",
            MergeOutcome::SameCluster => "same-cluster",
            MergeOutcome::RoleOverlap => "role-overlap",
            MergeOutcome::CoverageRatio => "coverage-ratio",
            MergeOutcome::UnknownContig => "unknown-contig",
        }
    }

    pub fn from_name(name: &str) -> Result<MergeOutcome> {
        match name {
            "merged" => Ok(MergeOutcome::Merged),
            "same-cluster" => Ok(MergeOutcome::SameCluster),
            "role-overlap" => Ok(MergeOutcome::RoleOverlap),
            "coverage-ratio" => Ok(MergeOutcome::CoverageRatio),
            "unknown-contig" => Ok(MergeOutcome::UnknownContig),
            _ => Err(anyhow!("Unknown merge outcome '{}'", name)),
        }
    }
}

/// One decision of the greedy merge, with the cluster state it was made on.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeEvent {
    pub score: f64,
    pub contig_a: String,
    pub contig_b: String,
    pub role_overlap: usize,
    pub coverage_a: f64,
    pub coverage_b: f64,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeSummary {
    pub num_merged: usize,
    pub num_same_cluster: usize,
    pub num_role_overlap_rejections: usize,
    pub num_coverage_rejections: usize,
    pub num_unknown_contig: usize,
}

#[derive(Debug)]
struct ClusterRecord {
    members: Vec<usize>,
    roles: RoleCounts,
    coverage: f64,
    length: u64,
}

impl ClusterRecord {
    fn role_overlap(&self, other: &ClusterRecord) -> usize {
        self.roles
            .keys()
            .filter(|role| other.roles.contains_key(*role))
            .count()
    }

    /// Move everything from other into self.
    fn absorb(&mut self, other: ClusterRecord) {
        let total_length = self.length + other.length;
        self.coverage = if total_length > 0 {
            (self.coverage * self.length as f64 + other.coverage * other.length as f64)
                / total_length as f64
        } else {
            (self.coverage * self.members.len() as f64
                + other.coverage * other.members.len() as f64)
                / (self.members.len() + other.members.len()) as f64
        };
        self.length = total_length;
        for (role, count) in other.roles {
            *self.roles.entry(role).or_insert(0) += count;
        }
        self.members.extend(other.members);
    }
}

/// A finished cluster of contigs.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub contigs: Vec<String>,
    pub roles: RoleCounts,
    pub coverage: f64,
    pub length: u64,
    /// Basis coordinate and summed raw score over all members, best first.
    pub best_genomes: Vec<(usize, f64)>,
}

pub struct ClusteringResult {
    pub bins: Vec<Bin>,
    pub merge_log: Vec<MergeEvent>,
    pub summary: MergeSummary,
}

/// Greedy agglomerative clustering. Clusters live in an arena and are
/// addressed by handle. A cluster's handle is its first contig's index, and
/// merged away clusters leave an empty slot.
pub struct ClusterEngine<'a> {
    contigs: &'a [Contig],
    contig_indices: HashMap<&'a str, usize>,
    contig_to_cluster: Vec<usize>,
    clusters: Vec<Option<ClusterRecord>>,
    merge_log: Vec<MergeEvent>,
    summary: MergeSummary,
}

impl<'a> ClusterEngine<'a> {
    /// Start with one cluster per contig.
    pub fn new(contigs: &'a [Contig]) -> ClusterEngine<'a> {
        ClusterEngine {
            contigs,
            contig_indices: contigs
                .iter()
                .enumerate()
                .map(|(i, c)| (c.name.as_str(), i))
                .collect(),
            contig_to_cluster: (0..contigs.len()).collect(),
            clusters: contigs
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    Some(ClusterRecord {
                        members: vec![i],
                        roles: c.roles.clone(),
                        coverage: c.coverage,
                        length: c.length,
                    })
                })
                .collect(),
            merge_log: vec![],
            summary: MergeSummary::default(),
        }
    }

    /// Process the candidate pairs in order, merging the clusters of each pair
    /// unless that would break one of the constraints.
    pub fn merge_candidates(
        &mut self,
        similarities: &[SimilarityRecord],
        constraints: &MergeConstraints,
    ) {
        info!(
            "Merging clusters over {} candidate contig pairs ..",
            similarities.len()
        );
        for similarity in similarities {
            let outcome = self.merge_candidate(similarity, constraints);
            trace!(
                "Candidate {} {} {}: {}",
                similarity.score,
                similarity.contig_a,
                similarity.contig_b,
                outcome.name()
            );
        }
        info!(
            "Made {} merges, rejected {} for role overlap and {} for coverage ratio",
            self.summary.num_merged,
            self.summary.num_role_overlap_rejections,
            self.summary.num_coverage_rejections
        );
    }

    fn merge_candidate(
        &mut self,
        similarity: &SimilarityRecord,
        constraints: &MergeConstraints,
    ) -> MergeOutcome {
        let (index1, index2) = match (
            self.contig_indices.get(similarity.contig_a.as_str()),
            self.contig_indices.get(similarity.contig_b.as_str()),
        ) {
            (Some(i), Some(j)) => (*i, *j),
            _ => {
                debug!(
                    "Skipping similarity between {} and {} as one is not being clustered",
                    similarity.contig_a, similarity.contig_b
                );
                self.summary.num_unknown_contig += 1;
                self.log_event(similarity, 0, 0.0, 0.0, MergeOutcome::UnknownContig);
                return MergeOutcome::UnknownContig;
            }
        };
        let handle1 = self.contig_to_cluster[index1];
        let handle2 = self.contig_to_cluster[index2];
        if handle1 == handle2 {
            self.summary.num_same_cluster += 1;
            return MergeOutcome::SameCluster;
        }

        let (role_overlap, coverage1, coverage2) = {
            let cluster1 = self.cluster(handle1);
            let cluster2 = self.cluster(handle2);
            (
                cluster1.role_overlap(cluster2),
                cluster1.coverage,
                cluster2.coverage,
            )
        };

        let outcome = if !constraints.role_overlap_ok(role_overlap) {
            self.summary.num_role_overlap_rejections += 1;
            MergeOutcome::RoleOverlap
        } else if !constraints.coverage_ratio_ok(coverage1, coverage2) {
            self.summary.num_coverage_rejections += 1;
            MergeOutcome::CoverageRatio
        } else {
            self.merge(handle1, handle2);
            self.summary.num_merged += 1;
            MergeOutcome::Merged
        };
        self.log_event(similarity, role_overlap, coverage1, coverage2, outcome);
        outcome
    }

    fn cluster(&self, handle: usize) -> &ClusterRecord {
        match &self.clusters[handle] {
            Some(c) => c,
            None => panic!("Programming error: cluster handle {} is not live", handle),
        }
    }

    /// Merge the smaller cluster into the larger. When they are the same size
    /// the lower handle survives.
    fn merge(&mut self, handle1: usize, handle2: usize) {
        let size1 = self.cluster(handle1).members.len();
        let size2 = self.cluster(handle2).members.len();
        let (keep, absorbed) = if size1 > size2 || (size1 == size2 && handle1 < handle2) {
            (handle1, handle2)
        } else {
            (handle2, handle1)
        };
        let moved = match self.clusters[absorbed].take() {
            Some(c) => c,
            None => panic!("Programming error: cluster handle {} is not live", absorbed),
        };
        for member in moved.members.iter() {
            self.contig_to_cluster[*member] = keep;
        }
        debug!(
            "Merging cluster {} ({} contigs) into cluster {}",
            absorbed,
            moved.members.len(),
            keep
        );
        if let Some(kept) = self.clusters[keep].as_mut() {
            kept.absorb(moved);
        }
    }

    fn log_event(
        &mut self,
        similarity: &SimilarityRecord,
        role_overlap: usize,
        coverage_a: f64,
        coverage_b: f64,
        outcome: MergeOutcome,
    ) {
        self.merge_log.push(MergeEvent {
            score: similarity.score,
            contig_a: similarity.contig_a.clone(),
            contig_b: similarity.contig_b.clone(),
            role_overlap,
            coverage_a,
            coverage_b,
            outcome,
        })
    }

    pub fn summary(&self) -> &MergeSummary {
        &self.summary
    }

    /// Name of each contig's current cluster's first contig.
    pub fn cluster_of(&self, contig: &str) -> Option<&str> {
        self.contig_indices.get(contig).map(|i| {
            let handle = self.contig_to_cluster[*i];
            self.contigs[self.cluster(handle).members[0]].name.as_str()
        })
    }

    /// Final bins, most role-diverse first.
    pub fn finish(self) -> ClusteringResult {
        let contigs = self.contigs;
        let mut bins: Vec<Bin> = self
            .clusters
            .into_iter()
            .flatten()
            .map(|cluster| {
                let num_coordinates = contigs[cluster.members[0]].raw_scores.len();
                let mut totals = vec![0.0; num_coordinates];
                for member in cluster.members.iter() {
                    for (i, v) in contigs[*member].raw_scores.values().iter().enumerate() {
                        totals[i] += v;
                    }
                }
                let mut best_genomes: Vec<(usize, f64)> = totals
                    .into_iter()
                    .enumerate()
                    .filter(|(_, total)| *total > 0.0)
                    .collect();
                best_genomes.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                });
                Bin {
                    contigs: cluster
                        .members
                        .iter()
                        .map(|m| contigs[*m].name.clone())
                        .collect(),
                    roles: cluster.roles,
                    coverage: cluster.coverage,
                    length: cluster.length,
                    best_genomes,
                }
            })
            .collect();
        bins.sort_by(|a, b| {
            b.roles
                .len()
                .cmp(&a.roles.len())
                .then(b.length.cmp(&a.length))
                .then(a.contigs[0].cmp(&b.contigs[0]))
        });
        ClusteringResult {
            bins,
            merge_log: self.merge_log,
            summary: self.summary,
        }
    }
}
