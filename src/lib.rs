pub mod basis_selector;
pub mod bin_argument_parsing;
pub mod bin_report;
pub mod blast_hits;
pub mod cluster_engine;
pub mod contig;
pub mod contig_lengths;
pub mod coverage_file;
pub mod genome_index;
pub mod kmer_signatures;
pub mod merge_log_validation;
pub mod representative_set;
pub mod request_dispatcher;
pub mod role_file;
pub mod score_vector;
pub mod server_argument_parsing;
pub mod similarity;
pub mod similarity_cache;
pub mod similarity_computer;

#[macro_use]
extern crate log;
extern crate clap;
extern crate rayon;
#[macro_use]
extern crate lazy_static;

use crate::score_vector::ScoreVector;

/// A way of turning two contig similarity vectors into a single score. Higher
/// scores mean more similar.
pub trait ContigSimilarity: Sync {
    fn compare(&self, vector1: &ScoreVector, vector2: &ScoreVector) -> f64;

    /// Whether the candidate list must be sorted by descending score before
    /// clustering. Methods which only ever return 0/1 are processed in
    /// contig order instead.
    fn sort_needed(&self) -> bool;

    fn method_name(&self) -> &str;
}

/// Chooses which reference genomes are kept as coordinates of the similarity
/// vectors.
pub trait BasisStrategy {
    /// Return positions into the reference genome list, in basis order.
    fn compute(&self, raw_vectors: &[&ScoreVector], num_genomes: usize) -> Vec<usize>;

    fn method_name(&self) -> &str;
}

pub const DEFAULT_BLAST_TYPE: &str = "blastn";
pub const DEFAULT_SCORING_MODE: &str = "vector";
pub const DEFAULT_SIMILARITY_METHOD: &str = "dot";
pub const DEFAULT_BASIS_METHOD: &str = "normal";
pub const DEFAULT_MAX_BASIS: &str = "2000";
pub const DEFAULT_MAX_PSCORE: &str = "1e-5";
pub const DEFAULT_MIN_ALIGNMENT_LENGTH: &str = "40";
pub const DEFAULT_MIN_SIMILARITY: &str = "1000";
pub const DEFAULT_DIST_TOLERANCE: &str = "5";
pub const DEFAULT_COVERAGE_RATIO: &str = "1.5";
pub const DEFAULT_ROLE_OVERLAP: &str = "2";

pub const AUTHOR: &str =
    "Ben J. Woodcroft, Centre for Microbiome Research, Queensland University of Technology";
