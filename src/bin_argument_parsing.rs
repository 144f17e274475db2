use std;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::*;

use crate::basis_selector::{basis_from_name, select_basis};
use crate::bin_report::{bin_summary, write_bins, write_merge_log};
use crate::blast_hits::{blast_file_path, read_blast_file, read_reference_genomes, ReferenceGenome};
use crate::cluster_engine::{ClusterEngine, ClusteringResult, MergeConstraints};
use crate::contig::{build_contigs, Contig, ContigAnnotations, ContigSetSummary};
use crate::contig_lengths::read_contig_lengths;
use crate::coverage_file::read_coverage_file;
use crate::role_file::read_role_file;
use crate::score_vector::{ContigScores, HitFilter, ScoreVector, ScoringMode};
use crate::similarity::similarity_from_name;
use crate::similarity_cache::CacheSignature;
use crate::similarity_computer::cached_similarities;
use crate::{
    DEFAULT_BASIS_METHOD, DEFAULT_BLAST_TYPE, DEFAULT_COVERAGE_RATIO, DEFAULT_DIST_TOLERANCE,
    DEFAULT_MAX_BASIS, DEFAULT_MAX_PSCORE, DEFAULT_MIN_ALIGNMENT_LENGTH, DEFAULT_MIN_SIMILARITY,
    DEFAULT_ROLE_OVERLAP, DEFAULT_SCORING_MODE, DEFAULT_SIMILARITY_METHOD,
};

/// Everything needed to bin a set of contigs.
pub struct BinningParameters {
    pub reference_genomes: String,
    pub blast_directory: String,
    pub blast_type: String,
    pub coverage_file: String,
    pub contig_fasta: Option<String>,
    pub role_file: Option<String>,
    pub scoring_mode: ScoringMode,
    pub similarity_method: String,
    pub dist_tolerance: f64,
    pub normalize: bool,
    pub hit_filter: HitFilter,
    pub max_total_score: Option<f64>,
    pub basis_method: String,
    pub hot_group_size: Option<usize>,
    /// 0 for no limit
    pub max_basis: usize,
    pub min_similarity: f64,
    pub constraints: MergeConstraints,
    pub similarity_cache: Option<String>,
}

impl BinningParameters {
    pub fn from_matches(m: &ArgMatches) -> Result<BinningParameters> {
        Ok(BinningParameters {
            reference_genomes: m.get_one::<String>("reference-genomes").unwrap().clone(),
            blast_directory: m.get_one::<String>("blast-directory").unwrap().clone(),
            blast_type: m.get_one::<String>("blast-type").unwrap().clone(),
            coverage_file: m.get_one::<String>("coverage").unwrap().clone(),
            contig_fasta: m.get_one::<String>("contig-fasta").cloned(),
            role_file: m.get_one::<String>("roles").cloned(),
            scoring_mode: ScoringMode::from_name(m.get_one::<String>("scoring-mode").unwrap())?,
            similarity_method: m.get_one::<String>("similarity").unwrap().clone(),
            dist_tolerance: *m.get_one::<f64>("dist-tolerance").unwrap(),
            normalize: m.get_flag("normalize"),
            hit_filter: HitFilter {
                max_pscore: *m.get_one::<f64>("max-pscore").unwrap(),
                min_alignment_length: *m.get_one::<u32>("min-alignment-length").unwrap(),
            },
            max_total_score: m.get_one::<f64>("max-total-score").copied(),
            basis_method: m.get_one::<String>("basis").unwrap().clone(),
            hot_group_size: m.get_one::<usize>("hot-group-size").copied(),
            max_basis: *m.get_one::<usize>("max-basis").unwrap(),
            min_similarity: *m.get_one::<f64>("min-sim").unwrap(),
            constraints: MergeConstraints {
                coverage_ratio_limit: *m.get_one::<f64>("coverage-ratio").unwrap(),
                role_overlap_limit: *m.get_one::<usize>("role-overlap").unwrap(),
            },
            similarity_cache: m.get_one::<String>("similarity-cache").cloned(),
        })
    }

    /// Identifies every parameter which changes the similarities computed.
    fn cache_signature(&self) -> CacheSignature {
        let mut scoring_type = format!(
            "{}:{}:e{}:len{}",
            self.scoring_mode.name(),
            self.similarity_method,
            self.hit_filter.max_pscore,
            self.hit_filter.min_alignment_length
        );
        if self.similarity_method == "dist" {
            scoring_type.push_str(&format!(":tol{}", self.dist_tolerance));
        }
        if self.normalize {
            scoring_type.push_str(":norm");
        }
        if let Some(max_total_score) = self.max_total_score {
            scoring_type.push_str(&format!(":max{}", max_total_score));
        }
        let basis_type = match (self.basis_method.as_str(), self.hot_group_size) {
            ("hot-group", Some(size)) => format!("hot-group{}", size),
            (method, _) => method.to_string(),
        };
        CacheSignature {
            blast_type: self.blast_type.clone(),
            scoring_type,
            basis_type,
            basis_limit: self.max_basis,
            min_similarity: self.min_similarity,
        }
    }
}

/// The outcome of binning, with what is needed to report it.
pub struct Binning {
    pub genomes: Vec<ReferenceGenome>,
    pub basis: Vec<usize>,
    pub contigs: Vec<Contig>,
    pub contig_summary: ContigSetSummary,
    pub clustering: ClusteringResult,
}

impl Binning {
    pub fn basis_genomes(&self) -> Vec<&ReferenceGenome> {
        self.basis.iter().map(|i| &self.genomes[*i]).collect()
    }
}

/// Score each contig against each reference genome from its BLAST output.
fn score_contigs(params: &BinningParameters, genomes: &[ReferenceGenome]) -> Result<ContigScores> {
    let genome_ids: Vec<String> = genomes.iter().map(|g| g.id.clone()).collect();
    let mut scores = ContigScores::new(&genome_ids, params.scoring_mode, params.hit_filter);
    let blast_directory = Path::new(&params.blast_directory);
    let mut num_hits = 0usize;
    let mut num_accepted = 0usize;
    for genome in genomes {
        let path = blast_file_path(blast_directory, &genome.id, &params.blast_type);
        for hit in read_blast_file(&path)? {
            num_hits += 1;
            if scores.update_score(&hit.contig, &hit, &genome.id)? {
                num_accepted += 1;
            }
        }
    }
    info!(
        "Accepted {} of {} BLAST hits, across {} contigs",
        num_accepted,
        num_hits,
        scores.len()
    );
    Ok(scores)
}

fn read_annotations(params: &BinningParameters) -> Result<ContigAnnotations> {
    let mut annotations = ContigAnnotations {
        coverages: read_coverage_file(&params.coverage_file)?,
        ..Default::default()
    };
    if let Some(fasta) = &params.contig_fasta {
        annotations.lengths = Some(read_contig_lengths(fasta)?);
    }
    if let Some(role_file) = &params.role_file {
        annotations.roles = read_role_file(role_file)?;
    }
    Ok(annotations)
}

pub fn run_binning(params: &BinningParameters) -> Result<Binning> {
    let similarity = similarity_from_name(&params.similarity_method, params.dist_tolerance)?;
    let basis_strategy = basis_from_name(&params.basis_method, params.hot_group_size)?;

    let genomes = read_reference_genomes(&params.reference_genomes)?;
    info!("Read {} reference genomes", genomes.len());
    let raw_vectors = score_contigs(params, &genomes)?.into_vectors();

    let basis = {
        let vectors: Vec<&ScoreVector> = raw_vectors.values().collect();
        select_basis(
            basis_strategy.as_ref(),
            &vectors,
            genomes.len(),
            if params.max_basis > 0 {
                Some(params.max_basis)
            } else {
                None
            },
        )
    };
    info!(
        "Using a {} basis of {} reference genomes",
        basis_strategy.method_name(),
        basis.len()
    );

    let annotations = read_annotations(params)?;
    let (contigs, contig_summary) = build_contigs(
        raw_vectors,
        &basis,
        params.normalize,
        params.max_total_score,
        annotations,
    );
    info!(
        "Clustering {} contigs, after dropping {} of {} with hits",
        contigs.len(),
        contig_summary.num_dropped,
        contig_summary.num_with_hits
    );

    let signature = params.cache_signature();
    let similarities = cached_similarities(
        params.similarity_cache.as_ref().map(Path::new),
        &signature,
        &contigs,
        similarity.as_ref(),
    )?;

    let clustering = {
        let mut engine = ClusterEngine::new(&contigs);
        engine.merge_candidates(&similarities, &params.constraints);
        engine.finish()
    };

    Ok(Binning {
        genomes,
        basis,
        contigs,
        contig_summary,
        clustering,
    })
}

fn log_summary(binning: &Binning) {
    let contigs = &binning.contig_summary;
    let merges = &binning.clustering.summary;
    info!(
        "Contigs: {} with hits, {} dropped, {} without coverage, {} without a sequence, {} coverage rows skipped",
        contigs.num_with_hits,
        contigs.num_dropped,
        contigs.num_missing_coverage,
        contigs.num_missing_length,
        contigs.num_unknown_coverage_rows
    );
    info!(
        "Merges: {} made, {} already together, {} rejected for role overlap, {} rejected for coverage ratio, {} skipped for unknown contigs",
        merges.num_merged,
        merges.num_same_cluster,
        merges.num_role_overlap_rejections,
        merges.num_coverage_rejections,
        merges.num_unknown_contig
    );
    info!("Found {} bins", binning.clustering.bins.len());
    let basis_genomes = binning.basis_genomes();
    for (i, bin) in binning.clustering.bins.iter().enumerate() {
        info!("Bin {}: {}", i + 1, bin_summary(bin, &basis_genomes));
    }
}

pub fn run_bin_subcommand(
    matches: &clap::ArgMatches,
    program_basename: &str,
    program_version: &str,
) -> Result<()> {
    let m = matches.subcommand_matches("bin").unwrap();
    bird_tool_utils::clap_utils::set_log_level(m, true, program_basename, program_version);

    let num_threads = *m.get_one::<u16>("threads").unwrap();
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads as usize)
        .build_global()
        .expect("Programming error: rayon initialised multiple times");

    let params = BinningParameters::from_matches(m)?;
    let binning = run_binning(&params)?;

    let basis_genomes = binning.basis_genomes();
    match m.get_one::<String>("output-bins") {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to open bin output file {}", path))?;
            let mut writer = std::io::BufWriter::new(file);
            write_bins(
                &mut writer,
                &binning.clustering.bins,
                &binning.contigs,
                &basis_genomes,
            )?;
            info!("Wrote bins to {}", path);
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            write_bins(
                &mut writer,
                &binning.clustering.bins,
                &binning.contigs,
                &basis_genomes,
            )?;
            writer.flush()?;
        }
    }
    if let Some(path) = m.get_one::<String>("output-merge-log") {
        write_merge_log(path, &binning.clustering.merge_log)?;
    }
    log_summary(&binning);
    Ok(())
}

lazy_static! {
    static ref BIN_HELP: String = format!(
        "
                            {}
              {}

{}

  binrep bin --reference-genomes genomes.tsv --blast-directory blast/
    --coverage coverage.tsv --contig-fasta contigs.fna --roles roles.tsv
    --output-bins bins.txt --output-merge-log merges.tsv

{}

  binrep bin-validate --merge-log merges.tsv
",
        ansi_term::Colour::Green.paint("binrep bin"),
        ansi_term::Colour::Green.paint("Bin contigs by similarity of their reference genome hits"),
        ansi_term::Colour::Purple.paint(
            "Example: Bin contigs using BLAST output against each reference genome"
        ),
        ansi_term::Colour::Purple.paint(
            "Example: Check that every merge respected the coverage and role constraints"
        ),
    );
}

pub fn add_bin_subcommand(app: clap::Command) -> clap::Command {
    let bin_subcommand = bird_tool_utils::clap_utils::add_clap_verbosity_flags(
        Command::new("bin")
            .about("Bin contigs by their hits against reference genomes")
            .after_help(BIN_HELP.as_str())
            .arg(
                Arg::new("reference-genomes")
                    .long("reference-genomes")
                    .required(true)
                    .help("Reference genome ID and name, tab separated, one per line"),
            )
            .arg(
                Arg::new("blast-directory")
                    .long("blast-directory")
                    .required(true)
                    .help("Directory of BLAST tabular output, one file per reference genome named <genome ID>.<blast type>"),
            )
            .arg(
                Arg::new("blast-type")
                    .long("blast-type")
                    .help("Extension of the BLAST output files")
                    .default_value(DEFAULT_BLAST_TYPE),
            )
            .arg(
                Arg::new("coverage")
                    .long("coverage")
                    .required(true)
                    .help("Tab separated contig coverages with a header row, one column per sample"),
            )
            .arg(
                Arg::new("contig-fasta")
                    .long("contig-fasta")
                    .help("Contig sequences, used for contig lengths"),
            )
            .arg(
                Arg::new("roles")
                    .long("roles")
                    .help("Universal roles found on each contig, as contig ID and role, tab separated"),
            )
            .arg(
                Arg::new("scoring-mode")
                    .long("scoring-mode")
                    .value_parser(["vector", "signal", "signal-average"])
                    .default_value(DEFAULT_SCORING_MODE)
                    .help("How hits against a reference genome are scored: 'vector' for best percent identity, 'signal' for summed identity x length, 'signal-average' for its mean"),
            )
            .arg(
                Arg::new("similarity")
                    .long("similarity")
                    .value_parser(["dot", "dist", "best", "bin"])
                    .default_value(DEFAULT_SIMILARITY_METHOD)
                    .help("How contig vectors are compared"),
            )
            .arg(
                Arg::new("dist-tolerance")
                    .long("dist-tolerance")
                    .value_parser(value_parser!(f64))
                    .default_value(DEFAULT_DIST_TOLERANCE)
                    .help("Scores within this of each other count as matching for --similarity dist"),
            )
            .arg(
                Arg::new("normalize")
                    .long("normalize")
                    .action(ArgAction::SetTrue)
                    .help("Scale each contig vector to unit length before comparison"),
            )
            .arg(
                Arg::new("max-pscore")
                    .long("max-pscore")
                    .value_parser(value_parser!(f64))
                    .default_value(DEFAULT_MAX_PSCORE)
                    .help("Ignore hits with a greater e-value"),
            )
            .arg(
                Arg::new("min-alignment-length")
                    .long("min-alignment-length")
                    .value_parser(value_parser!(u32))
                    .default_value(DEFAULT_MIN_ALIGNMENT_LENGTH)
                    .help("Ignore hits with shorter alignments"),
            )
            .arg(
                Arg::new("max-total-score")
                    .long("max-total-score")
                    .value_parser(value_parser!(f64))
                    .help("Drop contigs whose total score is greater than this"),
            )
            .arg(
                Arg::new("basis")
                    .long("basis")
                    .value_parser(["normal", "hot-group"])
                    .default_value(DEFAULT_BASIS_METHOD)
                    .help("Reference genomes used as vector coordinates: 'normal' for all, 'hot-group' for those which are the best hit of some contig"),
            )
            .arg(
                Arg::new("hot-group-size")
                    .long("hot-group-size")
                    .value_parser(value_parser!(usize))
                    .help("Keep at most this many genomes in a hot-group basis"),
            )
            .arg(
                Arg::new("max-basis")
                    .long("max-basis")
                    .value_parser(value_parser!(usize))
                    .default_value(DEFAULT_MAX_BASIS)
                    .help("Use at most this many basis genomes, 0 for no limit"),
            )
            .arg(
                Arg::new("min-sim")
                    .long("min-sim")
                    .value_parser(value_parser!(f64))
                    .default_value(DEFAULT_MIN_SIMILARITY)
                    .help("Only contig pairs more similar than this are candidates for merging"),
            )
            .arg(
                Arg::new("coverage-ratio")
                    .long("coverage-ratio")
                    .value_parser(value_parser!(f64))
                    .default_value(DEFAULT_COVERAGE_RATIO)
                    .help("Do not merge bins whose coverages differ by more than this factor"),
            )
            .arg(
                Arg::new("role-overlap")
                    .long("role-overlap")
                    .value_parser(value_parser!(usize))
                    .default_value(DEFAULT_ROLE_OVERLAP)
                    .help("Do not merge bins sharing more than this many universal roles"),
            )
            .arg(
                Arg::new("similarity-cache")
                    .long("similarity-cache")
                    .help("Reuse contig similarities from this file if computed with the same parameters, otherwise compute and save them there"),
            )
            .arg(
                Arg::new("output-bins")
                    .long("output-bins")
                    .help("Write bins here rather than to STDOUT"),
            )
            .arg(
                Arg::new("output-merge-log")
                    .long("output-merge-log")
                    .help("Write every merge decision here, for use with bin-validate"),
            )
            .arg(
                Arg::new("threads")
                    .short('t')
                    .long("threads")
                    .help("Number of CPU threads to use")
                    .value_parser(value_parser!(u16).range(1..))
                    .default_value("1"),
            ),
    );

    app.subcommand(bin_subcommand)
}

pub fn add_bin_validate_subcommand(app: clap::Command) -> clap::Command {
    app.subcommand(bird_tool_utils::clap_utils::add_clap_verbosity_flags(
        Command::new("bin-validate")
            .about("Verify the merges made by 'bin'")
            .after_help(
                "Each merge is checked against the limits using the role overlap and coverages written \
                 in the merge log. Give the inputs of the 'bin' run with --coverage, --contig-fasta and \
                 --roles to also check those values against bins rebuilt from the log.",
            )
            .arg(
                Arg::new("merge-log")
                    .long("merge-log")
                    .required(true)
                    .help("Output of 'bin --output-merge-log'"),
            )
            .arg(
                Arg::new("coverage-ratio")
                    .long("coverage-ratio")
                    .value_parser(value_parser!(f64))
                    .default_value(DEFAULT_COVERAGE_RATIO)
                    .help("Coverage ratio limit to validate against"),
            )
            .arg(
                Arg::new("role-overlap")
                    .long("role-overlap")
                    .value_parser(value_parser!(usize))
                    .default_value(DEFAULT_ROLE_OVERLAP)
                    .help("Role overlap limit to validate against"),
            )
            .arg(
                Arg::new("coverage")
                    .long("coverage")
                    .help("Coverage file given to 'bin', to recompute bin coverages"),
            )
            .arg(
                Arg::new("contig-fasta")
                    .long("contig-fasta")
                    .help("Contig sequences given to 'bin', used to weight bin coverages by length"),
            )
            .arg(
                Arg::new("roles")
                    .long("roles")
                    .help("Role file given to 'bin', to recompute role overlaps"),
            ),
    ))
}
