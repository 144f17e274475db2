extern crate binrep;

extern crate clap;
use clap::*;

#[macro_use]
extern crate log;

extern crate bird_tool_utils;
use bird_tool_utils::clap_utils::*;

use binrep::cluster_engine::MergeConstraints;

static PROGRAM_NAME: &str = "binrep";

fn main() {
    let app = build_cli();
    let matches = app.clone().get_matches();
    set_log_level(&matches, false, PROGRAM_NAME, crate_version!());

    let result = match matches.subcommand_name() {
        Some("bin") => binrep::bin_argument_parsing::run_bin_subcommand(
            &matches,
            PROGRAM_NAME,
            crate_version!(),
        ),
        Some("bin-validate") => {
            let m = matches.subcommand_matches("bin-validate").unwrap();
            set_log_level(m, true, PROGRAM_NAME, crate_version!());

            let constraints = MergeConstraints {
                coverage_ratio_limit: *m.get_one::<f64>("coverage-ratio").unwrap(),
                role_overlap_limit: *m.get_one::<usize>("role-overlap").unwrap(),
            };
            binrep::merge_log_validation::ReplayAnnotations::from_files(
                m.get_one::<String>("coverage").map(|s| s.as_str()),
                m.get_one::<String>("contig-fasta").map(|s| s.as_str()),
                m.get_one::<String>("roles").map(|s| s.as_str()),
            )
            .and_then(|annotations| {
                binrep::merge_log_validation::validate_merge_log_file(
                    m.get_one::<String>("merge-log").unwrap(),
                    &constraints,
                    &annotations,
                )
            })
            .map(|report| {
                info!(
                    "All {} merges satisfy the coverage ratio and role overlap limits",
                    report.num_merges
                )
            })
        }
        Some("rep-server") => binrep::server_argument_parsing::run_rep_server_subcommand(
            &matches,
            PROGRAM_NAME,
            crate_version!(),
        ),
        _ => panic!("Programming error"),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn build_cli() -> Command {
    let mut app = add_clap_verbosity_flags(Command::new(PROGRAM_NAME))
        .version(crate_version!())
        .author(binrep::AUTHOR)
        .about("Contig binner and representative genome server")
        .arg_required_else_help(true);

    app = binrep::bin_argument_parsing::add_bin_subcommand(app);
    app = binrep::bin_argument_parsing::add_bin_validate_subcommand(app);
    app = binrep::server_argument_parsing::add_rep_server_subcommand(app);
    app
}
