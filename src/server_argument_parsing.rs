use std;
use std::path::Path;

use anyhow::Result;
use clap::*;

use crate::genome_index::GenomeIndex;
use crate::request_dispatcher::RequestDispatcher;

pub fn add_rep_server_subcommand(app: clap::Command) -> clap::Command {
    app.subcommand(bird_tool_utils::clap_utils::add_clap_verbosity_flags(
        Command::new("rep-server")
            .about("Answer representative genome requests on STDIN, one per line")
            .after_help(format!(
                "{}\n\n  echo 'rep_set 100' | binrep rep-server --index-directory index/\n",
                ansi_term::Colour::Purple.paint("Example: Choose representatives sharing fewer than 100 k-mers")
            ))
            .arg(
                Arg::new("index-directory")
                    .long("index-directory")
                    .required(true)
                    .help("Directory containing genomes.index, genome.names, similarities, K and optionally signatures"),
            ),
    ))
}

pub fn run_rep_server_subcommand(
    matches: &clap::ArgMatches,
    program_basename: &str,
    program_version: &str,
) -> Result<()> {
    let m = matches.subcommand_matches("rep-server").unwrap();
    bird_tool_utils::clap_utils::set_log_level(m, true, program_basename, program_version);

    let index = GenomeIndex::load(Path::new(m.get_one::<String>("index-directory").unwrap()))?;
    let dispatcher = RequestDispatcher::new(&index);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    let num_requests = dispatcher.serve(stdin.lock(), &mut output)?;
    info!("Answered {} requests", num_requests);
    Ok(())
}
