use std;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::genome_index::GenomeIndex;
use crate::kmer_signatures::find_signatures;
use crate::representative_set::RepresentativeSetSolver;

const SUPPORTED_REQUESTS: &[&str] = &[
    "id_to_index GENOME_ID",
    "index_to_id INDEX",
    "closest_N_genomes INDEX N",
    "rep_set MAXSIM [GENOME_ID ...] [save=FILE]",
    "n_reps N [GENOME_ID ...] [save=FILE]",
    "thin_set MAXSIM INDEX,INDEX,...",
    "find_sigs FASTA",
    "name GENOME_ID",
];

/// One line of the server protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    IdToIndex(String),
    IndexToId(String),
    ClosestGenomes {
        index: usize,
        n: usize,
    },
    RepSet {
        max_sim: i64,
        keep: Vec<String>,
        save: Option<PathBuf>,
    },
    NReps {
        target_size: usize,
        keep: Vec<String>,
        save: Option<PathBuf>,
    },
    ThinSet {
        max_sim: i64,
        indices: Vec<String>,
    },
    FindSigs(PathBuf),
    Name(String),
}

fn keep_and_save(args: &[&str]) -> (Vec<String>, Option<PathBuf>) {
    let mut keep = vec![];
    let mut save = None;
    for arg in args {
        if let Some(file) = arg.strip_prefix("save=") {
            save = Some(PathBuf::from(file));
        } else {
            keep.push(arg.to_string());
        }
    }
    (keep, save)
}

impl Request {
    /// Parse a request line, returning None if it is not a well formed request.
    pub fn parse(line: &str) -> Option<Request> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (command, args) = words.split_first()?;
        match (*command, args.len()) {
            ("id_to_index", 1) => Some(Request::IdToIndex(args[0].to_string())),
            ("index_to_id", 1) => Some(Request::IndexToId(args[0].to_string())),
            ("closest_N_genomes", 2) => Some(Request::ClosestGenomes {
                index: args[0].parse().ok()?,
                n: args[1].parse().ok()?,
            }),
            ("rep_set", n) if n >= 1 => {
                let (keep, save) = keep_and_save(&args[1..]);
                Some(Request::RepSet {
                    max_sim: args[0].parse().ok()?,
                    keep,
                    save,
                })
            }
            ("n_reps", n) if n >= 1 => {
                let (keep, save) = keep_and_save(&args[1..]);
                Some(Request::NReps {
                    target_size: args[0].parse().ok()?,
                    keep,
                    save,
                })
            }
            ("thin_set", 2) => Some(Request::ThinSet {
                max_sim: args[0].parse().ok()?,
                indices: args[1]
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect(),
            }),
            ("find_sigs", 1) => Some(Request::FindSigs(PathBuf::from(args[0]))),
            ("name", 1) => Some(Request::Name(args[0].to_string())),
            _ => None,
        }
    }
}

/// Answers requests against a loaded genome index.
pub struct RequestDispatcher<'a> {
    index: &'a GenomeIndex,
    solver: RepresentativeSetSolver<'a>,
}

impl<'a> RequestDispatcher<'a> {
    pub fn new(index: &'a GenomeIndex) -> RequestDispatcher<'a> {
        RequestDispatcher {
            index,
            solver: RepresentativeSetSolver::new(index),
        }
    }

    /// Response lines for one request line, not including the terminating
    /// blank line.
    pub fn respond(&self, line: &str) -> Vec<String> {
        match Request::parse(line) {
            Some(request) => self.dispatch(&request),
            None => {
                warn!("Unrecognised request: {}", line);
                let mut response = vec![
                    format!("unrecognised request: {}", line.trim()),
                    "supported requests:".to_string(),
                ];
                response.extend(SUPPORTED_REQUESTS.iter().map(|r| format!("  {}", r)));
                response
            }
        }
    }

    pub fn dispatch(&self, request: &Request) -> Vec<String> {
        debug!("Dispatching {:?}", request);
        match request {
            Request::IdToIndex(id) => vec![match self.index.index_of(id) {
                Some(i) => format!("{}\t{}", id, i),
                None => format!("{}\tnot found", id),
            }],
            Request::IndexToId(index) => {
                let id = index.parse::<usize>().ok().and_then(|i| self.index.id_of(i));
                vec![match id {
                    Some(id) => format!("{}\t{}", index, id),
                    None => format!("{}\tnot found", index),
                }]
            }
            Request::ClosestGenomes { index, n } => {
                if *index >= self.index.len() {
                    return vec!["failed to get closest".to_string()];
                }
                self.index
                    .neighbors(*index)
                    .iter()
                    .take(*n)
                    .map(|neighbor| {
                        format!(
                            "{}\t{}\t{}\t{}",
                            neighbor.count,
                            neighbor.index,
                            self.id_of(neighbor.index),
                            self.name_of(neighbor.index)
                        )
                    })
                    .collect()
            }
            Request::RepSet {
                max_sim,
                keep,
                save,
            } => {
                let (mut response, keep_indices) = self.resolve_keep(keep);
                let representatives = self.solver.rep_set_for_threshold(*max_sim, &keep_indices);
                response.extend(self.representative_lines(&representatives, save));
                response
            }
            Request::NReps {
                target_size,
                keep,
                save,
            } => {
                let (mut response, keep_indices) = self.resolve_keep(keep);
                let (threshold, representatives) = self
                    .solver
                    .rep_set_for_target_size(*target_size, &keep_indices);
                response.push(format!("threshold\t{}", threshold));
                response.extend(self.representative_lines(&representatives, save));
                response
            }
            Request::ThinSet { max_sim, indices } => {
                let mut response = vec![];
                let mut candidates = vec![];
                for index in indices {
                    match index.parse::<usize>() {
                        Ok(i) if i < self.index.len() => candidates.push(i),
                        _ => response.push(format!("{}\tnot found", index)),
                    }
                }
                response.extend(
                    self.solver
                        .thin(*max_sim, &candidates)
                        .into_iter()
                        .map(|i| format!("{}\t{}", i, self.id_of(i))),
                );
                response
            }
            Request::FindSigs(fasta) => {
                let table = match self.index.signatures() {
                    Some(t) => t,
                    None => return vec!["no signature table loaded".to_string()],
                };
                match find_signatures(table, self.index.kmer_length(), fasta) {
                    Ok(matches) => matches
                        .into_iter()
                        .map(|m| {
                            format!(
                                "{:.2}\t{}\t{}\t{}",
                                m.percent,
                                m.hits,
                                self.id_of(m.genome),
                                self.name_of(m.genome)
                            )
                        })
                        .collect(),
                    Err(e) => {
                        warn!("find_sigs failed: {:#}", e);
                        vec![format!("failed to read {}", fasta.display())]
                    }
                }
            }
            Request::Name(id) => {
                let name = self.index.index_of(id).and_then(|i| self.index.name_of(i));
                vec![match name {
                    Some(name) => format!("{}\t{}", id, name),
                    None => format!("{}\tnot found", id),
                }]
            }
        }
    }

    fn id_of(&self, index: usize) -> &str {
        self.index.id_of(index).unwrap_or("")
    }

    fn name_of(&self, index: usize) -> &str {
        self.index.name_of(index).unwrap_or("")
    }

    /// Indices of the genomes to keep, and 'not found' lines for unknown ones.
    fn resolve_keep(&self, keep: &[String]) -> (Vec<String>, Vec<usize>) {
        let mut response = vec![];
        let mut indices = vec![];
        for id in keep {
            match self.index.index_of(id) {
                Some(i) => indices.push(i),
                None => response.push(format!("{}\tnot found", id)),
            }
        }
        (response, indices)
    }

    fn representative_lines(&self, representatives: &[usize], save: &Option<PathBuf>) -> Vec<String> {
        let mut response: Vec<String> = representatives
            .iter()
            .map(|i| format!("{}\t{}\t{}", i, self.id_of(*i), self.name_of(*i)))
            .collect();
        if let Some(path) = save {
            if let Err(e) = self.save_ids(representatives, path) {
                warn!("{:#}", e);
                response.push(format!("failed to save {}", path.display()));
            }
        }
        response
    }

    fn save_ids(&self, representatives: &[usize], path: &PathBuf) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);
        for i in representatives {
            writeln!(writer, "{}", self.id_of(*i))?;
        }
        writer.flush()?;
        debug!(
            "Saved {} representatives to {}",
            representatives.len(),
            path.display()
        );
        Ok(())
    }

    /// Answer requests one line at a time until the input ends. Each response
    /// ends with a blank line and is flushed. Returns the number of requests.
    /// Lines which are not valid UTF-8 are answered like any other
    /// unrecognised request.
    pub fn serve<R: BufRead, W: Write>(&self, mut input: R, output: &mut W) -> Result<usize> {
        let mut num_requests = 0;
        let mut buffer = vec![];
        loop {
            buffer.clear();
            if input
                .read_until(b'\n', &mut buffer)
                .context("Failed to read request")?
                == 0
            {
                break;
            }
            let line = String::from_utf8_lossy(&buffer);
            let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
            if line.trim().is_empty() {
                continue;
            }
            for response_line in self.respond(line) {
                writeln!(output, "{}", response_line)?;
            }
            writeln!(output)?;
            output.flush().context("Failed to write response")?;
            num_requests += 1;
        }
        Ok(num_requests)
    }
}
