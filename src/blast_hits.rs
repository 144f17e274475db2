use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

/// Number of whitespace separated columns in BLAST tabular output.
const NUM_BLAST_COLUMNS: usize = 12;

/// One record of BLAST tabular output, query is a feature of the reference
/// genome and subject is the contig.
#[derive(Debug, Clone, PartialEq)]
pub struct BlastHit {
    pub query: String,
    pub contig: String,
    pub percent_identity: f64,
    pub alignment_length: u32,
    pub begin: u32,
    pub end: u32,
    pub pscore: f64,
    pub bit_score: f64,
}

impl BlastHit {
    /// Percent identity weighted by alignment length.
    pub fn signal(&self) -> f64 {
        self.percent_identity * self.alignment_length as f64
    }

    pub fn parse_line(line: &str) -> Result<BlastHit> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < NUM_BLAST_COLUMNS {
            bail!(
                "Expected {} columns in BLAST record, found {}: '{}'",
                NUM_BLAST_COLUMNS,
                fields.len(),
                line
            );
        }
        Ok(BlastHit {
            query: fields[0].to_string(),
            contig: fields[1].to_string(),
            percent_identity: parse_field(fields[2], "percent identity", line)?,
            alignment_length: parse_field(fields[3], "alignment length", line)?,
            begin: parse_field(fields[8], "alignment begin", line)?,
            end: parse_field(fields[9], "alignment end", line)?,
            pscore: parse_field(fields[10], "p-score", line)?,
            bit_score: parse_field(fields[11], "bit score", line)?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, what: &str, line: &str) -> Result<T> {
    field
        .parse::<T>()
        .map_err(|_| anyhow!("Failed to parse {} '{}' in BLAST record '{}'", what, field, line))
}

/// Read all hits from one BLAST output file. Blank lines and '#' comment lines
/// are skipped.
pub fn read_blast_file<P: AsRef<Path>>(path: P) -> Result<Vec<BlastHit>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open BLAST output file {}", path.display()))?;
    let mut hits = vec![];
    for line_res in BufReader::new(file).lines() {
        let line = line_res
            .with_context(|| format!("Failed to read BLAST output file {}", path.display()))?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        hits.push(
            BlastHit::parse_line(&line)
                .with_context(|| format!("Malformed BLAST output file {}", path.display()))?,
        );
    }
    debug!("Read {} BLAST hits from {}", hits.len(), path.display());
    Ok(hits)
}

/// A reference genome, in the order given in the reference genome list.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGenome {
    pub id: String,
    pub name: String,
}

/// Read the 2 column genomeID/name list that defines the reference genome
/// order.
pub fn read_reference_genomes<P: AsRef<Path>>(path: P) -> Result<Vec<ReferenceGenome>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open reference genome list {}", path.display()))?;

    let mut genomes: Vec<ReferenceGenome> = vec![];
    let mut seen = std::collections::HashSet::new();
    for record_res in rdr.records() {
        let record = record_res
            .with_context(|| format!("Failed to parse reference genome list {}", path.display()))?;
        if record.is_empty() || record[0].is_empty() {
            continue;
        }
        let id = record[0].to_string();
        if !seen.insert(id.clone()) {
            bail!(
                "The reference genome {} was found multiple times in {}",
                id,
                path.display()
            );
        }
        let name = match record.get(1) {
            Some(n) => n.to_string(),
            None => id.clone(),
        };
        genomes.push(ReferenceGenome { id, name });
    }
    if genomes.is_empty() {
        bail!("No reference genomes found in {}", path.display());
    }
    debug!("Read {} reference genomes from {}", genomes.len(), path.display());
    Ok(genomes)
}

/// Path of the BLAST output for a reference genome, named <genome>.<blast type>
pub fn blast_file_path(blast_directory: &Path, genome_id: &str, blast_type: &str) -> std::path::PathBuf {
    blast_directory.join(format!("{}.{}", genome_id, blast_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_parse_line() {
        init();
        let hit = BlastHit::parse_line(
            "fig|83333.1.peg.7\tcontig_1\t95.50\t300\t13\t0\t1\t300\t1001\t1300\t1e-50\t512.3",
        )
        .unwrap();
        assert_eq!("contig_1", hit.contig);
        assert_eq!(95.5, hit.percent_identity);
        assert_eq!(300, hit.alignment_length);
        assert_eq!((1001, 1300), (hit.begin, hit.end));
        assert_eq!(1e-50, hit.pscore);
        assert_eq!(28650.0, hit.signal());
    }

    #[test]
    fn test_parse_line_too_few_columns() {
        init();
        assert!(BlastHit::parse_line("a b 95 300").is_err());
        assert!(BlastHit::parse_line("a b x 300 0 0 1 2 3 4 0 1").is_err());
    }

    #[test]
    fn test_read_blast_file() {
        init();
        let hits = read_blast_file("tests/data/bins/blast/83333.1.blastn").unwrap();
        assert_eq!(5, hits.len());
        assert_eq!("c1", hits[0].contig);
    }

    #[test]
    fn test_read_reference_genomes() {
        init();
        let genomes = read_reference_genomes("tests/data/bins/reference_genomes.tsv").unwrap();
        assert_eq!(
            vec!["83333.1", "1280.100", "562.77"],
            genomes.iter().map(|g| g.id.as_str()).collect::<Vec<_>>()
        );
        assert_eq!("Escherichia coli K-12", genomes[0].name);
    }
}
