use std;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// A pair of contigs and their similarity. The contig names are sorted on
/// creation so the pair is the same whichever way round it was compared.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityRecord {
    pub score: f64,
    pub contig_a: String,
    pub contig_b: String,
}

impl SimilarityRecord {
    pub fn new(score: f64, contig1: &str, contig2: &str) -> SimilarityRecord {
        if contig1 <= contig2 {
            SimilarityRecord {
                score,
                contig_a: contig1.to_string(),
                contig_b: contig2.to_string(),
            }
        } else {
            SimilarityRecord {
                score,
                contig_a: contig2.to_string(),
                contig_b: contig1.to_string(),
            }
        }
    }
}

/// Everything which affects which similarities are computed. Written as the
/// first line of the cache so stale caches are recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSignature {
    pub blast_type: String,
    pub scoring_type: String,
    pub basis_type: String,
    pub basis_limit: usize,
    pub min_similarity: f64,
}

impl std::fmt::Display for CacheSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}-lim{} {}",
            self.blast_type, self.scoring_type, self.basis_type, self.basis_limit, self.min_similarity
        )
    }
}

/// Read a similarity cache. Returns None if the cache does not exist or was
/// made with a different signature. Malformed entries are an error since the
/// whole clustering depends on them.
pub fn read_similarity_cache(
    path: &Path,
    signature: &CacheSignature,
) -> Result<Option<Vec<SimilarityRecord>>> {
    if !path.exists() {
        debug!("No similarity cache found at {}", path.display());
        return Ok(None);
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open similarity cache {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut first_line = String::new();
    reader
        .read_line(&mut first_line)
        .with_context(|| format!("Failed to read similarity cache {}", path.display()))?;
    let expected = signature.to_string();
    if first_line.trim_end_matches(|c: char| c == '\n' || c == '\r') != expected {
        info!(
            "Similarity cache {} has signature '{}', not '{}', so recomputing",
            path.display(),
            first_line.trim_end(),
            expected
        );
        return Ok(None);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = vec![];
    for record_res in rdr.records() {
        let record = record_res
            .with_context(|| format!("Failed to parse similarity cache {}", path.display()))?;
        if record.len() != 3 {
            bail!(
                "Unexpectedly didn't find exactly 3 fields in similarity cache {}: {:?}",
                path.display(),
                record
            );
        }
        let score: f64 = record[0].parse().with_context(|| {
            format!(
                "Failed to parse similarity score '{}' in cache {}",
                &record[0],
                path.display()
            )
        })?;
        records.push(SimilarityRecord {
            score,
            contig_a: record[1].to_string(),
            contig_b: record[2].to_string(),
        });
    }
    info!(
        "Read {} similarities from cache {}",
        records.len(),
        path.display()
    );
    Ok(Some(records))
}

/// Write the cache, replacing any existing one only once fully written.
pub fn write_similarity_cache(
    path: &Path,
    signature: &CacheSignature,
    records: &[SimilarityRecord],
) -> Result<()> {
    let directory = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let mut tf = tempfile::Builder::new()
        .prefix("binrep-similarities")
        .tempfile_in(&directory)
        .with_context(|| {
            format!(
                "Failed to open temporary file in {} for similarity cache",
                directory.display()
            )
        })?;
    {
        let mut writer = std::io::BufWriter::new(tf.as_file_mut());
        writeln!(writer, "{}", signature)?;
        for record in records {
            // Debug formatting of f64 round trips exactly
            writeln!(
                writer,
                "{:?}\t{}\t{}",
                record.score, record.contig_a, record.contig_b
            )?;
        }
        writer.flush()?;
    }
    tf.persist(path)
        .with_context(|| format!("Failed to write similarity cache {}", path.display()))?;
    debug!(
        "Wrote {} similarities to cache {}",
        records.len(),
        path.display()
    );
    Ok(())
}
