use std::collections::BTreeMap;

use anyhow::{Context, Result};
use needletail::parse_fastx_file;

/// Sequence name, i.e. the header up to the first whitespace.
pub fn record_name(id: &[u8]) -> String {
    let id = String::from_utf8_lossy(id);
    id.split_whitespace().next().unwrap_or("").to_string()
}

/// Lengths of each contig in a FASTA file, keyed by contig name.
pub fn read_contig_lengths(fasta_path: &str) -> Result<BTreeMap<String, u64>> {
    let mut lengths = BTreeMap::new();
    let mut reader = parse_fastx_file(fasta_path)
        .with_context(|| format!("Failed to open contig FASTA file {}", fasta_path))?;
    while let Some(record) = reader.next() {
        let seqrec =
            record.with_context(|| format!("Failed to parse contig FASTA file {}", fasta_path))?;
        let name = record_name(seqrec.id());
        let length = seqrec.seq().len() as u64;
        if lengths.insert(name.clone(), length).is_some() {
            warn!(
                "Contig {} found multiple times in {}, using the last",
                name, fasta_path
            );
        }
    }
    debug!("Read lengths of {} contigs from {}", lengths.len(), fasta_path);
    Ok(lengths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_hello_world() {
        init();

        let lengths = read_contig_lengths("tests/data/bins/contigs.fna").unwrap();
        assert_eq!(Some(&40), lengths.get("c1"));
        assert_eq!(Some(&60), lengths.get("c2"));
        assert_eq!(6, lengths.len());
    }

    #[test]
    fn test_record_name() {
        assert_eq!("c1", record_name(b"c1 length=40 coverage=10"));
    }
}
