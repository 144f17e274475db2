use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use needletail::{parse_fastx_file, Sequence};

pub const FIND_SIGS_MAX_REPORTED: usize = 10;

const CODON_BASES: &[u8; 4] = b"TCAG";
const STANDARD_CODE: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

lazy_static! {
    static ref CODON_TABLE: HashMap<[u8; 3], u8> = {
        let mut table = HashMap::with_capacity(64);
        let mut i = 0;
        for first in CODON_BASES.iter() {
            for second in CODON_BASES.iter() {
                for third in CODON_BASES.iter() {
                    table.insert([*first, *second, *third], STANDARD_CODE[i]);
                    i += 1;
                }
            }
        }
        table
    };
}

/// Amino acid of a codon under the standard genetic code. Codons with
/// ambiguous bases translate to 'X'.
pub fn translate_codon(codon: &[u8]) -> u8 {
    if codon.len() != 3 {
        return b'X';
    }
    let key = [
        codon[0].to_ascii_uppercase(),
        codon[1].to_ascii_uppercase(),
        codon[2].to_ascii_uppercase(),
    ];
    *CODON_TABLE.get(&key).unwrap_or(&b'X')
}

pub fn translate(seq: &[u8]) -> Vec<u8> {
    seq.chunks_exact(3).map(translate_codon).collect()
}

/// Translations of the three forward and three reverse frames. The sequence
/// must already be normalised.
pub fn translate_frames(seq: &[u8], reverse_complement: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::with_capacity(6);
    for strand in [seq, reverse_complement].iter() {
        for offset in 0..3 {
            if strand.len() > offset {
                frames.push(translate(&strand[offset..]));
            }
        }
    }
    frames
}

/// Amino acid k-mers which identify genomes.
#[derive(Debug, Default)]
pub struct SignatureTable {
    kmers: HashMap<Vec<u8>, Vec<usize>>,
    totals: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMatch {
    pub genome: usize,
    pub hits: usize,
    pub percent: f64,
}

impl SignatureTable {
    pub fn new(num_genomes: usize) -> SignatureTable {
        SignatureTable {
            kmers: HashMap::new(),
            totals: vec![0; num_genomes],
        }
    }

    /// Record a k-mer as a signature of a genome. Returns false if it was
    /// already recorded.
    pub fn add(&mut self, kmer: &[u8], genome: usize) -> bool {
        if genome >= self.totals.len() {
            self.totals.resize(genome + 1, 0);
        }
        let genomes = self.kmers.entry(kmer.to_ascii_uppercase()).or_insert_with(Vec::new);
        if genomes.contains(&genome) {
            return false;
        }
        genomes.push(genome);
        self.totals[genome] += 1;
        true
    }

    pub fn num_kmers(&self) -> usize {
        self.kmers.len()
    }

    pub fn total_for(&self, genome: usize) -> usize {
        self.totals.get(genome).copied().unwrap_or(0)
    }

    /// Count the distinct signature k-mers of each genome found in the
    /// translated peptides, best genomes first.
    pub fn matches(&self, peptides: &[Vec<u8>], kmer_length: usize) -> Vec<SignatureMatch> {
        let mut found: HashSet<&[u8]> = HashSet::new();
        for peptide in peptides {
            if peptide.len() < kmer_length || kmer_length == 0 {
                continue;
            }
            for kmer in peptide.windows(kmer_length) {
                if kmer.iter().any(|aa| *aa == b'*' || *aa == b'X') {
                    continue;
                }
                if self.kmers.contains_key(kmer) {
                    found.insert(kmer);
                }
            }
        }

        let mut hits = vec![0usize; self.totals.len()];
        for kmer in found {
            for genome in self.kmers[kmer].iter() {
                hits[*genome] += 1;
            }
        }

        let mut matches: Vec<SignatureMatch> = hits
            .into_iter()
            .enumerate()
            .filter(|(_, h)| *h > 0)
            .map(|(genome, h)| SignatureMatch {
                genome,
                hits: h,
                percent: 100.0 * h as f64 / self.totals[genome] as f64,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.hits
                .cmp(&a.hits)
                .then(
                    b.percent
                        .partial_cmp(&a.percent)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.genome.cmp(&b.genome))
        });
        matches
    }
}

/// Translate every record of a DNA FASTA file in all six frames.
pub fn read_translated_fasta(path: &Path) -> Result<Vec<Vec<u8>>> {
    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("Failed to open FASTA file {}", path.display()))?;
    let mut peptides = vec![];
    let mut num_records = 0;
    while let Some(record) = reader.next() {
        let seqrec = record.with_context(|| format!("Failed to parse FASTA file {}", path.display()))?;
        let norm_seq = seqrec.normalize(false);
        let rc = norm_seq.reverse_complement();
        peptides.extend(translate_frames(&norm_seq, &rc));
        num_records += 1;
    }
    debug!(
        "Translated {} records from {} into {} peptides",
        num_records,
        path.display(),
        peptides.len()
    );
    Ok(peptides)
}

/// Genomes whose signatures are found in a FASTA file, at most
/// FIND_SIGS_MAX_REPORTED.
pub fn find_signatures(
    table: &SignatureTable,
    kmer_length: usize,
    fasta: &Path,
) -> Result<Vec<SignatureMatch>> {
    let peptides = read_translated_fasta(fasta)?;
    let mut matches = table.matches(&peptides, kmer_length);
    matches.truncate(FIND_SIGS_MAX_REPORTED);
    Ok(matches)
}
