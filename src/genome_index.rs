use std;
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::kmer_signatures::SignatureTable;

pub const GENOME_INDEX_FILE: &str = "genomes.index";
pub const GENOME_NAMES_FILE: &str = "genome.names";
pub const SIMILARITIES_FILE: &str = "similarities";
pub const KMER_LENGTH_FILE: &str = "K";
pub const SIGNATURES_FILE: &str = "signatures";

/// A genome sharing k-mers with another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub count: u32,
    pub index: usize,
}

/// Precomputed k-mer similarities between reference genomes, addressed by a
/// dense index. Read-only once loaded.
#[derive(Debug)]
pub struct GenomeIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
    names: Vec<Option<String>>,
    /// Per genome, sorted by descending count then ascending index.
    neighbors: Vec<Vec<Neighbor>>,
    kmer_length: usize,
    signatures: Option<SignatureTable>,
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open genome index file {}", path.display()))?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(file))
}

fn parse_field<T: std::str::FromStr>(record: &csv::StringRecord, i: usize, path: &Path) -> Result<T> {
    record[i].trim().parse::<T>().map_err(|_| {
        anyhow::anyhow!(
            "Failed to parse field {} '{}' of line {:?} in {}",
            i + 1,
            &record[i],
            record,
            path.display()
        )
    })
}

impl GenomeIndex {
    /// Load an index directory. The genome index, names, similarities and K
    /// files are required, the signatures file is optional.
    pub fn load(directory: &Path) -> Result<GenomeIndex> {
        info!("Loading genome index from {} ..", directory.display());
        let ids = read_genome_ids(&directory.join(GENOME_INDEX_FILE))?;
        let positions: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let names = read_genome_names(&directory.join(GENOME_NAMES_FILE), &positions)?;
        let neighbors = read_similarities(&directory.join(SIMILARITIES_FILE), ids.len())?;
        let kmer_length = read_kmer_length(&directory.join(KMER_LENGTH_FILE))?;

        let signatures_path = directory.join(SIGNATURES_FILE);
        let signatures = if signatures_path.exists() {
            Some(read_signatures(&signatures_path, &positions)?)
        } else {
            debug!("No signature table found at {}", signatures_path.display());
            None
        };

        info!(
            "Loaded {} genomes with k-mer length {}",
            ids.len(),
            kmer_length
        );
        Ok(GenomeIndex {
            ids,
            positions,
            names,
            neighbors,
            kmer_length,
            signatures,
        })
    }

    /// Build an index directly. Each neighbour list is given as (count,
    /// index) pairs in any order.
    pub fn from_parts(
        ids: Vec<String>,
        names: Vec<Option<String>>,
        neighbors: Vec<Vec<(u32, usize)>>,
        kmer_length: usize,
        signatures: Option<SignatureTable>,
    ) -> GenomeIndex {
        let positions = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        GenomeIndex {
            ids,
            positions,
            names,
            neighbors: neighbors
                .into_iter()
                .map(|list| {
                    sorted_neighbors(
                        list.into_iter()
                            .map(|(count, index)| Neighbor { count, index })
                            .collect(),
                    )
                })
                .collect(),
            kmer_length,
            signatures,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, genome_id: &str) -> Option<usize> {
        self.positions.get(genome_id).copied()
    }

    pub fn id_of(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(|s| s.as_str())
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).and_then(|n| n.as_deref())
    }

    pub fn neighbors(&self, index: usize) -> &[Neighbor] {
        match self.neighbors.get(index) {
            Some(n) => n,
            None => &[],
        }
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    pub fn signatures(&self) -> Option<&SignatureTable> {
        self.signatures.as_ref()
    }
}

fn sorted_neighbors(mut list: Vec<Neighbor>) -> Vec<Neighbor> {
    list.sort_by(|a, b| b.count.cmp(&a.count).then(a.index.cmp(&b.index)));
    list
}

fn read_genome_ids(path: &Path) -> Result<Vec<String>> {
    let mut slots: Vec<Option<String>> = vec![];
    let mut seen: HashMap<String, usize> = HashMap::new();
    for record_res in tsv_reader(path)?.records() {
        let record = record_res.with_context(|| format!("Failed to parse {}", path.display()))?;
        if record.len() != 2 {
            bail!(
                "Unexpectedly didn't find exactly 2 fields in {}: {:?}",
                path.display(),
                record
            );
        }
        let id = record[0].to_string();
        let index: usize = parse_field(&record, 1, path)?;
        if let Some(previous) = seen.insert(id.clone(), index) {
            bail!(
                "Genome {} is given indices {} and {} in {}",
                id,
                previous,
                index,
                path.display()
            );
        }
        if index >= slots.len() {
            slots.resize(index + 1, None);
        }
        if let Some(other) = &slots[index] {
            bail!(
                "Index {} is given to both {} and {} in {}",
                index,
                other,
                id,
                path.display()
            );
        }
        slots[index] = Some(id);
    }

    let mut ids = Vec::with_capacity(slots.len());
    for (i, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(id) => ids.push(id),
            None => bail!("No genome is given index {} in {}", i, path.display()),
        }
    }
    debug!("Read {} genome ids from {}", ids.len(), path.display());
    Ok(ids)
}

fn read_genome_names(
    path: &Path,
    positions: &HashMap<String, usize>,
) -> Result<Vec<Option<String>>> {
    let mut names = vec![None; positions.len()];
    let mut num_unknown = 0;
    for record_res in tsv_reader(path)?.records() {
        let record = record_res.with_context(|| format!("Failed to parse {}", path.display()))?;
        if record.len() != 2 {
            bail!(
                "Unexpectedly didn't find exactly 2 fields in {}: {:?}",
                path.display(),
                record
            );
        }
        match positions.get(&record[0]) {
            Some(i) => names[*i] = Some(record[1].to_string()),
            None => num_unknown += 1,
        }
    }
    if num_unknown > 0 {
        warn!(
            "Ignored {} names in {} for genomes not in the index",
            num_unknown,
            path.display()
        );
    }
    Ok(names)
}

fn read_similarities(path: &Path, num_genomes: usize) -> Result<Vec<Vec<Neighbor>>> {
    let mut neighbors: Vec<Vec<Neighbor>> = vec![vec![]; num_genomes];
    let mut num_pairs = 0;
    for record_res in tsv_reader(path)?.records() {
        let record = record_res.with_context(|| format!("Failed to parse {}", path.display()))?;
        if record.len() != 3 {
            bail!(
                "Unexpectedly didn't find exactly 3 fields in {}: {:?}",
                path.display(),
                record
            );
        }
        let index: usize = parse_field(&record, 0, path)?;
        let count: u32 = parse_field(&record, 1, path)?;
        let neighbor: usize = parse_field(&record, 2, path)?;
        if index >= num_genomes || neighbor >= num_genomes {
            bail!(
                "Similarity {:?} in {} refers to a genome index outside the {} genomes",
                record,
                path.display(),
                num_genomes
            );
        }
        if index == neighbor {
            continue;
        }
        neighbors[index].push(Neighbor {
            count,
            index: neighbor,
        });
        num_pairs += 1;
    }
    debug!("Read {} similarities from {}", num_pairs, path.display());
    Ok(neighbors.into_iter().map(sorted_neighbors).collect())
}

fn read_kmer_length(path: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read k-mer length file {}", path.display()))?;
    let kmer_length: usize = contents.trim().parse().with_context(|| {
        format!(
            "Failed to parse k-mer length '{}' in {}",
            contents.trim(),
            path.display()
        )
    })?;
    if kmer_length == 0 {
        bail!("K-mer length in {} must be positive", path.display());
    }
    Ok(kmer_length)
}

fn read_signatures(path: &Path, positions: &HashMap<String, usize>) -> Result<SignatureTable> {
    let mut table = SignatureTable::new(positions.len());
    for record_res in tsv_reader(path)?.records() {
        let record = record_res.with_context(|| format!("Failed to parse {}", path.display()))?;
        if record.len() != 2 {
            bail!(
                "Unexpectedly didn't find exactly 2 fields in {}: {:?}",
                path.display(),
                record
            );
        }
        match positions.get(&record[1]) {
            Some(genome) => {
                table.add(record[0].as_bytes(), *genome);
            }
            None => bail!(
                "Signature file {} refers to genome {} which is not in the index",
                path.display(),
                &record[1]
            ),
        }
    }
    info!(
        "Read {} signature k-mers from {}",
        table.num_kmers(),
        path.display()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_load() {
        init();
        let index = GenomeIndex::load(Path::new("tests/data/index")).unwrap();
        assert_eq!(5, index.len());
        assert_eq!(Some(2), index.index_of("562.77"));
        assert_eq!(Some("1280.100"), index.id_of(1));
        assert_eq!(None, index.id_of(5));
        assert_eq!(Some("Pseudomonas aeruginosa"), index.name_of(4));
        assert_eq!(5, index.kmer_length());
        assert_eq!(
            vec![
                Neighbor { count: 20, index: 0 },
                Neighbor { count: 15, index: 2 },
                Neighbor { count: 8, index: 3 },
            ],
            index.neighbors(4)
        );
        assert!(index.neighbors(10).is_empty());
        assert!(index.signatures().is_some());
    }

    #[test]
    fn test_from_parts_sorts_neighbors() {
        init();
        let index = GenomeIndex::from_parts(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![None, None, None],
            vec![vec![(5, 2), (10, 1)], vec![], vec![(5, 1), (5, 0)]],
            8,
            None,
        );
        assert_eq!(
            vec![Neighbor { count: 10, index: 1 }, Neighbor { count: 5, index: 2 }],
            index.neighbors(0)
        );
        assert_eq!(
            vec![Neighbor { count: 5, index: 0 }, Neighbor { count: 5, index: 1 }],
            index.neighbors(2)
        );
    }

    #[test]
    fn test_missing_required_file() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        std::fs::write(td.path().join(GENOME_INDEX_FILE), "a\t0\n").unwrap();
        std::fs::write(td.path().join(GENOME_NAMES_FILE), "a\tGenome A\n").unwrap();
        std::fs::write(td.path().join(SIMILARITIES_FILE), "").unwrap();
        assert!(GenomeIndex::load(td.path()).is_err());
        std::fs::write(td.path().join(KMER_LENGTH_FILE), "8\n").unwrap();
        let index = GenomeIndex::load(td.path()).unwrap();
        assert_eq!(1, index.len());
        assert!(index.signatures().is_none());
    }

    #[test]
    fn test_index_gap_is_fatal() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        std::fs::write(td.path().join(GENOME_INDEX_FILE), "a\t0\nb\t2\n").unwrap();
        assert!(read_genome_ids(&td.path().join(GENOME_INDEX_FILE)).is_err());
    }

    #[test]
    fn test_bad_similarity_is_fatal() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        let path = td.path().join(SIMILARITIES_FILE);
        std::fs::write(&path, "0\t10\t3\n").unwrap();
        assert!(read_similarities(&path, 2).is_err());
        std::fs::write(&path, "0\tmany\t1\n").unwrap();
        assert!(read_similarities(&path, 2).is_err());
    }
}
