use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};

use crate::blast_hits::ReferenceGenome;
use crate::cluster_engine::{Bin, MergeEvent};
use crate::contig::Contig;

/// Write the bin description stream. For each bin, each contig is written with
/// its reference genome hits, then the bin's universal roles and finally a
/// '//' separator.
pub fn write_bins<W: Write>(
    writer: &mut W,
    bins: &[Bin],
    contigs: &[Contig],
    basis_genomes: &[&ReferenceGenome],
) -> Result<()> {
    let contig_lookup: HashMap<&str, &Contig> =
        contigs.iter().map(|c| (c.name.as_str(), c)).collect();

    for bin in bins {
        for contig_name in bin.contigs.iter() {
            writeln!(writer, "{}", contig_name)?;
            if let Some(contig) = contig_lookup.get(contig_name.as_str()) {
                for coordinate in contig.raw_scores.ranked_coordinates() {
                    let genome = basis_genomes[coordinate];
                    writeln!(
                        writer,
                        "{:.2}\t{}\t{}",
                        contig.raw_scores.values()[coordinate],
                        genome.id,
                        genome.name
                    )?;
                }
            }
            writeln!(writer)?;
        }

        let mut roles: Vec<(&String, &u32)> = bin.roles.iter().collect();
        roles.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (role, count) in roles {
            writeln!(writer, "{}\t{}", count, role)?;
        }
        writeln!(writer, "//")?;
    }
    writer.flush()?;
    Ok(())
}

pub const MERGE_LOG_HEADER: [&str; 7] = [
    "score",
    "contig_a",
    "contig_b",
    "role_overlap",
    "coverage_a",
    "coverage_b",
    "outcome",
];

/// One line describing a bin and the reference genome its contigs hit best.
pub fn bin_summary(bin: &Bin, basis_genomes: &[&ReferenceGenome]) -> String {
    let best = match bin.best_genomes.first() {
        Some((coordinate, total)) => {
            let genome = basis_genomes[*coordinate];
            format!("best hit {} {} ({:.2})", genome.id, genome.name, total)
        }
        None => "no hits".to_string(),
    };
    format!(
        "{} contigs, {} bp, coverage {:.2}, {}",
        bin.contigs.len(),
        bin.length,
        bin.coverage,
        best
    )
}

/// Write every merge decision as a TSV with a header row.
pub fn write_merge_log(path: &str, merge_log: &[MergeEvent]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to open merge log {} for writing", path))?;
    writer.write_record(MERGE_LOG_HEADER.iter())?;
    for event in merge_log {
        writer.write_record(&[
            format!("{:?}", event.score),
            event.contig_a.clone(),
            event.contig_b.clone(),
            event.role_overlap.to_string(),
            format!("{:?}", event.coverage_a),
            format!("{:?}", event.coverage_b),
            event.outcome.name().to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Wrote {} merge decisions to {}", merge_log.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_engine::MergeOutcome;
    use crate::score_vector::ScoreVector;

    #[test]
    fn test_write_bins() {
        let genomes = vec![
            ReferenceGenome {
                id: "83333.1".to_string(),
                name: "Escherichia coli K-12".to_string(),
            },
            ReferenceGenome {
                id: "1280.100".to_string(),
                name: "Staphylococcus aureus".to_string(),
            },
        ];
        let v = ScoreVector::from_values(vec![90.0, 95.5]);
        let contigs = vec![Contig {
            name: "c1".to_string(),
            length: 10,
            coverage: 1.0,
            raw_scores: v.clone(),
            vector: v,
            roles: Default::default(),
        }];
        let mut roles = std::collections::BTreeMap::new();
        roles.insert("SSU ribosomal protein S8p".to_string(), 1);
        roles.insert("LSU ribosomal protein L2p".to_string(), 2);
        let bins = vec![Bin {
            contigs: vec!["c1".to_string()],
            roles,
            coverage: 1.0,
            length: 10,
            best_genomes: vec![(1, 95.5), (0, 90.0)],
        }];
        let mut out = vec![];
        write_bins(&mut out, &bins, &contigs, &genomes.iter().collect::<Vec<_>>()).unwrap();
        assert_eq!(
            "c1\n\
             95.50\t1280.100\tStaphylococcus aureus\n\
             90.00\t83333.1\tEscherichia coli K-12\n\
             \n\
             2\tLSU ribosomal protein L2p\n\
             1\tSSU ribosomal protein S8p\n\
             //\n",
            String::from_utf8(out).unwrap()
        );
    }

    #[test]
    fn test_bin_summary() {
        let genomes = vec![
            ReferenceGenome {
                id: "83333.1".to_string(),
                name: "Escherichia coli K-12".to_string(),
            },
            ReferenceGenome {
                id: "562.77".to_string(),
                name: "Escherichia coli O157:H7".to_string(),
            },
        ];
        let basis: Vec<&ReferenceGenome> = genomes.iter().collect();
        let mut bin = Bin {
            contigs: vec!["c1".to_string(), "c2".to_string()],
            roles: Default::default(),
            coverage: 11.2,
            length: 100,
            best_genomes: vec![(0, 189.0), (1, 181.0)],
        };
        assert_eq!(
            "2 contigs, 100 bp, coverage 11.20, best hit 83333.1 Escherichia coli K-12 (189.00)",
            bin_summary(&bin, &basis)
        );
        bin.best_genomes = vec![];
        assert_eq!("2 contigs, 100 bp, coverage 11.20, no hits", bin_summary(&bin, &basis));
    }

    #[test]
    fn test_write_merge_log() {
        let td = tempfile::TempDir::new().unwrap();
        let path = td.path().join("merges.tsv");
        write_merge_log(
            path.to_str().unwrap(),
            &[MergeEvent {
                score: 17120.0,
                contig_a: "c1".to_string(),
                contig_b: "c2".to_string(),
                role_overlap: 0,
                coverage_a: 10.0,
                coverage_b: 12.0,
                outcome: MergeOutcome::Merged,
            }],
        )
        .unwrap();
        assert_eq!(
            "score\tcontig_a\tcontig_b\trole_overlap\tcoverage_a\tcoverage_b\toutcome\n\
             17120.0\tc1\tc2\t0\t10.0\t12.0\tmerged\n",
            std::fs::read_to_string(path).unwrap()
        );
    }
}
