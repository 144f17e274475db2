use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Result};

use crate::blast_hits::BlastHit;

/// How hits against a single reference genome are folded into that genome's
/// coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringMode {
    /// Best percent identity seen
    Vector,
    /// Sum of percent identity x alignment length
    Signal,
    /// Mean of percent identity x alignment length
    SignalAverage,
}

impl ScoringMode {
    pub fn from_name(name: &str) -> Result<ScoringMode> {
        match name {
            "vector" => Ok(ScoringMode::Vector),
            "signal" => Ok(ScoringMode::Signal),
            "signal-average" => Ok(ScoringMode::SignalAverage),
            _ => Err(anyhow!("Unknown scoring mode '{}'", name)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ScoringMode::Vector => "vector",
            ScoringMode::Signal => "signal",
            ScoringMode::SignalAverage => "signal-average",
        }
    }
}

/// Hits failing either threshold are ignored entirely.
#[derive(Debug, Clone, Copy)]
pub struct HitFilter {
    pub max_pscore: f64,
    pub min_alignment_length: u32,
}

impl HitFilter {
    pub fn accepts(&self, hit: &BlastHit) -> bool {
        hit.pscore <= self.max_pscore && hit.alignment_length >= self.min_alignment_length
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector {
    values: Vec<f64>,
    hit_counts: Vec<u32>,
}

impl ScoreVector {
    pub fn new(num_coordinates: usize) -> ScoreVector {
        ScoreVector {
            values: vec![0.0; num_coordinates],
            hit_counts: vec![0; num_coordinates],
        }
    }

    pub fn from_values(values: Vec<f64>) -> ScoreVector {
        let hit_counts = values.iter().map(|v| if *v != 0.0 { 1 } else { 0 }).collect();
        ScoreVector { values, hit_counts }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total_hits(&self) -> u32 {
        self.hit_counts.iter().sum()
    }

    pub fn total_score(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Fold a single accepted hit into the coordinate.
    pub fn record_hit(&mut self, coordinate: usize, hit: &BlastHit, mode: ScoringMode) {
        self.hit_counts[coordinate] += 1;
        let current = self.values[coordinate];
        match mode {
            ScoringMode::Vector => {
                // Ties keep the first seen value
                if hit.percent_identity > current {
                    self.values[coordinate] = hit.percent_identity;
                }
            }
            ScoringMode::Signal => {
                self.values[coordinate] = current + hit.signal();
            }
            ScoringMode::SignalAverage => {
                let n = self.hit_counts[coordinate] as f64;
                self.values[coordinate] = current + (hit.signal() - current) / n;
            }
        }
    }

    /// Position of the first maximal, non-zero coordinate.
    pub fn best_coordinate(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, v) in self.values.iter().enumerate() {
            if *v <= 0.0 {
                continue;
            }
            match best {
                Some((_, best_value)) if best_value >= *v => {}
                _ => best = Some((i, *v)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Coordinates of the non-zero values, highest value first. Ties are in
    /// coordinate order.
    pub fn ranked_coordinates(&self) -> Vec<usize> {
        let mut ranked: Vec<usize> = (0..self.values.len())
            .filter(|i| self.values[*i] > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            self.values[*b]
                .partial_cmp(&self.values[*a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(b))
        });
        ranked
    }

    /// A new vector holding only the basis coordinates, in basis order.
    pub fn project(&self, basis: &[usize]) -> ScoreVector {
        ScoreVector {
            values: basis.iter().map(|i| self.values[*i]).collect(),
            hit_counts: basis.iter().map(|i| self.hit_counts[*i]).collect(),
        }
    }

    /// Post-process once all hits are in. Returns false if the vector is
    /// degenerate and the contig should not be clustered.
    pub fn adjust_vector(&mut self, normalize: bool, max_total_score: Option<f64>) -> bool {
        if self.total_hits() == 0 || self.values.iter().all(|v| *v == 0.0) {
            return false;
        }
        if let Some(max_total) = max_total_score {
            if self.total_score() > max_total {
                return false;
            }
        }
        if normalize {
            let norm = self.values.iter().map(|v| v * v).sum::<f64>().sqrt();
            for v in self.values.iter_mut() {
                *v /= norm;
            }
        }
        true
    }
}

/// Per-contig score vectors against an ordered list of reference genomes,
/// built up hit by hit.
pub struct ContigScores {
    genome_positions: HashMap<String, usize>,
    num_genomes: usize,
    mode: ScoringMode,
    filter: HitFilter,
    vectors: BTreeMap<String, ScoreVector>,
}

impl ContigScores {
    pub fn new(genome_ids: &[String], mode: ScoringMode, filter: HitFilter) -> ContigScores {
        ContigScores {
            genome_positions: genome_ids
                .iter()
                .enumerate()
                .map(|(i, id)| (id.clone(), i))
                .collect(),
            num_genomes: genome_ids.len(),
            mode,
            filter,
            vectors: BTreeMap::new(),
        }
    }

    /// Record a hit of a contig against a reference genome. Returns whether the
    /// hit passed the filter.
    pub fn update_score(
        &mut self,
        contig: &str,
        hit: &BlastHit,
        reference_genome_id: &str,
    ) -> Result<bool> {
        let position = match self.genome_positions.get(reference_genome_id) {
            Some(p) => *p,
            None => {
                return Err(anyhow!(
                    "Hit against unknown reference genome '{}'",
                    reference_genome_id
                ))
            }
        };
        if !self.filter.accepts(hit) {
            trace!(
                "Ignoring hit of {} against {}: pscore {} length {}",
                contig,
                reference_genome_id,
                hit.pscore,
                hit.alignment_length
            );
            return Ok(false);
        }
        let num_genomes = self.num_genomes;
        self.vectors
            .entry(contig.to_string())
            .or_insert_with(|| ScoreVector::new(num_genomes))
            .record_hit(position, hit, self.mode);
        Ok(true)
    }

    pub fn get(&self, contig: &str) -> Option<&ScoreVector> {
        self.vectors.get(contig)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Contig names and raw (unprojected) vectors, in contig name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScoreVector)> {
        self.vectors.iter()
    }

    pub fn into_vectors(self) -> BTreeMap<String, ScoreVector> {
        self.vectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn hit(pident: f64, length: u32, pscore: f64) -> BlastHit {
        BlastHit {
            query: "fig|83333.1.peg.1".to_string(),
            contig: "c1".to_string(),
            percent_identity: pident,
            alignment_length: length,
            begin: 1,
            end: length,
            pscore,
            bit_score: 100.0,
        }
    }

    fn permissive() -> HitFilter {
        HitFilter {
            max_pscore: 1e-5,
            min_alignment_length: 10,
        }
    }

    fn genomes() -> Vec<String> {
        vec!["g1".to_string(), "g2".to_string(), "g3".to_string()]
    }

    #[test]
    fn test_vector_mode_keeps_best() {
        init();
        let mut scores = ContigScores::new(&genomes(), ScoringMode::Vector, permissive());
        assert!(scores.update_score("c1", &hit(90.0, 100, 1e-20), "g2").unwrap());
        assert!(scores.update_score("c1", &hit(95.5, 100, 1e-20), "g2").unwrap());
        assert!(scores.update_score("c1", &hit(93.0, 100, 1e-20), "g2").unwrap());
        assert_eq!(&[0.0, 95.5, 0.0], scores.get("c1").unwrap().values());
    }

    #[test]
    fn test_signal_modes() {
        init();
        let mut sum = ContigScores::new(&genomes(), ScoringMode::Signal, permissive());
        let mut avg = ContigScores::new(&genomes(), ScoringMode::SignalAverage, permissive());
        for scores in [&mut sum, &mut avg].iter_mut() {
            scores.update_score("c1", &hit(100.0, 10, 0.0), "g1").unwrap();
            scores.update_score("c1", &hit(50.0, 40, 0.0), "g1").unwrap();
        }
        assert_eq!(3000.0, sum.get("c1").unwrap().values()[0]);
        assert_eq!(1500.0, avg.get("c1").unwrap().values()[0]);
    }

    #[test]
    fn test_filtered_hits_ignored() {
        init();
        let mut scores = ContigScores::new(&genomes(), ScoringMode::Vector, permissive());
        assert!(!scores.update_score("c1", &hit(99.0, 100, 0.1), "g1").unwrap());
        assert!(!scores.update_score("c1", &hit(99.0, 5, 0.0), "g1").unwrap());
        assert!(scores.get("c1").is_none());
        assert!(scores.update_score("c1", &hit(99.0, 5, 0.0), "g9").is_err());
    }

    #[test]
    fn test_adjust_vector() {
        init();
        let mut v = ScoreVector::from_values(vec![3.0, 4.0, 0.0]);
        assert!(v.adjust_vector(true, None));
        assert_eq!(&[0.6, 0.8, 0.0], v.values());

        let mut promiscuous = ScoreVector::from_values(vec![90.0, 90.0, 90.0]);
        assert!(!promiscuous.adjust_vector(false, Some(200.0)));

        let mut empty = ScoreVector::new(3);
        assert!(!empty.adjust_vector(false, None));
    }

    #[test]
    fn test_ranking_and_projection() {
        init();
        let v = ScoreVector::from_values(vec![10.0, 0.0, 30.0, 30.0]);
        assert_eq!(Some(2), v.best_coordinate());
        assert_eq!(vec![2, 3, 0], v.ranked_coordinates());
        assert_eq!(&[30.0, 10.0], v.project(&[3, 0]).values());
    }
}
