use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

/// Read a coverage vector file i.e. a header row and then one row per contig,
/// the contig name followed by one coverage column per sample. Returns the mean
/// coverage of each contig.
pub fn read_coverage_file(file_path: &str) -> Result<BTreeMap<String, f64>> {
    let mut coverages = BTreeMap::new();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(std::path::Path::new(file_path))
        .with_context(|| format!("Failed to open coverage file {}", file_path))?;

    let num_samples = rdr
        .headers()
        .with_context(|| format!("Failed to find headers in coverage file {}", file_path))?
        .len()
        .saturating_sub(1);
    if num_samples == 0 {
        bail!(
            "Coverage file {} needs at least one sample column after the contig name",
            file_path
        );
    }

    for result in rdr.records() {
        let res = result.with_context(|| format!("Parsing error in coverage file {}", file_path))?;
        if res.len() != num_samples + 1 {
            bail!(
                "Parsing error in coverage file - didn't find {} columns in line {:?}",
                num_samples + 1,
                res
            );
        }
        let mut total = 0.0;
        for field in res.iter().skip(1) {
            total += field.parse::<f64>().with_context(|| {
                format!("Error parsing coverage '{}' for contig {}", field, &res[0])
            })?;
        }
        let mean = total / num_samples as f64;
        trace!("For {}, found mean coverage {}", &res[0], mean);
        if coverages.insert(res[0].to_string(), mean).is_some() {
            bail!(
                "The contig {} was found multiple times in the coverage file {}",
                &res[0],
                file_path
            );
        }
    }
    debug!(
        "Read in coverage of {} contigs over {} samples from {}",
        coverages.len(),
        num_samples,
        file_path
    );
    Ok(coverages)
}
