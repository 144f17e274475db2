use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

/// Universal role occurrences of a contig, role description to count.
pub type RoleCounts = BTreeMap<String, u32>;

/// Read universal role occurrences, one line per occurrence of contig name then
/// role description.
pub fn read_role_file(file_path: &str) -> Result<BTreeMap<String, RoleCounts>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(std::path::Path::new(file_path))
        .with_context(|| format!("Failed to open role file {}", file_path))?;

    let mut roles: BTreeMap<String, RoleCounts> = BTreeMap::new();
    let mut num_occurrences = 0usize;
    for result in rdr.records() {
        let res = result.with_context(|| format!("Parsing error in role file {}", file_path))?;
        if res.len() != 2 {
            bail!(
                "Parsing error in role file - didn't find 2 columns in line {:?}",
                res
            );
        }
        *roles
            .entry(res[0].to_string())
            .or_insert_with(BTreeMap::new)
            .entry(res[1].to_string())
            .or_insert(0) += 1;
        num_occurrences += 1;
    }
    debug!(
        "Read {} role occurrences across {} contigs from {}",
        num_occurrences,
        roles.len(),
        file_path
    );
    Ok(roles)
}
