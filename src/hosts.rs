//! Normalization of host and command specifications.
//!
//! A specification is either a path to a file listing one entry per line, or
//! a literal comma-separated list. Blank lines and lines starting with `#`
//! are skipped in both forms.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Expands a host or command specification into its ordered entries.
///
/// # Examples
///
/// ```
/// use netdispatch::hosts::clean_lines;
///
/// let hosts = clean_lines("10.0.0.1, 10.0.0.2,,# skipped").unwrap();
/// assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2"]);
/// ```
pub fn clean_lines(spec: &str) -> Result<Vec<String>> {
    let path = Path::new(spec);
    if path.is_file() {
        debug!("Reading entries from file {}", path.display());
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(filter_entries(contents.lines()));
    }

    Ok(filter_entries(spec.split(',')))
}

fn filter_entries<'a>(entries: impl Iterator<Item = &'a str>) -> Vec<String> {
    entries
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && !entry.starts_with('#'))
        .map(String::from)
        .collect()
}
