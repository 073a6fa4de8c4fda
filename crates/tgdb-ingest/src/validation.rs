//! Pre-import checks on submitted experiment files
//!
//! These run before anything is written and report every offending key or
//! identifier at once instead of stopping at the first.

use crate::error::{IngestError, Result};
use crate::parser::metadata::{keys, MetadataRecord};
use indexmap::IndexSet;
use std::collections::HashSet;

/// Reject metadata keys containing spaces, values containing spaces outside
/// the free-text keys, and values containing `:`
pub fn validate_metadata_values(metadata: &MetadataRecord) -> Result<()> {
    let mut problems = Vec::new();

    for (key, value) in metadata.iter() {
        if key.contains(' ') {
            problems.push(format!("key {key:?} contains a space"));
        }
        if value.contains(' ') && !keys::FREE_TEXT.contains(&key) {
            problems.push(format!("value of {key} contains a space"));
        }
        if value.contains(':') {
            problems.push(format!("value of {key} contains ':'"));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(IngestError::MalformedMetadata(problems.join("; ")))
    }
}

/// Fail with every identifier that occurs more than once, in first-repeat order
pub fn ensure_unique_genes<I, S>(genes: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let duplicates = repeated(genes);
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(IngestError::DuplicateKey(format!(
            "genes listed more than once: {}",
            join(&duplicates)
        )))
    }
}

/// Check a read-count table against its experimental design
///
/// Both files are tab-delimited. The read-count header names the samples
/// and the design file names one sample per line in its first column.
/// Sample names compare upper-cased and empty names are ignored.
pub fn validate_read_counts(read_count_text: &str, design_text: &str) -> Result<()> {
    let mut lines = read_count_text.lines();
    let header: Vec<String> = lines
        .next()
        .map(|line| line.split('\t').map(normalize_sample).collect())
        .unwrap_or_default();

    let duplicate_rows = repeated(lines.map(str::trim).filter(|line| !line.is_empty()));
    if !duplicate_rows.is_empty() {
        return Err(IngestError::DuplicateKey(format!(
            "read count file repeats rows: {}",
            join(&duplicate_rows)
        )));
    }

    let design: Vec<String> = design_text
        .lines()
        .map(|line| normalize_sample(line.split('\t').next().unwrap_or("")))
        .collect();

    let counted: HashSet<&str> = non_empty(&header).collect();
    let designed: HashSet<&str> = non_empty(&design).collect();
    if counted != designed {
        let mut missing: Vec<&str> = counted.difference(&designed).copied().collect();
        let mut extra: Vec<&str> = designed.difference(&counted).copied().collect();
        missing.sort_unstable();
        extra.sort_unstable();
        return Err(IngestError::SchemaMismatch(format!(
            "read count and experimental design files do not share the same samples \
             (only in read counts: [{}]; only in design: [{}])",
            missing.join(", "),
            extra.join(", ")
        )));
    }

    let duplicate_samples = repeated(non_empty(&header));
    if !duplicate_samples.is_empty() {
        return Err(IngestError::DuplicateKey(format!(
            "duplicate sample names in read count file: {}",
            join(&duplicate_samples)
        )));
    }

    let duplicate_design = repeated(non_empty(&design));
    if !duplicate_design.is_empty() {
        return Err(IngestError::DuplicateKey(format!(
            "duplicate sample names in experimental design file: {}",
            join(&duplicate_design)
        )));
    }

    Ok(())
}

fn normalize_sample(name: &str) -> String {
    name.trim().to_uppercase()
}

fn non_empty(names: &[String]) -> impl Iterator<Item = &str> {
    names.iter().map(String::as_str).filter(|n| !n.is_empty())
}

fn repeated<I, S>(items: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut duplicates = IndexSet::new();
    for item in items {
        let item = item.as_ref();
        if !seen.insert(item.to_string()) {
            duplicates.insert(item.to_string());
        }
    }
    duplicates
}

fn join(items: &IndexSet<String>) -> String {
    items.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
