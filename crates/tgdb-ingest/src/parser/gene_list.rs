//! FASTA-like gene list files
//!
//! ```text
//! >induced
//! AT1G01010
//! AT1G01020
//! >repressed
//! AT2G01010
//! ```

use crate::gene_sets::GeneSetIndex;

/// Section name used for genes listed before any `>` header
pub const DEFAULT_LIST_NAME: &str = "default_list";

/// Parse named gene lists into a membership index
///
/// Every non-header line is recorded, trimmed, under the current section;
/// a blank line therefore records the empty token.
pub fn parse_gene_list(text: &str) -> GeneSetIndex {
    let mut index = GeneSetIndex::new();
    let mut list_name = DEFAULT_LIST_NAME.to_string();

    for line in text.lines() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('>') {
            list_name = header.trim_start_matches('>').trim().to_string();
        } else {
            index.insert(line, &list_name);
        }
    }

    index
}

/// Read a bare column of gene ids, skipping `>` headers and `;` comments
pub fn parse_gene_column(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('>') && !line.starts_with(';'))
        .map(str::to_string)
        .collect()
}
