//! CSV reference files: gene annotations and additional edge tables

use crate::error::{IngestError, Result};
use crate::models::{AnnotationBatch, AnnotationRecord, EdgeRow};
use crate::parser::tabular::read_grid;
use csv::{ReaderBuilder, Trim};
use indexmap::IndexSet;

const ANNOTATION_COLUMNS: usize = 5;

/// Parse an annotation CSV
///
/// Columns are, by position: gene id, name, full name, gene type, gene
/// family. A header row is required and `#` starts a comment line. Missing
/// trailing cells read as empty strings.
pub fn parse_annotations(text: &str) -> Result<AnnotationBatch> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let header_width = reader.headers()?.len();
    if header_width != ANNOTATION_COLUMNS {
        return Err(IngestError::MalformedData(format!(
            "annotation file must have {ANNOTATION_COLUMNS} columns (gene_id, name, fullname, \
             gene_type, gene_family); header has {header_width}"
        )));
    }

    let mut records = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() > ANNOTATION_COLUMNS {
            return Err(IngestError::MalformedData(format!(
                "annotation row {} has {} columns",
                idx + 1,
                record.len()
            )));
        }

        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let gene_id = field(0);
        if gene_id.is_empty() {
            return Err(IngestError::MalformedData(format!(
                "annotation row {} has no gene id",
                idx + 1
            )));
        }

        records.push(AnnotationRecord {
            gene_id,
            name: field(1),
            full_name: field(2),
            gene_type: field(3),
            gene_family: field(4),
        });
    }

    AnnotationBatch::from_records(records)
}

/// Parse an additional-edges CSV of `source, target, edge` rows
///
/// Empty rows and columns are ignored and exact duplicate rows collapse.
pub fn parse_edge_table(text: &str) -> Result<Vec<EdgeRow>> {
    let grid = read_grid(text, b',')?;

    let mut rows = IndexSet::new();
    for (idx, row) in grid.into_iter().enumerate() {
        if row.len() != 3 {
            return Err(IngestError::MalformedData(format!(
                "edge file must have source, target and edge columns; found {}",
                row.len()
            )));
        }

        let mut cells = row.into_iter();
        match (cells.next().flatten(), cells.next().flatten(), cells.next().flatten()) {
            (Some(source), Some(target), Some(edge)) => {
                rows.insert(EdgeRow {
                    source,
                    target,
                    edge,
                });
            },
            _ => {
                return Err(IngestError::MalformedData(format!(
                    "edge row {} is missing a source, target or edge",
                    idx + 1
                )));
            },
        }
    }

    Ok(rows.into_iter().collect())
}
