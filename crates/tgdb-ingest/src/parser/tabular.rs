//! Delimited expression/binding data tables
//!
//! The first row is a header. The meaning of the remaining columns is
//! inferred from how many survive empty-column removal:
//!
//! | columns | shape |
//! |---------|-------|
//! | 1 | gene id |
//! | 3 | gene id, log2 fold change, p-value |

use crate::error::{IngestError, Result};
use crate::models::{ExperimentData, ExperimentRow};
use csv::{ReaderBuilder, Trim};

/// Cell spellings treated as missing values
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "#DIV/0!", "#N/A!", "#NAME?",
    "#NULL!", "#NUM!", "#REF!", "#VALUE!",
];

pub(crate) fn is_na(cell: &str) -> bool {
    NA_VALUES.contains(&cell.trim())
}

/// Read delimited text into a grid of cells, dropping rows and then columns
/// that hold no values. Returns the surviving data rows, header excluded.
pub(crate) fn read_grid(text: &str, delimiter: u8) -> Result<Vec<Vec<Option<String>>>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let header_width = reader.headers()?.len();

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!is_na(cell)).then(|| cell.to_string()))
            .collect();
        if row.iter().any(Option::is_some) {
            rows.push(row);
        }
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(header_width);
    let keep: Vec<usize> = (0..width)
        .filter(|&col| rows.iter().any(|row| matches!(row.get(col), Some(Some(_)))))
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            keep.iter()
                .map(|&col| row.get(col).cloned().flatten())
                .collect()
        })
        .collect())
}

/// Parse an expression/binding data file
pub fn parse_tabular_data(text: &str, delimiter: char) -> Result<ExperimentData> {
    let delimiter = u8::try_from(delimiter).map_err(|_| {
        IngestError::MalformedData(format!("delimiter {delimiter:?} is not a single byte"))
    })?;

    let grid = read_grid(text, delimiter)?;
    let columns = grid.first().map(Vec::len).unwrap_or(0);

    match columns {
        0 => Ok(ExperimentData::default()),
        1 => Ok(ExperimentData {
            rows: grid
                .into_iter()
                .map(|row| ExperimentRow {
                    gene_id: cell(&row, 0).to_string(),
                    log2_fold_change: None,
                    p_value: None,
                })
                .collect(),
            has_scores: false,
        }),
        3 => {
            let rows = grid
                .into_iter()
                .enumerate()
                .map(|(idx, row)| {
                    Ok(ExperimentRow {
                        gene_id: cell(&row, 0).to_string(),
                        log2_fold_change: parse_number(row.get(1), idx, "log2 fold change")?
                            .map(clamp_infinite),
                        p_value: parse_number(row.get(2), idx, "p-value")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(ExperimentData {
                rows,
                has_scores: true,
            })
        },
        n => Err(IngestError::MalformedData(format!(
            "expected 1 gene id column, optionally followed by log2 fold change and adjusted \
             p-value columns; found {n} columns"
        ))),
    }
}

fn cell(row: &[Option<String>], idx: usize) -> &str {
    row.get(idx).and_then(|c| c.as_deref()).unwrap_or("")
}

fn parse_number(cell: Option<&Option<String>>, row: usize, column: &str) -> Result<Option<f64>> {
    match cell.and_then(|c| c.as_deref()) {
        None => Ok(None),
        Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
            IngestError::MalformedData(format!(
                "{column} {raw:?} on data row {} is not numeric",
                row + 1
            ))
        }),
    }
}

/// Keep fold changes finite so downstream comparisons stay well-defined
fn clamp_infinite(value: f64) -> f64 {
    if value == f64::INFINITY {
        f64::MAX
    } else if value == f64::NEG_INFINITY {
        f64::MIN
    } else {
        value
    }
}
