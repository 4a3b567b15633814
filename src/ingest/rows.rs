use std::collections::BTreeMap;

use super::Grid;
use super::header::COLUMNS;
use crate::models::CaseRecord;

/// Outcome of validating the data rows of a grid: the valid batch plus a
/// per-row error map for operator review. Row keys are 1-based
/// spreadsheet row numbers, preserving traceability to the source file.
#[derive(Debug, Default)]
pub struct RowOutcome {
    pub records: Vec<CaseRecord>,
    pub errors: BTreeMap<u32, Vec<String>>,
}

impl RowOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates and coerces each data row into a `CaseRecord`.
///
/// Rows strictly after `header_row_index` are read positionally (columns
/// A–E); the header text is never re-matched per row. Fully empty rows are
/// skipped. A row with any failing field lands entirely in `errors`; no
/// partial record is ever emitted.
pub fn validate(grid: &Grid, header_row_index: usize) -> RowOutcome {
    let mut outcome = RowOutcome::default();

    for (index, row) in grid.iter().enumerate().skip(header_row_index + 1) {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let row_number = (index + 1) as u32;
        let mut messages = Vec::new();

        let case_number = cell(row, 0);
        if let Err(msg) = check_case_number(&case_number) {
            messages.push(msg);
        }

        let mut counts = [0u32; 4];
        for (slot, spec) in COLUMNS.iter().enumerate().skip(1) {
            match parse_count(&cell(row, slot)) {
                Ok(value) => counts[slot - 1] = value,
                Err(reason) => messages.push(format!("{}: {}", spec.label, reason)),
            }
        }

        if messages.is_empty() {
            outcome.records.push(CaseRecord {
                case_number,
                critical_parts: counts[0],
                total_lines: counts[1],
                domestic_lines: counts[2],
                bulk_lines: counts[3],
                source_row: row_number,
            });
        } else {
            outcome.errors.insert(row_number, messages);
        }
    }

    outcome
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn check_case_number(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Case Number is required".to_string());
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '\\'))
    {
        return Err(format!(
            "Case Number '{}' may only contain letters, digits and - _ / \\",
            value
        ));
    }
    Ok(())
}

/// Counts are non-negative integers; spreadsheet numeric cells arrive as
/// integral floats ("2.0") and coerce cleanly.
fn parse_count(value: &str) -> Result<u32, String> {
    if value.is_empty() {
        return Err("value is required".to_string());
    }
    let number: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !number.is_finite() || number < 0.0 {
        return Err(format!("'{}' must be zero or greater", value));
    }
    if number.fract() != 0.0 {
        return Err(format!("'{}' must be a whole number", value));
    }
    Ok(number as u32)
}
