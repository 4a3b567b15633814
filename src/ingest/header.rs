use crate::models::ColumnBinding;

/// One logical column of the production template.
pub struct ColumnSpec {
    /// Spreadsheet column letter, fixed by the template.
    pub column: &'static str,
    /// Record field this column feeds.
    pub field: &'static str,
    /// Label shown to the operator when the header does not match.
    pub label: &'static str,
    /// Normalized substrings accepted in the header cell. Substring match
    /// tolerates trailing annotations like "Case No (per carton)".
    pub synonyms: &'static [&'static str],
}

/// Expected logical columns, in template order. Position in this table is
/// authoritative for the rest of the file once the header matches.
pub const COLUMNS: [ColumnSpec; 5] = [
    ColumnSpec {
        column: "A",
        field: "caseNumber",
        label: "Case Number",
        synonyms: &["caseno", "case#", "case"],
    },
    ColumnSpec {
        column: "B",
        field: "criticalParts",
        label: "No. of Critical Parts",
        synonyms: &["no.ofcriticalparts", "criticalparts"],
    },
    ColumnSpec {
        column: "C",
        field: "totalLines",
        label: "Total Lines",
        synonyms: &["totallines"],
    },
    ColumnSpec {
        column: "D",
        field: "domesticLines",
        label: "EKC",
        synonyms: &["ekc"],
    },
    ColumnSpec {
        column: "E",
        field: "bulkLines",
        label: "EKM",
        synonyms: &["ekm"],
    },
];

/// Trim, lowercase, and strip internal whitespace so header variants like
/// " Case  No " and "caseno" compare equal.
fn normalize(cell: &str) -> String {
    cell.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Verifies the first row matches the expected column schema.
///
/// Succeeds only if every column's normalized header contains one of its
/// synonyms. Extra columns to the right are ignored.
pub fn matches(header_row: &[String]) -> bool {
    if header_row.len() < COLUMNS.len() {
        return false;
    }
    COLUMNS.iter().zip(header_row.iter()).all(|(spec, cell)| {
        let normalized = normalize(cell);
        spec.synonyms.iter().any(|syn| normalized.contains(syn))
    })
}

/// Human-readable description of the expected template, shown when the
/// header does not match.
pub fn expected_schema() -> String {
    COLUMNS
        .iter()
        .map(|spec| format!("{}: {}", spec.column, spec.label))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The ordered column→field mapping recorded into `UploadMeta`.
pub fn column_map() -> Vec<ColumnBinding> {
    COLUMNS
        .iter()
        .map(|spec| ColumnBinding {
            column: spec.column.to_string(),
            field: spec.field.to_string(),
        })
        .collect()
}
