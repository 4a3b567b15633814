use calamine::{Data, Reader, Xls, Xlsx};
use std::io::Cursor;

use crate::error::IngestError;
use crate::models::SourceFile;

/// Raw cell grid decoded from the spreadsheet container.
/// Row 0 is the header candidate; no semantic interpretation happens here.
pub type Grid = Vec<Vec<String>>;

/// Decodes the blob into a grid of rows/columns based on its extension.
///
/// Purely structural: cells are stringified, nothing is validated beyond
/// the container format itself. An empty workbook is an error because the
/// pipeline cannot even look for a header row.
pub fn parse(file: &SourceFile) -> Result<Grid, IngestError> {
    let grid = match file.extension().as_deref() {
        Some("xlsx") => parse_xlsx(file)?,
        Some("xls") => parse_xls(file)?,
        Some("csv") => parse_csv(file)?,
        other => {
            return Err(IngestError::SourceRejected(vec![format!(
                "unsupported file type '{}'",
                other.unwrap_or("<none>")
            )]));
        }
    };

    if grid.is_empty() {
        return Err(IngestError::EmptyWorkbook);
    }

    tracing::debug!(
        file = %file.name,
        rows = grid.len(),
        "decoded spreadsheet"
    );
    Ok(grid)
}

fn parse_xlsx(file: &SourceFile) -> Result<Grid, IngestError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(file.bytes.clone()))
        .map_err(|e| decode_error("xlsx", &e.to_string()))?;
    first_sheet_grid(&mut workbook)
}

fn parse_xls(file: &SourceFile) -> Result<Grid, IngestError> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(file.bytes.clone()))
        .map_err(|e| decode_error("xls", &e.to_string()))?;
    first_sheet_grid(&mut workbook)
}

fn first_sheet_grid<R>(workbook: &mut R) -> Result<Grid, IngestError>
where
    R: Reader<Cursor<bytes::Bytes>>,
    R::Error: std::fmt::Display,
{
    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(decode_error("sheet", &e.to_string())),
        None => return Err(IngestError::EmptyWorkbook),
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(stringify_cell).collect())
        .collect())
}

fn parse_csv(file: &SourceFile) -> Result<Grid, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file.bytes.as_ref());

    let mut grid = Grid::new();
    for record in reader.records() {
        let record = record.map_err(|e| decode_error("csv", &e.to_string()))?;
        grid.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(grid)
}

/// Renders a cell the way the operator typed it: numeric cells with a zero
/// fraction lose the decimal point so `2.0` round-trips as `2`.
fn stringify_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR:{:?}", e),
        Data::DateTime(dt) => stringify_cell(&Data::Float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn decode_error(container: &str, detail: &str) -> IngestError {
    IngestError::SourceRejected(vec![format!("could not read {} content: {}", container, detail)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn csv_file(content: &str) -> SourceFile {
        SourceFile::new("cases.csv", Bytes::from(content.to_string()))
    }

    #[test]
    fn test_parses_csv_into_grid() {
        let grid = parse(&csv_file("Case No,Critical,Total\nCASE-001,2,10\n")).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], vec!["Case No", "Critical", "Total"]);
        assert_eq!(grid[1], vec!["CASE-001", "2", "10"]);
    }

    #[test]
    fn test_ragged_csv_rows_are_tolerated() {
        let grid = parse(&csv_file("a,b,c,d,e\nonly-one\n")).unwrap();
        assert_eq!(grid[1], vec!["only-one"]);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        assert!(matches!(
            parse(&csv_file("")),
            Err(IngestError::EmptyWorkbook)
        ));
    }

    #[test]
    fn test_garbage_xlsx_is_rejected() {
        let file = SourceFile::new("cases.xlsx", Bytes::from_static(b"not a zip archive"));
        assert!(matches!(
            parse(&file),
            Err(IngestError::SourceRejected(_))
        ));
    }

    #[test]
    fn test_stringify_collapses_integral_floats() {
        assert_eq!(stringify_cell(&Data::Float(2.0)), "2");
        assert_eq!(stringify_cell(&Data::Float(2.5)), "2.5");
        assert_eq!(stringify_cell(&Data::Int(7)), "7");
        assert_eq!(stringify_cell(&Data::Empty), "");
    }
}
