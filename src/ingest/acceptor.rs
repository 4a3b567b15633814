use crate::models::SourceFile;

/// Spreadsheet container formats the pipeline understands.
pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];

/// Maximum accepted source file size: 10 MiB.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Validates the user-selected file before any parsing happens.
///
/// Returns a list of human-readable error strings; an empty list means the
/// file may proceed to parsing. No side effects beyond validation.
pub fn check(file: &SourceFile, max_size: usize) -> Vec<String> {
    let mut errors = Vec::new();

    match file.extension() {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        Some(ext) => errors.push(format!(
            "unsupported file type '.{}'. Allowed: {}",
            ext,
            ALLOWED_EXTENSIONS.join(", ")
        )),
        None => errors.push(format!(
            "the file has no extension. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )),
    }

    if file.size() > max_size {
        errors.push(format!(
            "file is {:.1} MiB, the limit is {} MiB",
            file.size() as f64 / 1024.0 / 1024.0,
            max_size / 1024 / 1024
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn file(name: &str, size: usize) -> SourceFile {
        SourceFile::new(name, Bytes::from(vec![0u8; size]))
    }

    #[test]
    fn test_accepts_known_extensions_case_insensitive() {
        assert!(check(&file("cases.xlsx", 10), MAX_FILE_SIZE).is_empty());
        assert!(check(&file("cases.XLS", 10), MAX_FILE_SIZE).is_empty());
        assert!(check(&file("cases.Csv", 10), MAX_FILE_SIZE).is_empty());
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let errors = check(&file("cases.pdf", 10), MAX_FILE_SIZE);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(".pdf"));
        assert!(check(&file("cases", 10), MAX_FILE_SIZE)[0].contains("no extension"));
    }

    #[test]
    fn test_rejects_oversized_file() {
        assert!(check(&file("cases.csv", MAX_FILE_SIZE), MAX_FILE_SIZE).is_empty());
        let errors = check(&file("cases.csv", MAX_FILE_SIZE + 1), MAX_FILE_SIZE);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("10 MiB"));
    }

    #[test]
    fn test_collects_all_failures() {
        let errors = check(&file("cases.exe", MAX_FILE_SIZE + 1), MAX_FILE_SIZE);
        assert_eq!(errors.len(), 2);
    }
}
