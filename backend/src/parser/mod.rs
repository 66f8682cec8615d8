//! Tabular sources: XLSX workbooks and directories of per-sheet CSV files.
//!
//! Every source loads into a [`Workbook`] of named [`Sheet`]s whose cells are
//! already stringified. No cancellation-specific logic lives here.

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{SourceError, SourceResult};

/// One named table, first row as headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    /// Cell text aligned with `headers`; short rows are allowed.
    pub records: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            records,
        }
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Ordered list of sheets, one per weekday in practice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn row_count(&self) -> usize {
        self.sheets.iter().map(Sheet::row_count).sum()
    }
}

/// Anything the pipeline can load a workbook from.
pub trait TabularSource: Send + Sync {
    fn load(&self) -> SourceResult<Workbook>;

    /// Human-readable origin, used in logs and status responses.
    fn describe(&self) -> String;
}

impl TabularSource for Workbook {
    fn load(&self) -> SourceResult<Workbook> {
        if self.sheets.is_empty() {
            return Err(SourceError::NoSheets);
        }
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory workbook ({} sheets)", self.sheets.len())
    }
}

/// Excel (or ODS) workbook on disk.
#[derive(Debug, Clone)]
pub struct XlsxSource {
    pub path: PathBuf,
}

impl TabularSource for XlsxSource {
    fn load(&self) -> SourceResult<Workbook> {
        read_workbook(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Directory holding one CSV file per sheet; the file stem names the sheet.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    pub dir: PathBuf,
}

impl TabularSource for CsvDirSource {
    fn load(&self) -> SourceResult<Workbook> {
        read_csv_dir(&self.dir)
    }

    fn describe(&self) -> String {
        format!("{} (csv sheets)", self.dir.display())
    }
}

/// Directories are read as CSV sheets, anything else as a workbook file.
pub fn source_for_path(path: impl Into<PathBuf>) -> Arc<dyn TabularSource> {
    let path = path.into();
    if path.is_dir() {
        Arc::new(CsvDirSource { dir: path })
    } else {
        Arc::new(XlsxSource { path })
    }
}

// =============================================================================
// Workbooks
// =============================================================================

/// Read every sheet of a workbook file.
pub fn read_workbook(path: &Path) -> SourceResult<Workbook> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.display().to_string()));
    }
    let mut sheets = open_workbook_auto(path)?;
    collect_sheets(&mut sheets)
}

/// Read a workbook from raw bytes (uploads).
pub fn read_workbook_bytes(bytes: &[u8]) -> SourceResult<Workbook> {
    let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    collect_sheets(&mut sheets)
}

fn collect_sheets<RS: Read + Seek>(sheets: &mut Sheets<RS>) -> SourceResult<Workbook> {
    let mut out = Vec::new();
    for name in sheets.sheet_names() {
        let range = sheets.worksheet_range(&name)?;
        let mut rows = range
            .rows()
            .map(|cells| cells.iter().map(cell_to_string).collect::<Vec<_>>())
            .skip_while(|cells| is_blank(cells));

        let headers = rows.next().unwrap_or_default();
        let records = rows.filter(|cells| !is_blank(cells)).collect();
        out.push(Sheet::new(name, headers, records));
    }

    if out.is_empty() {
        return Err(SourceError::NoSheets);
    }
    Ok(Workbook::new(out))
}

/// Null-safe stringification of a workbook cell.
///
/// Date cells come out as `DD/MM/YYYY`, the only date format the withdrawal
/// calculator reads.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| s.trim().to_string()),
        other => other.to_string().trim().to_string(),
    }
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

// =============================================================================
// CSV sheets
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> SourceResult<String> {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => {
                let (text, _, had_errors) = enc.decode(bytes);
                if had_errors {
                    return Err(SourceError::Encoding(format!(
                        "invalid {} byte sequence",
                        enc.name()
                    )));
                }
                text.into_owned()
            }
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse one CSV file into a sheet, auto-detecting encoding and delimiter.
pub fn parse_csv_sheet(name: &str, bytes: &[u8]) -> SourceResult<Sheet> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let cells: Vec<String> = record?.iter().map(|c| c.trim().to_string()).collect();
        if !is_blank(&cells) {
            records.push(cells);
        }
    }

    Ok(Sheet::new(name, headers, records))
}

/// Read every `*.csv` file of a directory, sorted by file name.
pub fn read_csv_dir(dir: &Path) -> SourceResult<Workbook> {
    if !dir.exists() {
        return Err(SourceError::NotFound(dir.display().to_string()));
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    let mut sheets = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let bytes = fs::read(&path)?;
        sheets.push(parse_csv_sheet(&name, &bytes)?);
    }

    if sheets.is_empty() {
        return Err(SourceError::NoSheets);
    }
    Ok(Workbook::new(sheets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("  Swim  ".into())), "Swim");
        assert_eq!(cell_to_string(&Data::Float(101.0)), "101");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_to_string(&Data::Bool(false)), "FALSE");
        assert_eq!(
            cell_to_string(&Data::DateTimeIso("2025-09-08T00:00:00".into())),
            "08/09/2025"
        );
    }

    #[test]
    fn test_parse_csv_sheet_quoted() {
        let csv = "Program,Program ID,Date Range\n\"Swim, Level 1\",101,01/09/2025 - 30/09/2025\n";
        let sheet = parse_csv_sheet("Monday", csv.as_bytes()).unwrap();

        assert_eq!(sheet.name, "Monday");
        assert_eq!(sheet.headers, vec!["Program", "Program ID", "Date Range"]);
        assert_eq!(sheet.records[0][0], "Swim, Level 1");
        assert_eq!(sheet.records[0][2], "01/09/2025 - 30/09/2025");
    }

    #[test]
    fn test_parse_csv_sheet_semicolon_and_blank_lines() {
        let csv = "Program;Program ID\nSwim;101\n;\nYoga;102\n";
        let sheet = parse_csv_sheet("Tuesday", csv.as_bytes()).unwrap();

        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.records[1], vec!["Yoga", "102"]);
    }

    #[test]
    fn test_parse_csv_sheet_strips_bom() {
        let csv = "\u{feff}Program,Program ID\nSwim,101\n";
        let sheet = parse_csv_sheet("Monday", csv.as_bytes()).unwrap();
        assert_eq!(sheet.headers[0], "Program");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_read_csv_dir_sorted_by_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("2 Wednesday.csv"), "Program\nYoga\n").unwrap();
        fs::write(dir.path().join("1 Monday.csv"), "Program\nSwim\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let workbook = read_csv_dir(dir.path()).unwrap();
        let names: Vec<&str> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["1 Monday", "2 Wednesday"]);
        assert_eq!(workbook.row_count(), 2);
    }

    #[test]
    fn test_empty_csv_dir_has_no_sheets() {
        let dir = tempdir().unwrap();
        assert!(matches!(read_csv_dir(dir.path()), Err(SourceError::NoSheets)));
    }

    #[test]
    fn test_missing_workbook() {
        let dir = tempdir().unwrap();
        let result = read_workbook(&dir.path().join("missing.xlsx"));
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_garbage_bytes_are_not_a_workbook() {
        assert!(read_workbook_bytes(b"definitely not a zip").is_err());
    }

    #[test]
    fn test_source_for_path() {
        let dir = tempdir().unwrap();
        assert!(source_for_path(dir.path()).describe().contains("csv sheets"));
        let file = dir.path().join("book.xlsx");
        assert_eq!(source_for_path(&file).describe(), file.display().to_string());
    }
}
