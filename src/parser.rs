// 🏗️ Roster Parser - spreadsheet exports → raw rows
//
// Only delimited text is read here. Header names are kept verbatim; mapping
// them to logical fields is the job of `extract`.

use crate::extract::RawRow;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const UTF8_BOM: &str = "\u{FEFF}";

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetFormat {
    Csv,
    Tsv,
}

impl SheetFormat {
    pub fn name(&self) -> &str {
        match self {
            SheetFormat::Csv => "CSV",
            SheetFormat::Tsv => "TSV",
        }
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            SheetFormat::Csv => b',',
            SheetFormat::Tsv => b'\t',
        }
    }
}

/// RosterParser - turns an uploaded sheet into raw rows
pub trait RosterParser: Send + Sync {
    /// Parse rows from any reader. `source_name` is only used in messages.
    fn parse_reader(&self, reader: &mut dyn Read, source_name: &str) -> Result<Vec<RawRow>>;

    /// Format this parser handles
    fn format(&self) -> SheetFormat;

    /// Parse a file on disk
    fn parse(&self, file_path: &Path) -> Result<Vec<RawRow>> {
        let mut file = File::open(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        self.parse_reader(&mut file, filename)
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect sheet format from the file extension
///
/// # Examples:
/// ```
/// use std::path::Path;
/// use student_tracker::{detect_format, SheetFormat};
///
/// assert_eq!(detect_format(Path::new("class_7.csv")).unwrap(), SheetFormat::Csv);
/// assert!(detect_format(Path::new("class_7.xlsx")).is_err());
/// ```
pub fn detect_format(file_path: &Path) -> Result<SheetFormat> {
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => Ok(SheetFormat::Csv),
        "tsv" | "tab" => Ok(SheetFormat::Tsv),
        "xlsx" | "xls" | "ods" => Err(anyhow!(
            "{} is a binary spreadsheet; export it as CSV (UTF-8) and upload that instead",
            file_path.display()
        )),
        _ => Err(anyhow!(
            "Could not detect sheet format from file name: {}",
            file_path.display()
        )),
    }
}

/// Get the parser for a sheet format
pub fn get_parser(format: SheetFormat) -> Box<dyn RosterParser> {
    Box::new(DelimitedParser::new(format))
}

// ============================================================================
// DELIMITED TEXT PARSER
// ============================================================================

pub struct DelimitedParser {
    format: SheetFormat,
}

impl DelimitedParser {
    pub fn new(format: SheetFormat) -> Self {
        DelimitedParser { format }
    }
}

impl RosterParser for DelimitedParser {
    fn parse_reader(&self, reader: &mut dyn Read, source_name: &str) -> Result<Vec<RawRow>> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .with_context(|| format!("{} is not valid UTF-8 text", source_name))?;

        let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.format.delimiter())
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = csv_reader
            .headers()
            .with_context(|| format!("Failed to read header row of {}", source_name))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(anyhow!("{} has no header row", source_name));
        }

        let mut rows = Vec::new();

        for (index, result) in csv_reader.records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to parse record {} in {}", index + 1, source_name)
            })?;

            // Physical line in the sheet (header = 1)
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(index + 2);

            let cells: Vec<(String, String)> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect();

            let row = RawRow::new(row_number, cells);
            if !row.is_blank() {
                rows.push(row);
            }
        }

        Ok(rows)
    }

    fn format(&self) -> SheetFormat {
        self.format
    }
}

// ============================================================================
// TESTS
// ============================================================================
