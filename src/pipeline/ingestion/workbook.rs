use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::{CardError, Result};
use crate::pipeline::processing::normalize::clean_header;
use crate::table::{Cell, Table};

/// A multi-sheet spreadsheet handed to the ingestion pipeline.
pub trait SpreadsheetSource {
    /// Name used in logs and the ingest run log (usually the file name)
    fn source_name(&self) -> &str;

    /// Content fingerprint, when the source has raw bytes
    fn fingerprint(&self) -> Option<String> {
        None
    }

    /// Sheet names in workbook order
    fn sheet_names(&mut self) -> Result<Vec<String>>;

    /// Read one sheet; the first row is the header
    fn read_sheet(&mut self, sheet: &str) -> Result<Table>;
}

/// An uploaded spreadsheet file held in memory and parsed with calamine.
pub struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
    workbook: Option<Sheets<Cursor<Vec<u8>>>>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            workbook: None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    fn workbook(&mut self) -> Result<&mut Sheets<Cursor<Vec<u8>>>> {
        let sheets = match self.workbook.take() {
            Some(sheets) => sheets,
            None => open_workbook_auto_from_rs(Cursor::new(self.bytes.clone()))?,
        };
        Ok(self.workbook.insert(sheets))
    }
}

impl SpreadsheetSource for UploadedFile {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn fingerprint(&self) -> Option<String> {
        Some(hex::encode(Sha256::digest(&self.bytes)))
    }

    fn sheet_names(&mut self) -> Result<Vec<String>> {
        Ok(self.workbook()?.sheet_names().to_vec())
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<Table> {
        let range = self.workbook()?.worksheet_range(sheet)?;
        Ok(table_from_range(&range))
    }
}

/// Sheets already held as tables; used for programmatic uploads and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkbook {
    name: String,
    sheets: Vec<(String, Table)>,
    failure: Option<String>,
}

impl InMemoryWorkbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>, table: Table) -> Self {
        self.sheets.push((sheet.into(), table));
        self
    }

    /// A workbook that fails to open with `message`
    pub fn unreadable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
            failure: Some(message.into()),
        }
    }

    fn check_readable(&self, sheet: &str) -> Result<()> {
        match &self.failure {
            Some(message) => Err(CardError::Sheet {
                source_name: self.name.clone(),
                sheet: sheet.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl SpreadsheetSource for InMemoryWorkbook {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&mut self) -> Result<Vec<String>> {
        self.check_readable("")?;
        Ok(self.sheets.iter().map(|(name, _)| name.clone()).collect())
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<Table> {
        self.check_readable(sheet)?;
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, table)| table.clone())
            .ok_or_else(|| CardError::Sheet {
                source_name: self.name.clone(),
                sheet: sheet.to_string(),
                message: "no such sheet".to_string(),
            })
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(n) => Cell::Int(*n),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Header names: cleaned, blank headers become `Unnamed: <n>`, repeated
/// headers get a `.1`, `.2` ... suffix.
fn header_names(row: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    row.iter()
        .enumerate()
        .map(|(idx, data)| {
            let raw = cell_from_data(data).to_text().unwrap_or_default();
            let mut name = clean_header(&raw);
            if name.is_empty() {
                name = format!("Unnamed: {idx}");
            }
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{name}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

fn table_from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::default();
    };

    let mut table = Table::new(header_names(header));
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(cell_from_data).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_are_cleaned_and_deduplicated() {
        let row = vec![
            Data::String("  Card   Name ".to_string()),
            Data::Empty,
            Data::String("Price".to_string()),
            Data::String("Price".to_string()),
        ];
        assert_eq!(
            header_names(&row),
            vec!["Card Name", "Unnamed: 1", "Price", "Price.1"]
        );
    }

    #[test]
    fn test_cell_from_data_treats_blank_strings_as_empty() {
        assert_eq!(cell_from_data(&Data::String("   ".to_string())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Int(3)), Cell::Int(3));
        assert_eq!(cell_from_data(&Data::Float(0.25)), Cell::Float(0.25));
    }

    #[test]
    fn test_garbage_bytes_fail_to_open() {
        let mut file = UploadedFile::new("broken.xlsx", b"not a spreadsheet".to_vec());
        assert!(file.sheet_names().is_err());
        assert!(file.fingerprint().is_some());
    }

    #[test]
    fn test_uploaded_file_opens_once_and_reads_every_sheet() {
        let mut xlsx = rust_xlsxwriter::Workbook::new();
        let monsters = xlsx.add_worksheet();
        monsters.set_name("Monsters").unwrap();
        monsters.write_string(0, 0, "Card Name").unwrap();
        monsters.write_string(1, 0, "Dreepy").unwrap();
        xlsx.add_worksheet().set_name("Summary").unwrap();
        let bytes = xlsx.save_to_buffer().unwrap();

        let mut file = UploadedFile::new("cards.xlsx", bytes);
        assert_eq!(file.sheet_names().unwrap(), vec!["Monsters", "Summary"]);
        let table = file.read_sheet("Monsters").unwrap();
        assert_eq!(table.get(0, "Card Name"), Some(&Cell::text("Dreepy")));
        assert_eq!(file.sheet_names().unwrap().len(), 2);
    }

    #[test]
    fn test_in_memory_workbook_reads_sheets_in_order() {
        let mut workbook = InMemoryWorkbook::new("cards.xlsx")
            .with_sheet("Monsters", Table::new(vec!["Card Name".to_string()]))
            .with_sheet("Summary", Table::default());
        assert_eq!(workbook.sheet_names().unwrap(), vec!["Monsters", "Summary"]);
        assert!(workbook.read_sheet("Traps").is_err());
    }
}
