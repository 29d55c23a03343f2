// Pipeline ingestion: reading uploaded workbooks into one validated card table

pub mod ingest_meta;
pub mod workbook;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::metrics::IngestMetrics;
use crate::pipeline::processing::normalize::{DefaultNormalizer, Normalizer};
use crate::pipeline::processing::quality_gate::{
    DefaultQualityGate, QualityGate, ValidationError,
};
use crate::schema::{self, CardRecord, IMAGE_URL, INVENTORY_COUNT, PLACEHOLDER, PRICE, TYPE};
use crate::table::{Cell, Table};

pub use ingest_meta::IngestMeta;
pub use workbook::{InMemoryWorkbook, SpreadsheetSource, UploadedFile};

/// Result of one ingestion call
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Normalized, validated and gap-filled card table
    Loaded(Table),
    /// No sheet produced any rows to merge
    Empty,
    /// The merged batch failed validation as a whole
    Rejected(ValidationError),
}

impl IngestOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, IngestOutcome::Loaded(_))
    }

    /// Collapse to a table; anything but `Loaded` yields an empty table.
    pub fn into_table(self) -> Table {
        match self {
            IngestOutcome::Loaded(table) => table,
            IngestOutcome::Empty | IngestOutcome::Rejected(_) => Table::default(),
        }
    }

    pub fn records(&self) -> Vec<CardRecord> {
        match self {
            IngestOutcome::Loaded(table) => (0..table.len())
                .map(|row| CardRecord::from_row(table, row))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Short label for logs and the ingest run log
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Loaded(_) => "loaded",
            IngestOutcome::Empty => "empty",
            IngestOutcome::Rejected(_) => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Loaded { sheets: usize, rows: usize },
    Failed { error: String },
}

/// Per-file part of an ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_name: String,
    pub fingerprint: Option<String>,
    pub status: FileStatus,
    pub skipped_sheets: Vec<String>,
}

impl FileReport {
    /// Report for a file that could not be read at all
    pub fn failed(file_name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            file_name: file_name.into(),
            fingerprint: None,
            status: FileStatus::Failed {
                error: error.to_string(),
            },
            skipped_sheets: Vec::new(),
        }
    }
}

/// Everything that happened during one ingestion call
#[derive(Debug, Clone)]
pub struct IngestRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub outcome: IngestOutcome,
}

impl IngestRun {
    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
    }
}

/// Reads uploaded workbooks into a single validated card table
pub struct IngestPipeline {
    config: IngestConfig,
    normalizer: Box<dyn Normalizer>,
    quality_gate: Box<dyn QualityGate>,
}

impl IngestPipeline {
    /// Create a pipeline with the default normalizer and quality gate
    pub fn new(config: IngestConfig) -> Self {
        Self::with_stages(
            config,
            Box::new(DefaultNormalizer::new()),
            Box::new(DefaultQualityGate::new()),
        )
    }

    pub fn with_stages(
        config: IngestConfig,
        normalizer: Box<dyn Normalizer>,
        quality_gate: Box<dyn QualityGate>,
    ) -> Self {
        Self {
            config,
            normalizer,
            quality_gate,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Required columns from the configuration
    pub fn required_columns(&self) -> Vec<&str> {
        self.config.required_columns.iter().map(String::as_str).collect()
    }

    /// Load every file, merge, normalize and validate.
    pub fn load_and_validate(
        &self,
        files: &mut [Box<dyn SpreadsheetSource>],
        required_columns: &[&str],
    ) -> IngestOutcome {
        self.run(files, required_columns).outcome
    }

    /// Same as [`load_and_validate`](Self::load_and_validate), keeping the per-file report.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn run(
        &self,
        files: &mut [Box<dyn SpreadsheetSource>],
        required_columns: &[&str],
    ) -> IngestRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        info!("Loading and validating data (run {})", run_id);

        let mut sub_tables = Vec::new();
        let mut reports = Vec::with_capacity(files.len());
        for file in files.iter_mut() {
            let (tables, report) = self.read_file(file.as_mut());
            sub_tables.extend(tables);
            reports.push(report);
        }

        let outcome = self.process(sub_tables, required_columns);
        match &outcome {
            IngestOutcome::Loaded(table) => {
                IngestMetrics::record_batch_loaded(table.len(), started.elapsed().as_secs_f64());
                info!("Ingestion finished with {} rows", table.len());
            }
            IngestOutcome::Empty => info!("No data loaded"),
            IngestOutcome::Rejected(e) => {
                IngestMetrics::record_batch_rejected(e.kind());
                warn!("Batch rejected: {}", e);
            }
        }

        IngestRun {
            run_id,
            started_at,
            files: reports,
            outcome,
        }
    }

    /// Read every non-skipped sheet of one file, tagging rows with the sheet name.
    ///
    /// Any failure discards the whole file, including sheets read before the
    /// failing one.
    fn read_file(&self, file: &mut dyn SpreadsheetSource) -> (Vec<Table>, FileReport) {
        let file_name = file.source_name().to_string();
        let mut report = FileReport {
            file_name: file_name.clone(),
            fingerprint: file.fingerprint(),
            status: FileStatus::Loaded { sheets: 0, rows: 0 },
            skipped_sheets: Vec::new(),
        };

        match self.read_sheets(file, &mut report.skipped_sheets) {
            Ok(tables) => {
                let rows = tables.iter().map(Table::len).sum();
                report.status = FileStatus::Loaded {
                    sheets: tables.len(),
                    rows,
                };
                (tables, report)
            }
            Err(e) => {
                warn!("Error loading file {}: {}", file_name, e);
                IngestMetrics::record_file_failed();
                report.status = FileStatus::Failed { error: e.to_string() };
                (Vec::new(), report)
            }
        }
    }

    fn read_sheets(
        &self,
        file: &mut dyn SpreadsheetSource,
        skipped: &mut Vec<String>,
    ) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        for sheet_name in file.sheet_names()? {
            if self.config.skip_sheets.contains(&sheet_name) {
                debug!("Skipping sheet: {}", sheet_name);
                IngestMetrics::record_sheet_skipped();
                skipped.push(sheet_name);
                continue;
            }
            let mut table = file.read_sheet(&sheet_name)?;
            table.set_column(TYPE, Cell::text(sheet_name.as_str()));
            debug!("Loaded {} sheet with {} rows", sheet_name, table.len());
            IngestMetrics::record_sheet_loaded(table.len());
            tables.push(table);
        }
        Ok(tables)
    }

    fn process(&self, sub_tables: Vec<Table>, required_columns: &[&str]) -> IngestOutcome {
        if sub_tables.is_empty() {
            return IngestOutcome::Empty;
        }

        let merged = Table::concat(sub_tables);
        self.log_stage("before validation", &merged);

        let before = merged.len();
        let prepared = self.normalizer.prepare(merged);
        IngestMetrics::record_rows_dropped(before - prepared.len());
        self.log_stage("after preparing data", &prepared);

        let mandatory = schema::mandatory_columns(required_columns);
        if let Err(e) = self.quality_gate.check_columns(&prepared, &mandatory) {
            debug!("Column validation failed. Columns found: {}", prepared.columns().join(", "));
            return IngestOutcome::Rejected(e);
        }
        self.log_stage("after column validation", &prepared);

        let typed = match self.quality_gate.validate_data_types(prepared) {
            Ok(table) => table,
            Err(e) => {
                debug!("Data type validation failed");
                return IngestOutcome::Rejected(e);
            }
        };
        self.log_stage("after data type validation", &typed);

        let filled = fill_required(typed, required_columns);
        self.log_stage("after handling missing values in required columns", &filled);

        IngestOutcome::Loaded(filled)
    }

    fn log_stage(&self, stage: &str, table: &Table) {
        debug!("Total rows {}: {}", stage, table.len());
        if self.config.preview_rows > 0 {
            debug!("\n{}", table.preview(self.config.preview_rows));
        }
    }
}

fn fill_value(column: &str) -> Cell {
    match column {
        PRICE => Cell::Float(0.0),
        INVENTORY_COUNT => Cell::Int(0),
        _ => Cell::text(PLACEHOLDER),
    }
}

/// Fill gaps in required columns, synthesize absent ones and project the
/// table onto the required columns plus `Image URL`.
fn fill_required(mut table: Table, required_columns: &[&str]) -> Table {
    let incomplete = table
        .rows()
        .iter()
        .filter(|row| {
            required_columns.iter().any(|c| {
                table
                    .column_index(c)
                    .map_or(true, |idx| row[idx].is_empty())
            })
        })
        .count();
    if incomplete > 0 {
        debug!("{} rows with missing required columns", incomplete);
    }

    for column in required_columns {
        if !table.has_column(column) {
            debug!("Synthesizing absent required column '{}'", column);
        }
        let fill = fill_value(column);
        table.ensure_column(column, fill.clone());
        table.map_column(column, |cell| if cell.is_empty() { fill.clone() } else { cell.clone() });
    }
    table.ensure_column(IMAGE_URL, Cell::text(""));
    table.map_column(IMAGE_URL, |cell| if cell.is_empty() { Cell::text("") } else { cell.clone() });

    let mut output: Vec<&str> = required_columns.to_vec();
    if !output.contains(&IMAGE_URL) {
        output.push(IMAGE_URL);
    }
    table.select(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        ARCHETYPE, ATK, ATTRIBUTE, CARD_EFFECT, CARD_NAME, CONDITION, DEF, LEVEL, RARITY,
        REQUIRED_COLUMNS, SET, SPELL_CATEGORY, TRAP_CATEGORY,
    };

    fn sheet(columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn monster_columns() -> Vec<&'static str> {
        vec![
            CARD_NAME, SET, ARCHETYPE, LEVEL, ATTRIBUTE, RARITY, CONDITION, CARD_EFFECT, ATK, DEF,
            PRICE, INVENTORY_COUNT,
        ]
    }

    fn monster(name: &str, price: Cell, count: Cell) -> Vec<Cell> {
        vec![
            Cell::text(name),
            Cell::text("SV06: Twilight Masquerade"),
            Cell::text("Dragon"),
            Cell::Int(3),
            Cell::text("Dark"),
            Cell::text("Common"),
            Cell::text("New"),
            Cell::text("Recon Directive"),
            Cell::Int(70),
            Cell::Int(50),
            price,
            count,
        ]
    }

    fn spell_columns() -> Vec<&'static str> {
        vec![
            CARD_NAME, SET, ARCHETYPE, LEVEL, ATTRIBUTE, RARITY, CONDITION, CARD_EFFECT,
            SPELL_CATEGORY, PRICE, INVENTORY_COUNT,
        ]
    }

    fn pipeline() -> IngestPipeline {
        IngestPipeline::new(IngestConfig::default())
    }

    fn boxed(workbooks: Vec<InMemoryWorkbook>) -> Vec<Box<dyn SpreadsheetSource>> {
        workbooks
            .into_iter()
            .map(|w| Box::new(w) as Box<dyn SpreadsheetSource>)
            .collect()
    }

    fn load(workbooks: Vec<InMemoryWorkbook>) -> IngestOutcome {
        let mut files = boxed(workbooks);
        pipeline().load_and_validate(&mut files, &REQUIRED_COLUMNS)
    }

    #[test]
    fn test_summary_sheet_is_skipped_and_rows_tagged() {
        let workbook = InMemoryWorkbook::new("cards.xlsx")
            .with_sheet(
                "Monsters",
                sheet(
                    &monster_columns(),
                    vec![monster("Drakloak", Cell::Float(0.25), Cell::Int(335))],
                ),
            )
            .with_sheet(
                "Summary",
                sheet(&[CARD_NAME, PRICE], vec![vec![Cell::text("Total"), Cell::text("lots")]]),
            );

        let outcome = load(vec![workbook]);
        let records = outcome.records();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].card_name, "Drakloak");
        assert_eq!(records[0].card_type, "Monsters");
        assert_eq!(records[0].price, 0.25);
        assert_eq!(records[0].inventory_count, 335);
    }

    #[test]
    fn test_spell_rows_are_relaxed() {
        let workbook = InMemoryWorkbook::new("spells.xlsx").with_sheet(
            "Spells",
            sheet(
                &spell_columns(),
                vec![vec![
                    Cell::text("Raigeki"),
                    Cell::text("LOB"),
                    Cell::text("Foo"),
                    Cell::Int(3),
                    Cell::text("Dark"),
                    Cell::text("Super Rare"),
                    Cell::text("Used"),
                    Cell::text("Destroy all monsters"),
                    Cell::text("Normal"),
                    Cell::Float(4.0),
                    Cell::Int(1),
                ]],
            ),
        );

        let records = load(vec![workbook]).records();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].archetype, PLACEHOLDER);
        assert_eq!(records[0].level.to_string(), PLACEHOLDER);
        assert_eq!(records[0].attribute, PLACEHOLDER);
        // ATK/DEF never appeared in a spell-only upload
        assert_eq!(records[0].atk.to_string(), PLACEHOLDER);
        assert_eq!(records[0].trap_category, PLACEHOLDER);
    }

    #[test]
    fn test_non_numeric_price_rejects_batch() {
        let workbook = InMemoryWorkbook::new("cards.xlsx").with_sheet(
            "Monsters",
            sheet(
                &monster_columns(),
                vec![
                    monster("Drakloak", Cell::Float(0.25), Cell::Int(335)),
                    monster("Dreepy", Cell::text("abc"), Cell::Int(475)),
                ],
            ),
        );

        let outcome = load(vec![workbook]);

        assert!(matches!(
            outcome,
            IngestOutcome::Rejected(ValidationError::NonNumeric { .. })
        ));
        assert!(outcome.into_table().is_empty());
    }

    #[test]
    fn test_no_files_and_all_skipped_are_empty() {
        assert_eq!(load(Vec::new()), IngestOutcome::Empty);

        let only_summary = InMemoryWorkbook::new("summary.xlsx")
            .with_sheet("Summary", sheet(&[CARD_NAME], vec![vec![Cell::text("x")]]));
        assert_eq!(load(vec![only_summary]), IngestOutcome::Empty);
    }

    #[test]
    fn test_absent_type_specific_column_is_synthesized() {
        let workbook = InMemoryWorkbook::new("monsters.xlsx").with_sheet(
            "Monsters",
            sheet(&monster_columns(), vec![monster("Dreepy", Cell::Float(0.01), Cell::Int(475))]),
        );

        let outcome = load(vec![workbook]);
        let IngestOutcome::Loaded(table) = &outcome else {
            panic!("expected loaded outcome, got {:?}", outcome);
        };

        assert!(table
            .column(SPELL_CATEGORY)
            .unwrap()
            .all(|c| c == &Cell::text(PLACEHOLDER)));
        for column in REQUIRED_COLUMNS {
            assert!(table.has_column(column), "missing {column}");
        }
        assert!(table.has_column(IMAGE_URL));
    }

    #[test]
    fn test_missing_mandatory_column_rejects_batch() {
        let columns: Vec<&str> = monster_columns().into_iter().filter(|c| *c != RARITY).collect();
        let mut row = monster("Dreepy", Cell::Float(0.01), Cell::Int(475));
        row.remove(5);
        let workbook =
            InMemoryWorkbook::new("cards.xlsx").with_sheet("Monsters", sheet(&columns, vec![row]));

        let outcome = load(vec![workbook]);

        assert_eq!(
            outcome,
            IngestOutcome::Rejected(ValidationError::MissingColumns(vec![RARITY.to_string()]))
        );
    }

    #[test]
    fn test_bad_file_does_not_abort_batch() {
        let good = InMemoryWorkbook::new("good.xlsx").with_sheet(
            "Monsters",
            sheet(
                &monster_columns(),
                vec![monster("Munkidori", Cell::Float(0.17), Cell::Int(316))],
            ),
        );
        let bad = InMemoryWorkbook::unreadable("bad.xlsx", "corrupt zip");
        let mut files = boxed(vec![bad, good]);

        let run = pipeline().run(&mut files, &REQUIRED_COLUMNS);

        assert!(run.outcome.is_loaded());
        assert_eq!(run.outcome.records().len(), 1);
        let failed: Vec<_> = run.failed_files().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_name, "bad.xlsx");
    }

    #[test]
    fn test_gaps_are_filled_and_unnamed_rows_dropped() {
        let workbook = InMemoryWorkbook::new("cards.xlsx").with_sheet(
            "Monsters",
            sheet(
                &monster_columns(),
                vec![
                    vec![
                        Cell::text("Dreepy"),
                        Cell::Empty,
                        Cell::Empty,
                        Cell::Empty,
                        Cell::Empty,
                        Cell::text("Common"),
                    ],
                    vec![Cell::Empty, Cell::text("SV06")],
                ],
            ),
        );

        let outcome = load(vec![workbook]);
        let IngestOutcome::Loaded(table) = &outcome else {
            panic!("expected loaded outcome, got {:?}", outcome);
        };

        assert_eq!(table.len(), 1);
        for column in REQUIRED_COLUMNS {
            assert!(!table.get(0, column).unwrap().is_empty(), "{column} left empty");
        }
        assert_eq!(table.get(0, SET), Some(&Cell::text(PLACEHOLDER)));
        assert_eq!(table.get(0, PRICE), Some(&Cell::Float(0.0)));
        assert_eq!(table.get(0, INVENTORY_COUNT), Some(&Cell::Int(0)));
    }

    #[test]
    fn test_rows_keep_file_then_sheet_order() {
        let first = InMemoryWorkbook::new("a.xlsx")
            .with_sheet(
                "Monsters",
                sheet(&monster_columns(), vec![monster("A", Cell::Float(1.0), Cell::Int(1))]),
            )
            .with_sheet(
                "Spells",
                sheet(&spell_columns(), vec![vec![Cell::text("B"), Cell::text("LOB")]]),
            );
        let second = InMemoryWorkbook::new("b.xlsx").with_sheet(
            "Traps",
            sheet(&[CARD_NAME, TRAP_CATEGORY], vec![vec![Cell::text("C"), Cell::text("Counter")]]),
        );

        let records = load(vec![first, second]).records();

        let names: Vec<&str> = records.iter().map(|r| r.card_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        let types: Vec<&str> = records.iter().map(|r| r.card_type.as_str()).collect();
        assert_eq!(types, vec!["Monsters", "Spells", "Traps"]);
        assert_eq!(records[2].trap_category, "Counter");
    }

    #[test]
    fn test_sheet_failure_discards_earlier_sheets_of_that_file() {
        struct HalfReadable;

        impl SpreadsheetSource for HalfReadable {
            fn source_name(&self) -> &str {
                "half.xlsx"
            }

            fn sheet_names(&mut self) -> Result<Vec<String>> {
                Ok(vec!["Monsters".to_string(), "Spells".to_string()])
            }

            fn read_sheet(&mut self, sheet: &str) -> Result<Table> {
                if sheet == "Monsters" {
                    Ok(self::sheet(
                        &monster_columns(),
                        vec![monster("Dreepy", Cell::Float(0.01), Cell::Int(475))],
                    ))
                } else {
                    Err(crate::error::CardError::Sheet {
                        source_name: "half.xlsx".to_string(),
                        sheet: sheet.to_string(),
                        message: "truncated".to_string(),
                    })
                }
            }
        }

        let mut files: Vec<Box<dyn SpreadsheetSource>> = vec![Box::new(HalfReadable)];
        let run = pipeline().run(&mut files, &REQUIRED_COLUMNS);

        assert_eq!(run.outcome, IngestOutcome::Empty);
        assert_eq!(run.failed_files().count(), 1);
    }

    #[test]
    fn test_unreadable_file_report_counts_as_failed() {
        let mut files = boxed(Vec::new());
        let mut run = pipeline().run(&mut files, &REQUIRED_COLUMNS);
        run.files.push(FileReport::failed("missing.xlsx", "No such file or directory"));

        let failed: Vec<_> = run.failed_files().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].fingerprint, None);
        assert_eq!(
            failed[0].status,
            FileStatus::Failed {
                error: "No such file or directory".to_string()
            }
        );
    }
}
