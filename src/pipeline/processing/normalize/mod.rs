use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::schema::{is_relaxed_type, CARD_NAME, PLACEHOLDER, RELAXED_COLUMNS, SET, TYPE};
use crate::table::{Cell, Table};

/// Trait for the table-wide cleanup applied to a merged batch
pub trait Normalizer {
    /// Transform a merged table into its cleaned form
    fn prepare(&self, table: Table) -> Table;
}

/// Default card normalizer
///
/// Steps, in order:
/// 1. `Card Name` and `Set` cells become text
/// 2. rows without a `Card Name` are dropped
/// 3. `Archetype`, `Level` and `Attribute` are overwritten with the
///    placeholder for Spells and Traps rows
#[derive(Debug, Default, Clone)]
pub struct DefaultNormalizer;

impl DefaultNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn coerce_text_columns(table: &mut Table) {
        for column in [CARD_NAME, SET] {
            table.map_column(column, |cell| match cell.to_text() {
                Some(text) => Cell::Text(text),
                None => Cell::Empty,
            });
        }
    }

    fn drop_unnamed(table: &mut Table) {
        let Some(name_idx) = table.column_index(CARD_NAME) else {
            // Column validation reports the missing column
            return;
        };
        let before = table.len();
        table.retain_rows(|_, row| !row[name_idx].is_empty());
        let dropped = before - table.len();
        if dropped > 0 {
            debug!("Dropped {} rows without a card name", dropped);
        }
    }

    fn relax_non_monsters(table: &mut Table) {
        let Some(type_idx) = table.column_index(TYPE) else {
            return;
        };
        let relaxed: Vec<bool> = table
            .rows()
            .iter()
            .map(|row| {
                row[type_idx]
                    .to_text()
                    .is_some_and(|t| is_relaxed_type(&t))
            })
            .collect();
        if !relaxed.contains(&true) {
            return;
        }

        for column in RELAXED_COLUMNS {
            table.ensure_column(column, Cell::Empty);
            let mut flags = relaxed.iter();
            table.map_column(column, |cell| {
                if flags.next().copied().unwrap_or(false) {
                    Cell::text(PLACEHOLDER)
                } else {
                    cell.clone()
                }
            });
        }
    }
}

impl Normalizer for DefaultNormalizer {
    fn prepare(&self, mut table: Table) -> Table {
        Self::coerce_text_columns(&mut table);
        Self::drop_unnamed(&mut table);
        Self::relax_non_monsters(&mut table);
        table
    }
}

fn whitespace_run() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Trim a sheet header and collapse internal whitespace runs to one space.
pub fn clean_header(raw: &str) -> String {
    whitespace_run().replace_all(raw.trim(), " ").into_owned()
}
