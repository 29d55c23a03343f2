use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::schema::{INVENTORY_COUNT, NUMERIC_COLUMNS};
use crate::table::{Cell, Table};

/// Why a merged batch was rejected
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Data type error in column '{column}': row {row} value '{value}' is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

impl ValidationError {
    /// Short label used for metrics and the ingest log
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingColumns(_) => "missing_columns",
            ValidationError::NonNumeric { .. } => "non_numeric",
        }
    }
}

/// Trait for the batch-level checks run after normalization
pub trait QualityGate {
    /// Fail unless every required column is present
    fn check_columns(
        &self,
        table: &Table,
        required_columns: &[&str],
    ) -> Result<(), ValidationError>;

    /// Coerce numeric columns, failing the whole table on the first bad cell
    fn validate_data_types(&self, table: Table) -> Result<Table, ValidationError>;
}

/// Default all-or-nothing quality gate for card batches
#[derive(Debug, Default, Clone)]
pub struct DefaultQualityGate;

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self
    }
}

impl QualityGate for DefaultQualityGate {
    fn check_columns(
        &self,
        table: &Table,
        required_columns: &[&str],
    ) -> Result<(), ValidationError> {
        let missing: Vec<String> = required_columns
            .iter()
            .filter(|c| !table.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            debug!("Missing required columns: {}", missing.join(", "));
            Err(ValidationError::MissingColumns(missing))
        }
    }

    fn validate_data_types(&self, mut table: Table) -> Result<Table, ValidationError> {
        for column in NUMERIC_COLUMNS {
            let Some(cells) = table.column(column) else {
                continue;
            };
            let whole_numbers = column == INVENTORY_COUNT;
            let coerced = cells
                .enumerate()
                .map(|(row, cell)| coerce_numeric(column, row, cell, whole_numbers))
                .collect::<Result<Vec<Cell>, ValidationError>>()?;

            let mut values = coerced.into_iter();
            table.map_column(column, |_| values.next().unwrap_or(Cell::Empty));
        }
        Ok(table)
    }
}

fn coerce_numeric(
    column: &str,
    row: usize,
    cell: &Cell,
    whole_numbers: bool,
) -> Result<Cell, ValidationError> {
    let non_numeric = || ValidationError::NonNumeric {
        column: column.to_string(),
        row,
        value: cell.to_string(),
    };
    match cell.to_number() {
        Ok(None) => Ok(Cell::Empty),
        Ok(Some(n)) if whole_numbers => {
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            let in_range = n >= i64::MIN as f64 && n < i64::MAX as f64;
            if n.is_finite() && n.fract() == 0.0 && in_range {
                Ok(Cell::Int(n as i64))
            } else {
                Err(non_numeric())
            }
        }
        Ok(Some(n)) => Ok(Cell::Float(n)),
        Err(_) => Err(non_numeric()),
    }
}

/// True iff every name in `required_columns` is a column of `table`
pub fn validate_columns(table: &Table, required_columns: &[&str]) -> bool {
    DefaultQualityGate::new()
        .check_columns(table, required_columns)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CARD_NAME, PRICE, RARITY};

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_validate_columns_requires_every_column() {
        let t = table(&[CARD_NAME, PRICE], vec![]);
        assert!(validate_columns(&t, &[CARD_NAME, PRICE]));
        assert!(!validate_columns(&t, &[CARD_NAME, PRICE, RARITY]));
    }

    #[test]
    fn test_check_columns_lists_missing() {
        let t = table(&[CARD_NAME], vec![]);
        let err = DefaultQualityGate::new()
            .check_columns(&t, &[CARD_NAME, PRICE, RARITY])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumns(vec![PRICE.to_string(), RARITY.to_string()])
        );
        assert_eq!(err.kind(), "missing_columns");
    }

    #[test]
    fn test_numeric_text_is_coerced_in_place() {
        let t = table(
            &[PRICE, INVENTORY_COUNT],
            vec![
                vec![Cell::text("0.25"), Cell::text("335")],
                vec![Cell::Int(102), Cell::Float(87.0)],
                vec![Cell::Empty, Cell::Empty],
            ],
        );

        let out = DefaultQualityGate::new().validate_data_types(t).unwrap();

        assert_eq!(out.get(0, PRICE), Some(&Cell::Float(0.25)));
        assert_eq!(out.get(0, INVENTORY_COUNT), Some(&Cell::Int(335)));
        assert_eq!(out.get(1, PRICE), Some(&Cell::Float(102.0)));
        assert_eq!(out.get(1, INVENTORY_COUNT), Some(&Cell::Int(87)));
        assert_eq!(out.get(2, PRICE), Some(&Cell::Empty));
    }

    #[test]
    fn test_one_bad_price_fails_the_table() {
        let t = table(
            &[PRICE],
            vec![vec![Cell::Float(0.25)], vec![Cell::text("abc")]],
        );

        let err = DefaultQualityGate::new().validate_data_types(t).unwrap_err();

        assert_eq!(
            err,
            ValidationError::NonNumeric {
                column: PRICE.to_string(),
                row: 1,
                value: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_fractional_inventory_count_fails() {
        let t = table(&[INVENTORY_COUNT], vec![vec![Cell::Float(2.5)]]);
        assert!(DefaultQualityGate::new().validate_data_types(t).is_err());
    }

    #[test]
    fn test_inventory_count_beyond_i64_fails() {
        let t = table(&[INVENTORY_COUNT], vec![vec![Cell::text("1e30")]]);
        let err = DefaultQualityGate::new().validate_data_types(t).unwrap_err();
        assert_eq!(err.kind(), "non_numeric");

        let t = table(&[INVENTORY_COUNT], vec![vec![Cell::Float(1e15)]]);
        let out = DefaultQualityGate::new().validate_data_types(t).unwrap();
        assert_eq!(out.get(0, INVENTORY_COUNT), Some(&Cell::Int(1_000_000_000_000_000)));
    }

    #[test]
    fn test_absent_numeric_columns_pass() {
        let t = table(&[CARD_NAME], vec![vec![Cell::text("Dreepy")]]);
        assert!(DefaultQualityGate::new().validate_data_types(t).is_ok());
    }
}
