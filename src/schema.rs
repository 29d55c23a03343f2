//! Canonical card record shape shared by ingestion, storage, gallery and export.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::table::{Cell, Table};

/// Value written into required fields that carry no data.
pub const PLACEHOLDER: &str = "Not specified";

pub const CARD_NAME: &str = "Card Name";
pub const SET: &str = "Set";
pub const TYPE: &str = "Type";
pub const ARCHETYPE: &str = "Archetype";
pub const LEVEL: &str = "Level";
pub const ATTRIBUTE: &str = "Attribute";
pub const RARITY: &str = "Rarity";
pub const CONDITION: &str = "Condition";
pub const CARD_EFFECT: &str = "Card Effect";
pub const ATK: &str = "ATK";
pub const DEF: &str = "DEF";
pub const SPELL_CATEGORY: &str = "Spell Category";
pub const TRAP_CATEGORY: &str = "Trap Category";
pub const PRICE: &str = "Price";
pub const INVENTORY_COUNT: &str = "Inventory Count";
pub const IMAGE_URL: &str = "Image URL";

/// Required columns of the unified table, in output order.
pub const REQUIRED_COLUMNS: [&str; 15] = [
    CARD_NAME,
    SET,
    TYPE,
    ARCHETYPE,
    LEVEL,
    ATTRIBUTE,
    RARITY,
    CONDITION,
    CARD_EFFECT,
    ATK,
    DEF,
    SPELL_CATEGORY,
    TRAP_CATEGORY,
    PRICE,
    INVENTORY_COUNT,
];

/// Columns coerced to numbers during validation.
pub const NUMERIC_COLUMNS: [&str; 2] = [PRICE, INVENTORY_COUNT];

/// Columns that only apply to some card types. A sheet set covering a single
/// card type may lack them entirely; they are synthesized instead of failing
/// the column check.
pub const TYPE_SPECIFIC_COLUMNS: [&str; 7] = [
    ARCHETYPE,
    LEVEL,
    ATTRIBUTE,
    ATK,
    DEF,
    SPELL_CATEGORY,
    TRAP_CATEGORY,
];

/// Sheets that never hold card rows.
pub const SKIPPED_SHEETS: [&str; 1] = ["Summary"];

pub const SPELLS: &str = "Spells";
pub const TRAPS: &str = "Traps";
pub const MONSTERS: &str = "Monsters";

/// Card types for which monster attributes do not apply.
pub const RELAXED_TYPES: [&str; 2] = [SPELLS, TRAPS];

/// Fields overwritten with the placeholder for [`RELAXED_TYPES`].
pub const RELAXED_COLUMNS: [&str; 3] = [ARCHETYPE, LEVEL, ATTRIBUTE];

pub fn is_relaxed_type(card_type: &str) -> bool {
    RELAXED_TYPES.contains(&card_type)
}

pub fn is_numeric_column(column: &str) -> bool {
    NUMERIC_COLUMNS.contains(&column)
}

/// Required columns that must be present in the merged input.
pub fn mandatory_columns<'a>(required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|c| !TYPE_SPECIFIC_COLUMNS.contains(c))
        .collect()
}

/// Level, ATK or DEF: a whole number, or free text such as the placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stat {
    Value(i64),
    Text(String),
}

impl Stat {
    pub fn not_specified() -> Self {
        Stat::Text(PLACEHOLDER.to_string())
    }

    pub fn as_value(&self) -> Option<i64> {
        match self {
            Stat::Value(v) => Some(*v),
            Stat::Text(_) => None,
        }
    }

    fn from_cell(cell: &Cell) -> Self {
        match cell {
            Cell::Int(n) => Stat::Value(*n),
            Cell::Float(f) if f.fract() == 0.0 => Stat::Value(*f as i64),
            Cell::Text(s) => match s.trim().parse::<i64>() {
                Ok(n) => Stat::Value(n),
                Err(_) => Stat::Text(s.clone()),
            },
            other => other
                .to_text()
                .map(Stat::Text)
                .unwrap_or_else(Stat::not_specified),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Value(v) => write!(f, "{v}"),
            Stat::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One row of the unified card table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub card_name: String,
    pub set: String,
    #[serde(rename = "type")]
    pub card_type: String,
    pub archetype: String,
    pub level: Stat,
    pub attribute: String,
    pub rarity: String,
    pub condition: String,
    pub card_effect: String,
    pub atk: Stat,
    pub def: Stat,
    pub spell_category: String,
    pub trap_category: String,
    pub price: f64,
    pub inventory_count: i64,
    #[serde(default)]
    pub image_url: String,
}

impl CardRecord {
    /// Convert one row of a finished ingestion table.
    ///
    /// Missing text fields read as the placeholder, missing numbers as zero.
    pub fn from_row(table: &Table, row: usize) -> Self {
        let text = |column: &str| {
            table
                .get(row, column)
                .and_then(Cell::to_text)
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        };
        let stat = |column: &str| {
            table
                .get(row, column)
                .map(Stat::from_cell)
                .unwrap_or_else(Stat::not_specified)
        };
        let number = |column: &str| {
            table
                .get(row, column)
                .and_then(|c| c.to_number().ok().flatten())
                .unwrap_or(0.0)
        };

        Self {
            card_name: text(CARD_NAME),
            set: text(SET),
            card_type: text(TYPE),
            archetype: text(ARCHETYPE),
            level: stat(LEVEL),
            attribute: text(ATTRIBUTE),
            rarity: text(RARITY),
            condition: text(CONDITION),
            card_effect: text(CARD_EFFECT),
            atk: stat(ATK),
            def: stat(DEF),
            spell_category: text(SPELL_CATEGORY),
            trap_category: text(TRAP_CATEGORY),
            price: number(PRICE),
            inventory_count: number(INVENTORY_COUNT) as i64,
            image_url: table
                .get(row, IMAGE_URL)
                .and_then(Cell::to_text)
                .unwrap_or_default(),
        }
    }

    pub fn is_relaxed_type(&self) -> bool {
        is_relaxed_type(&self.card_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandatory_columns_exclude_type_specific_fields() {
        let mandatory = mandatory_columns(&REQUIRED_COLUMNS);
        assert!(mandatory.contains(&CARD_NAME));
        assert!(mandatory.contains(&PRICE));
        assert!(!mandatory.contains(&SPELL_CATEGORY));
        assert!(!mandatory.contains(&LEVEL));
        assert_eq!(mandatory.len(), REQUIRED_COLUMNS.len() - TYPE_SPECIFIC_COLUMNS.len());
    }

    #[test]
    fn test_from_row_reads_numbers_and_stats() {
        let columns = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut table = Table::new(columns);
        table.push_row(vec![
            Cell::text("Drakloak"),
            Cell::text("SV06: Twilight Masquerade"),
            Cell::text("Monsters"),
            Cell::text("Dragon"),
            Cell::Float(3.0),
            Cell::text("Dark"),
            Cell::text("Common"),
            Cell::text("New"),
            Cell::text("Recon Directive"),
            Cell::Int(70),
            Cell::text("?"),
            Cell::text(PLACEHOLDER),
            Cell::text(PLACEHOLDER),
            Cell::Float(0.25),
            Cell::Int(335),
        ]);

        let record = CardRecord::from_row(&table, 0);

        assert_eq!(record.card_name, "Drakloak");
        assert_eq!(record.level, Stat::Value(3));
        assert_eq!(record.atk, Stat::Value(70));
        assert_eq!(record.def, Stat::Text("?".to_string()));
        assert_eq!(record.price, 0.25);
        assert_eq!(record.inventory_count, 335);
        assert_eq!(record.image_url, "");
    }

    #[test]
    fn test_card_record_serializes_type_field() {
        let record = CardRecord {
            card_name: "Pot of Greed".to_string(),
            set: "LOB".to_string(),
            card_type: SPELLS.to_string(),
            archetype: PLACEHOLDER.to_string(),
            level: Stat::not_specified(),
            attribute: PLACEHOLDER.to_string(),
            rarity: "Rare".to_string(),
            condition: "Used".to_string(),
            card_effect: "Draw 2 cards".to_string(),
            atk: Stat::not_specified(),
            def: Stat::not_specified(),
            spell_category: "Normal".to_string(),
            trap_category: PLACEHOLDER.to_string(),
            price: 1.5,
            inventory_count: 4,
            image_url: String::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "Spells");
        assert_eq!(json["level"], PLACEHOLDER);
        assert!(record.is_relaxed_type());
    }
}
