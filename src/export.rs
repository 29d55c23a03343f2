//! Export of the stored collection into a marketplace listing workbook.
//!
//! Stored fields are renamed through [`FIELD_MAPPING`], every other listing
//! column gets its entry from [`DEFAULT_VALUES`] (or an empty string), and
//! columns follow the header row of the listing template.

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CardError, Result};
use crate::metrics::IngestMetrics;
use crate::pipeline::processing::normalize::clean_header;
use crate::schema::CardRecord;
use crate::table::{Cell, Table};

/// Stored column name to listing column name
pub const FIELD_MAPPING: [(&str, &str); 6] = [
    ("Card_Name", "C:Card Name"),
    ("Set", "C:Set"),
    ("Rarity", "C:Grade"),
    ("Condition", "CD:Card Condition - (ID: 40001)"),
    ("Price", "Start Price"),
    ("Inventory_Count", "Quantity"),
];

/// Fallback values for listing columns the card record does not carry.
/// Order doubles as the built-in listing column order.
pub const DEFAULT_VALUES: [(&str, &str); 60] = [
    ("*Action(SiteID=US|Country=US|Currency=USD|Version=941)", "Add"),
    ("CustomLabel", "YGO-001"),
    ("*Category", "183454"),
    ("StoreCategory", ""),
    ("*Title", "Yu-Gi-Oh! Blue-Eyes White Dragon"),
    ("Subtitle", "Limited Edition"),
    ("Relationship", ""),
    ("RelationshipDetails", ""),
    ("*ConditionID", "4000"),
    ("Condition Descriptor Name 1", "Condition Descriptor"),
    ("Condition Descriptor Value 1", "40001"),
    ("CD:Professional Grader - (ID: 27501)", ""),
    ("CD:Grade - (ID: 27502)", ""),
    ("CDA:Certification Number - (ID: 27503)", ""),
    ("CD:Card Condition - (ID: 40001)", "40001"),
    ("*C:Franchise", "Yu-Gi-Oh!"),
    ("C:Set", "Legend of Blue Eyes White Dragon"),
    ("C:Manufacturer", "Konami"),
    ("C:Year Manufactured", "2002"),
    ("C:Character", "Blue-Eyes White Dragon"),
    ("C:TV Show", "Yu-Gi-Oh!"),
    ("C:Autograph Authentication", ""),
    ("C:Grade", "Limited Edition"),
    ("C:Features", ""),
    ("C:Parallel/Variety", ""),
    ("C:Featured Person/Artist", ""),
    ("C:Autographed", "No"),
    ("C:Type", "Trading Card"),
    ("C:Card Number", "LOB-001"),
    ("C:Card Name", "Blue-Eyes White Dragon"),
    ("C:Movie", ""),
    ("C:Age Level", "10+"),
    ("C:Signed By", ""),
    ("C:Material", "Card Stock"),
    ("C:Genre", "Collectible Card Game"),
    ("C:Graded", "No"),
    ("C:Card Size", "Standard"),
    ("C:Language", "English"),
    ("C:Manufacturered in", "Japan"),
    ("P:UPC", ""),
    ("Start Price", "20.00"),
    ("Quantity", "1"),
    ("Item photo URL", "https://www.example.com/image.jpg"),
    ("P:EAN", ""),
    ("Shipping Profile Name", "Shipping-Default"),
    ("Return Profile Name", "Return-Default"),
    ("Payment Profile Name", "Payment-Policy-Default"),
    ("ShippingType", "Flat"),
    ("ShippingService", "USPSFirstClass"),
    ("ShippingServiceCost", "3.50"),
    ("ShippingServiceAdditionalCost", "0.50"),
    ("ShippingServicePriority", "1"),
    ("Max Dispatch Time", "1"),
    ("Returns Accepted Option", "ReturnsAccepted"),
    ("Returns Within Option", "Days_30"),
    ("Refund Option", "MoneyBack"),
    ("Return Shipping Cost Paid By", "Buyer"),
    ("ListingDuration", "Days_7"),
    ("Location", "New York, NY"),
    (
        "Description",
        "This is a limited edition Yu-Gi-Oh! Blue-Eyes White Dragon card from the Legend of \
         Blue Eyes White Dragon set.",
    ),
];

const BUILTIN_SHEET_NAME: &str = "Listing";

/// Column layout of the output workbook
#[derive(Debug, Clone, PartialEq)]
pub struct ListingTemplate {
    pub sheet_name: String,
    pub columns: Vec<String>,
}

impl ListingTemplate {
    pub fn builtin() -> Self {
        Self {
            sheet_name: BUILTIN_SHEET_NAME.to_string(),
            columns: DEFAULT_VALUES.iter().map(|(c, _)| c.to_string()).collect(),
        }
    }

    /// Header row of the first sheet of a template workbook
    pub fn from_workbook<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut workbook = open_workbook_auto(path)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| {
                CardError::MissingField(format!("sheets in template {}", path.display()))
            })?;
        let range = workbook.worksheet_range(&sheet_name)?;
        let columns: Vec<String> = range
            .rows()
            .next()
            .map(|header| {
                header
                    .iter()
                    .filter(|d| !matches!(d, Data::Empty))
                    .map(|d| clean_header(&d.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        if columns.is_empty() {
            return Err(CardError::MissingField(format!(
                "header row in template {}",
                path.display()
            )));
        }
        Ok(Self { sheet_name, columns })
    }

    /// Template from the configured path, or the built-in layout
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_workbook(path),
            None => Ok(Self::builtin()),
        }
    }
}

/// Value of a stored column for one card
fn stored_value(card: &CardRecord, column: &str) -> Option<Cell> {
    let cell = match column {
        "Card_Name" => Cell::text(card.card_name.as_str()),
        "Set" => Cell::text(card.set.as_str()),
        "Type" => Cell::text(card.card_type.as_str()),
        "Archetype" => Cell::text(card.archetype.as_str()),
        "Level" => stat_cell(&card.level),
        "Attribute" => Cell::text(card.attribute.as_str()),
        "Rarity" => Cell::text(card.rarity.as_str()),
        "Condition" => Cell::text(card.condition.as_str()),
        "Card_Effect" => Cell::text(card.card_effect.as_str()),
        "ATK" => stat_cell(&card.atk),
        "DEF" => stat_cell(&card.def),
        "Spell_Category" => Cell::text(card.spell_category.as_str()),
        "Trap_Category" => Cell::text(card.trap_category.as_str()),
        "Price" => Cell::Float(card.price),
        "Inventory_Count" => Cell::Int(card.inventory_count),
        "Image_URL" => Cell::text(card.image_url.as_str()),
        _ => return None,
    };
    Some(cell)
}

fn stat_cell(stat: &crate::schema::Stat) -> Cell {
    match stat.as_value() {
        Some(v) => Cell::Int(v),
        None => Cell::text(stat.to_string()),
    }
}

fn listing_value(card: &CardRecord, column: &str) -> Cell {
    // Renamed columns take the stored value; renamed-away stored names do not
    // appear under their old name.
    if let Some((stored, _)) = FIELD_MAPPING.iter().find(|(_, listing)| *listing == column) {
        if let Some(cell) = stored_value(card, stored) {
            return cell;
        }
    }
    let renamed_away = FIELD_MAPPING.iter().any(|(stored, _)| *stored == column);
    if !renamed_away {
        if let Some(cell) = stored_value(card, column) {
            return cell;
        }
    }
    DEFAULT_VALUES
        .iter()
        .find(|(c, _)| *c == column)
        .map(|(_, v)| Cell::text(*v))
        .unwrap_or_else(|| Cell::text(""))
}

/// Map stored cards onto the template's columns
pub fn map_fields(cards: &[CardRecord], template: &ListingTemplate) -> Table {
    let mut table = Table::new(template.columns.clone());
    for card in cards {
        table.push_row(
            template
                .columns
                .iter()
                .map(|column| listing_value(card, column))
                .collect(),
        );
    }
    table
}

/// Write a table as a single-sheet workbook
pub fn write_xlsx<P: AsRef<Path>>(table: &Table, sheet_name: &str, path: P) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string(0, col as u16, name.as_str())?;
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    worksheet.write_string(row_num, col, s.as_str())?;
                }
                Cell::Int(n) => {
                    worksheet.write_number(row_num, col, *n as f64)?;
                }
                Cell::Float(f) => {
                    worksheet.write_number(row_num, col, *f)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
            }
        }
    }

    workbook.save(path.as_ref())?;
    Ok(())
}

/// Export `cards` through `template` to `output_path`
pub fn export_collection(
    cards: &[CardRecord],
    template: &ListingTemplate,
    output_path: &Path,
) -> Result<PathBuf> {
    let table = map_fields(cards, template);
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    write_xlsx(&table, &template.sheet_name, output_path)?;
    IngestMetrics::record_export(cards.len());
    info!("Exported {} cards to {}", cards.len(), output_path.display());
    Ok(output_path.to_path_buf())
}
