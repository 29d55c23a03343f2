//! Filtering, ordering and plain-text rendering of the stored collection.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::schema::{CardRecord, MONSTERS, SPELLS, TRAPS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Which cards to show and how to order them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryFilter {
    pub card_types: Vec<String>,
    pub price_sort: SortOrder,
    pub quantity_sort: SortOrder,
    pub name_sort: SortOrder,
}

impl Default for GalleryFilter {
    fn default() -> Self {
        Self {
            card_types: vec![MONSTERS.to_string(), SPELLS.to_string(), TRAPS.to_string()],
            price_sort: SortOrder::Ascending,
            quantity_sort: SortOrder::Ascending,
            name_sort: SortOrder::Ascending,
        }
    }
}

impl GalleryFilter {
    /// Keep cards of the selected types, then sort by price, quantity and name
    /// in turn. Each sort is stable, so the name order wins and earlier keys
    /// only break ties.
    pub fn apply(&self, cards: &[CardRecord]) -> Vec<CardRecord> {
        let mut selected: Vec<CardRecord> = cards
            .iter()
            .filter(|c| self.card_types.iter().any(|t| t == &c.card_type))
            .cloned()
            .collect();

        selected.sort_by(|a, b| self.price_sort.apply(a.price.total_cmp(&b.price)));
        selected.sort_by(|a, b| {
            self.quantity_sort
                .apply(a.inventory_count.cmp(&b.inventory_count))
        });
        selected.sort_by(|a, b| self.name_sort.apply(a.card_name.cmp(&b.card_name)));
        selected
    }
}

/// One card as a text tile
pub fn render_card(card: &CardRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", card.card_name);
    let _ = writeln!(out, "  {} | {}", card.set, card.card_type);
    if !card.is_relaxed_type() {
        let _ = writeln!(out, "  Level: {}  Attribute: {}", card.level, card.attribute);
        let _ = writeln!(out, "  ATK: {}  DEF: {}", card.atk, card.def);
    }
    let _ = writeln!(out, "  Rarity: {}  Condition: {}", card.rarity, card.condition);
    let _ = writeln!(out, "  Effect: {}", card.card_effect);
    let _ = writeln!(out, "  Price: ${:.2}  Inventory Count: {}", card.price, card.inventory_count);
    if !card.image_url.is_empty() {
        let _ = writeln!(out, "  Image: {}", card.image_url);
    }
    out
}
