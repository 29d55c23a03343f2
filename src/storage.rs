use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{CardError, Result};
use crate::schema::{CardRecord, Stat};

/// Storage for the ingested card collection
pub trait CardStore: Send + Sync {
    /// Replace the stored collection with `cards`
    fn replace_all(&self, cards: &[CardRecord]) -> Result<usize>;

    /// Every stored card in insertion order
    fn fetch_all(&self) -> Result<Vec<CardRecord>>;

    fn count(&self) -> Result<usize> {
        Ok(self.fetch_all()?.len())
    }
}

const CREATE_CARDS: &str = r#"
CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY,
    Card_Name TEXT NOT NULL,
    "Set" TEXT,
    Type TEXT,
    Archetype TEXT,
    Level INTEGER,
    Attribute TEXT,
    Rarity TEXT,
    Condition TEXT,
    Card_Effect TEXT,
    ATK INTEGER,
    DEF INTEGER,
    Spell_Category TEXT,
    Trap_Category TEXT,
    Price REAL,
    Inventory_Count INTEGER,
    Image_URL TEXT
);
"#;

const INSERT_CARD: &str = r#"
INSERT INTO cards (
    Card_Name, "Set", Type, Archetype, Level, Attribute, Rarity, Condition, Card_Effect,
    ATK, DEF, Spell_Category, Trap_Category, Price, Inventory_Count, Image_URL
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
"#;

const SELECT_CARDS: &str = r#"
SELECT Card_Name, "Set", Type, Archetype, Level, Attribute, Rarity, Condition, Card_Effect,
       ATK, DEF, Spell_Category, Trap_Category, Price, Inventory_Count, Image_URL
FROM cards ORDER BY id
"#;

impl ToSql for Stat {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Stat::Value(v) => v.to_sql(),
            Stat::Text(s) => s.to_sql(),
        }
    }
}

impl FromSql for Stat {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(Stat::Value(v)),
            ValueRef::Real(f) if f.fract() == 0.0 => Ok(Stat::Value(f as i64)),
            // INTEGER affinity stores numeric-looking text such as "3.5" as REAL
            ValueRef::Real(f) => Ok(Stat::Text(f.to_string())),
            ValueRef::Null => Ok(Stat::not_specified()),
            ValueRef::Text(_) => String::column_result(value).map(Stat::Text),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<CardRecord> {
    Ok(CardRecord {
        card_name: row.get(0)?,
        set: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        card_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        archetype: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        level: row.get(4)?,
        attribute: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        rarity: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        condition: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        card_effect: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        atk: row.get(9)?,
        def: row.get(10)?,
        spell_category: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
        trap_category: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        price: row.get::<_, Option<f64>>(13)?.unwrap_or(0.0),
        inventory_count: row.get::<_, Option<i64>>(14)?.unwrap_or(0),
        image_url: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
    })
}

/// SQLite-backed card store
pub struct SqliteCardStore {
    conn: Mutex<Connection>,
}

impl SqliteCardStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening card database at {}", db_path.display());
        Self::init(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_CARDS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CardError::Storage("card database connection poisoned".to_string()))
    }
}

impl CardStore for SqliteCardStore {
    fn replace_all(&self, cards: &[CardRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM cards", [])?;
        {
            let mut stmt = tx.prepare(INSERT_CARD)?;
            for card in cards {
                stmt.execute(params![
                    card.card_name,
                    card.set,
                    card.card_type,
                    card.archetype,
                    card.level,
                    card.attribute,
                    card.rarity,
                    card.condition,
                    card.card_effect,
                    card.atk,
                    card.def,
                    card.spell_category,
                    card.trap_category,
                    card.price,
                    card.inventory_count,
                    card.image_url,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Stored {} cards", cards.len());
        Ok(cards.len())
    }

    fn fetch_all(&self) -> Result<Vec<CardRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(SELECT_CARDS)?;
        let rows = stmt.query_map([], card_from_row)?;
        let mut cards = Vec::new();
        for card in rows {
            cards.push(card?);
        }
        Ok(cards)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// In-memory card store for development/testing
#[derive(Default)]
pub struct InMemoryCardStore {
    cards: Mutex<Vec<CardRecord>>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CardStore for InMemoryCardStore {
    fn replace_all(&self, cards: &[CardRecord]) -> Result<usize> {
        let mut stored = self
            .cards
            .lock()
            .map_err(|_| CardError::Storage("card store poisoned".to_string()))?;
        *stored = cards.to_vec();
        Ok(stored.len())
    }

    fn fetch_all(&self) -> Result<Vec<CardRecord>> {
        let stored = self
            .cards
            .lock()
            .map_err(|_| CardError::Storage("card store poisoned".to_string()))?;
        Ok(stored.clone())
    }
}
