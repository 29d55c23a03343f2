use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet read failed: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Spreadsheet write failed: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Sheet '{sheet}' in '{source_name}' is unreadable: {message}")]
    Sheet {
        source_name: String,
        sheet: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, CardError>;
