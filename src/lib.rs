pub mod config;
pub mod error;
pub mod export;
pub mod gallery;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod table;

pub use error::{CardError, Result};
pub use pipeline::ingestion::{IngestOutcome, IngestPipeline};
pub use schema::CardRecord;
