// Card pipeline: workbook ingestion and batch processing

pub mod ingestion;
pub mod processing;

// Re-export key types from each stage
pub use ingestion::{IngestOutcome, IngestPipeline, IngestRun};
pub use processing::normalize::{DefaultNormalizer, Normalizer};
pub use processing::quality_gate::{DefaultQualityGate, QualityGate, ValidationError};
