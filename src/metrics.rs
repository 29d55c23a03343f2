//! Ingestion metrics
//!
//! Counters and histograms for ingestion runs. No recorder is installed by
//! this crate; embedding applications may install one to collect them.

/// Metrics collection for the ingestion pipeline
pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_sheet_loaded(rows: usize) {
        ::metrics::counter!("card_album_ingest_sheets_loaded_total").increment(1);
        ::metrics::histogram!("card_album_ingest_sheet_rows").record(rows as f64);
    }

    pub fn record_sheet_skipped() {
        ::metrics::counter!("card_album_ingest_sheets_skipped_total").increment(1);
    }

    pub fn record_file_failed() {
        ::metrics::counter!("card_album_ingest_files_failed_total").increment(1);
    }

    pub fn record_rows_dropped(rows: usize) {
        ::metrics::counter!("card_album_ingest_rows_dropped_total").increment(rows as u64);
    }

    pub fn record_batch_rejected(reason: &'static str) {
        ::metrics::counter!("card_album_ingest_batches_rejected_total", "reason" => reason)
            .increment(1);
    }

    pub fn record_batch_loaded(rows: usize, duration_secs: f64) {
        ::metrics::counter!("card_album_ingest_batches_loaded_total").increment(1);
        ::metrics::counter!("card_album_ingest_rows_total").increment(rows as u64);
        ::metrics::histogram!("card_album_ingest_duration_seconds").record(duration_secs);
    }

    pub fn record_export(rows: usize) {
        ::metrics::counter!("card_album_export_rows_total").increment(rows as u64);
    }
}
