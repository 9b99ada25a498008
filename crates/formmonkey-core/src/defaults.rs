//! Centralized default constants for the FormMonkey pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// JOB STORE
// =============================================================================

/// Hours a job record is retained after its last update.
pub const JOB_EXPIRATION_HOURS: i64 = 24;

/// Default Redis URL for the durable job backend.
pub const REDIS_URL: &str = "redis://localhost:6379/0";

/// Key prefix for job records in the durable backend.
pub const JOB_KEY_PREFIX: &str = "job:";

/// Keys requested per SCAN page when listing jobs.
pub const JOB_SCAN_PAGE_SIZE: usize = 100;

/// Default `limit` for job listings.
pub const JOB_LIST_LIMIT: usize = 100;

/// Document type assigned before classification.
pub const DEFAULT_DOCUMENT_TYPE: &str = "Legal Document";

// =============================================================================
// EXTRACTION
// =============================================================================

/// Progress written when a job enters `Processing`.
pub const PROGRESS_STARTED: u8 = 10;

/// Lower bound of the extractor-reported progress band.
pub const PROGRESS_EXTRACT_START: u8 = 20;

/// Upper bound of the extractor-reported progress band.
pub const PROGRESS_EXTRACT_END: u8 = 80;

/// Progress of a completed job.
pub const PROGRESS_DONE: u8 = 100;

/// Maximum accepted upload size (10 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Timeout for each external extraction command (pdfinfo, pdftotext).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// PDFs above this page count are extracted in batches instead of per page.
pub const LARGE_PDF_PAGE_THRESHOLD: usize = 200;

/// Pages per `pdftotext` invocation for large PDFs.
pub const PDF_BATCH_PAGES: usize = 25;

/// DOCX body elements processed between progress ticks.
pub const DOCX_PROGRESS_EVERY: usize = 25;

/// Separator between table cells in reconstructed DOCX text.
pub const CELL_SEPARATOR: &str = " | ";

/// Separator between pages in extracted PDF text (form feed, as poppler emits).
pub const PAGE_SEPARATOR: char = '\u{0c}';

// =============================================================================
// WORKER
// =============================================================================

/// Maximum concurrent extraction jobs.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Buffered extraction requests before `submit` applies backpressure.
pub const JOB_QUEUE_CAPACITY: usize = 256;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// PREDICTION
// =============================================================================

/// Default model provider name.
pub const ML_MODEL_TYPE: &str = "local";

/// Upper bound on a model provider call before falling back to rules.
pub const ML_TIMEOUT_MS: u64 = 5_000;

/// Base confidence of party-name rule matches.
pub const PARTY_CONFIDENCE: f32 = 0.85;

/// Base confidence of date rule matches.
pub const DATE_CONFIDENCE: f32 = 0.80;

/// Base confidence of amount rule matches.
pub const AMOUNT_CONFIDENCE: f32 = 0.75;

/// Base confidence of email rule matches.
pub const EMAIL_CONFIDENCE: f32 = 0.90;

/// Base confidence of phone rule matches.
pub const PHONE_CONFIDENCE: f32 = 0.70;

/// Fields below this confidence are overwritten from the profile.
pub const PROFILE_OVERRIDE_THRESHOLD: f32 = 0.7;

/// Confidence assigned to profile-sourced values.
pub const PROFILE_CONFIDENCE: f32 = 0.9;

// =============================================================================
// PREFERENCES
// =============================================================================

/// Maximum suggested values returned per field.
pub const SUGGESTION_LIMIT: usize = 3;

/// Confidence of a suggestion from the requested document type.
pub const SUGGESTION_CONFIDENCE_EXACT: f32 = 0.8;

/// Confidence of a suggestion borrowed from another document type.
pub const SUGGESTION_CONFIDENCE_FALLBACK: f32 = 0.6;
