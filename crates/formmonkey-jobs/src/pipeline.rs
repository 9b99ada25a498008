//! Extraction pipeline: drives one job from `Pending` to a terminal state.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use formmonkey_core::defaults::{self, PROGRESS_STARTED};
use formmonkey_core::{
    DocumentFormat, Error, ExtractedText, Job, JobStore, JobUpdate, ProgressSink, Result,
};

use crate::extraction::ExtractionRegistry;
use crate::progress::ProgressWriter;

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Largest accepted input file in bytes.
    pub max_file_size: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size: defaults::MAX_FILE_SIZE_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MAX_FILE_SIZE_BYTES` | `10485760` | Reject larger input files |
    pub fn from_env() -> Self {
        let max_file_size = std::env::var("MAX_FILE_SIZE_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults::MAX_FILE_SIZE_BYTES);
        Self { max_file_size }
    }

    /// Set the maximum input size.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }
}

/// Turns uploaded documents into raw text stored on their job record.
#[derive(Clone)]
pub struct ExtractionPipeline {
    store: Arc<dyn JobStore>,
    registry: Arc<ExtractionRegistry>,
    config: PipelineConfig,
}

impl ExtractionPipeline {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<ExtractionRegistry>) -> Self {
        Self {
            store,
            registry,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run extraction for one job and return its terminal record.
    ///
    /// - Creates the `Pending` record if the upload step did not.
    /// - Unsupported extensions fail with `UnsupportedFormat` and leave the
    ///   job `Pending`.
    /// - Extraction failures are persisted as `Failed` before the error is
    ///   returned.
    /// - A job deleted mid-run yields `NotFound` and no further writes.
    #[instrument(skip(self))]
    pub async fn process(&self, file_path: &Path, job_id: &str, user_id: &str) -> Result<Job> {
        let start = Instant::now();

        if self.store.get(job_id).await?.is_none() {
            self.store
                .put(Job::new(job_id, user_id, file_path.display().to_string()))
                .await?;
            debug!("Created pending job record");
        }

        let format = DocumentFormat::from_path(file_path)?;
        let adapter = self.registry.get(format)?;

        self.store
            .update(
                job_id,
                JobUpdate {
                    progress_message: Some(format!("Extracting {} document", format)),
                    ..JobUpdate::processing(PROGRESS_STARTED)
                },
            )
            .await?;
        info!(format = %format, adapter = adapter.name(), "Job processing started");

        let (sink, writer) = ProgressWriter::spawn(self.store.clone(), job_id.to_string());
        let outcome = self
            .read_and_extract(file_path, format, adapter.as_ref(), sink.clone())
            .await;
        drop(sink);
        writer.finish().await;

        // The writer saw the record vanish: abandon without further writes.
        if self.store.get(job_id).await?.is_none() {
            info!("Job deleted during extraction, abandoning");
            return Err(Error::NotFound(format!("job {}", job_id)));
        }

        match outcome {
            Ok(extracted) => {
                let metadata = extracted.metadata(format);
                let job = self
                    .store
                    .update(job_id, JobUpdate::completed(extracted.text, Some(metadata)))
                    .await?;
                info!(
                    format = %format,
                    chars = job.content.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job completed"
                );
                Ok(job)
            }
            Err(cause) => {
                let failure = Error::extraction(
                    format!("{} extraction of '{}'", format, file_path.display()),
                    cause,
                );
                error!(
                    error = %failure,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job failed"
                );
                if let Err(e) = self
                    .store
                    .update(job_id, JobUpdate::failed(failure.chain()))
                    .await
                {
                    warn!(error = %e, "Failed to persist job failure");
                    if e.is_not_found() {
                        return Err(e);
                    }
                }
                Err(failure)
            }
        }
    }

    async fn read_and_extract(
        &self,
        file_path: &Path,
        format: DocumentFormat,
        adapter: &dyn formmonkey_core::ExtractionAdapter,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ExtractedText> {
        let size = tokio::fs::metadata(file_path).await?.len();
        if size == 0 {
            return Err(Error::InvalidInput(format!(
                "'{}' is empty",
                file_path.display()
            )));
        }
        if size > self.config.max_file_size {
            return Err(Error::InvalidInput(format!(
                "'{}' is {} bytes, limit is {}",
                file_path.display(),
                size,
                self.config.max_file_size
            )));
        }

        let data = tokio::fs::read(file_path).await?;
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("document.{}", format));
        adapter.extract(data, &filename, sink).await
    }
}
