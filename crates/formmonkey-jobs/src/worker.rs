//! Background worker running extraction jobs off the request path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use formmonkey_core::{defaults, Error, JobStore, Result};

use crate::extraction::ExtractionRegistry;
use crate::pipeline::{ExtractionPipeline, PipelineConfig};

/// Configuration for the job worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Requests buffered before `submit` waits.
    pub queue_capacity: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        Self {
            max_concurrent_jobs,
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
            enabled,
        }
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// One document to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub file_path: PathBuf,
    pub job_id: String,
    pub user_id: String,
}

impl ExtractionRequest {
    pub fn new(
        file_path: impl Into<PathBuf>,
        job_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            job_id: job_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Request with a freshly generated job id.
    pub fn for_upload(file_path: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        Self::new(file_path, Uuid::now_v7().to_string(), user_id)
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted,
    /// A job was started.
    JobStarted { job_id: String },
    /// A job completed successfully.
    JobCompleted { job_id: String, duration_ms: u64 },
    /// A job failed; its record carries the error.
    JobFailed { job_id: String, error: String },
    /// The job was deleted while running.
    JobAbandoned { job_id: String },
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    submit_tx: mpsc::Sender<ExtractionRequest>,
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Queue a document for extraction.
    pub async fn submit(&self, request: ExtractionRequest) -> Result<()> {
        self.submit_tx
            .send(request)
            .await
            .map_err(|_| Error::Internal("Job worker is not running".into()))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Stop accepting work and wait for running jobs to finish.
    pub async fn shutdown(self) -> Result<()> {
        // A send error means the loop already exited.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Job worker task failed: {}", e)))
    }
}

/// Job worker that runs extraction requests concurrently.
pub struct JobWorker {
    pipeline: ExtractionPipeline,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(pipeline: ExtractionPipeline, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            pipeline,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (submit_tx, submit_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(self.run(submit_rx, shutdown_rx));

        WorkerHandle {
            submit_tx,
            shutdown_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip_all)]
    async fn run(
        self,
        mut submit_rx: mpsc::Receiver<ExtractionRequest>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        let max_concurrent = self.config.max_concurrent_jobs.max(1);
        info!(max_concurrent, "Job worker started");
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Job worker received shutdown signal");
                    break;
                }
                request = submit_rx.recv(), if tasks.len() < max_concurrent => {
                    match request {
                        Some(request) => {
                            let pipeline = self.pipeline.clone();
                            let event_tx = self.event_tx.clone();
                            tasks.spawn(execute(pipeline, event_tx, request));
                        }
                        None => {
                            debug!("All worker handles dropped");
                            break;
                        }
                    }
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked");
                    }
                }
            }
        }

        submit_rx.close();
        let mut left_queued = 0usize;
        while submit_rx.try_recv().is_ok() {
            left_queued += 1;
        }
        if left_queued > 0 {
            warn!(left_queued, "Queued extraction requests dropped at shutdown");
        }

        debug!(running = tasks.len(), "Draining running jobs");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Job task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }
}

async fn execute(
    pipeline: ExtractionPipeline,
    event_tx: broadcast::Sender<WorkerEvent>,
    request: ExtractionRequest,
) {
    let start = Instant::now();
    let job_id = request.job_id.clone();
    let _ = event_tx.send(WorkerEvent::JobStarted {
        job_id: job_id.clone(),
    });

    let event = match pipeline
        .process(&request.file_path, &request.job_id, &request.user_id)
        .await
    {
        Ok(_) => WorkerEvent::JobCompleted {
            job_id,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) if e.is_not_found() => WorkerEvent::JobAbandoned { job_id },
        Err(e) => WorkerEvent::JobFailed {
            job_id,
            error: e.to_string(),
        },
    };
    let _ = event_tx.send(event);
}

/// Builder for creating a job worker.
pub struct WorkerBuilder {
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
    pipeline_config: PipelineConfig,
    registry: Option<ExtractionRegistry>,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            config: WorkerConfig::default(),
            pipeline_config: PipelineConfig::default(),
            registry: None,
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the pipeline configuration.
    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    /// Set the extraction registry. Defaults to PDF and DOCX.
    pub fn with_extraction_registry(mut self, registry: ExtractionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build and return the worker.
    pub fn build(self) -> JobWorker {
        let registry = self
            .registry
            .unwrap_or_else(ExtractionRegistry::with_defaults);
        let pipeline = ExtractionPipeline::new(self.store, Arc::new(registry))
            .with_config(self.pipeline_config);
        JobWorker::new(pipeline, self.config)
    }
}
