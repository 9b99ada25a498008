//! formmonkey: run the document pipeline from the command line.
//!
//! ```text
//! formmonkey process lease.pdf --user u1
//! formmonkey predict lease.docx --profile me.json
//! formmonkey learn --profile me.json --document-type "Lease Agreement" --feedback fixes.json
//! formmonkey suggest --profile me.json --field "Party A"
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr (or `LOG_FILE`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formmonkey_core::{FieldFeedback, Job, JobStatus, JobStore, ProfileStore, UserProfile};
use formmonkey_db::{Database, MemoryProfileStore, StoreConfig};
use formmonkey_inference::{
    PredictionConfig, PredictionEngine, PreferenceLearner, ProviderRegistry,
};
use formmonkey_jobs::{
    ExtractionPipeline, ExtractionRegistry, ExtractionRequest, PipelineConfig, WorkerBuilder,
    WorkerConfig, WorkerEvent,
};

#[derive(Parser)]
#[command(name = "formmonkey")]
#[command(author, version, about = "Legal document extraction, field prediction and preference learning")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from a PDF or DOCX file and print the job record
    Process {
        /// Document to extract
        file: PathBuf,

        /// Owner of the job
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Job id (default: a fresh time-ordered id)
        #[arg(short, long)]
        job_id: Option<String>,
    },

    /// Extract a document, then predict its fields
    Predict {
        /// Document to extract
        file: PathBuf,

        /// Profile JSON used for enrichment
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Document type (default: classified from the text)
        #[arg(short, long)]
        document_type: Option<String>,
    },

    /// Apply field corrections to a profile file
    Learn {
        /// Profile JSON, created if missing
        #[arg(short, long)]
        profile: PathBuf,

        /// Document type the corrections belong to
        #[arg(short, long)]
        document_type: String,

        /// JSON array of {name, value, type, is_correct}
        #[arg(short, long)]
        feedback: PathBuf,

        /// User id for a newly created profile
        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// Print ranked suggestions for a field
    Suggest {
        /// Profile JSON
        #[arg(short, long)]
        profile: PathBuf,

        /// Field name, e.g. "Party A"
        #[arg(long)]
        field: String,

        /// Document type to search first
        #[arg(short, long)]
        document_type: Option<String>,
    },
}

/// Initialize tracing.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("formmonkey.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(log_ansi.unwrap_or(false)),
                )
                .init();
        }
        Some(guard)
    } else {
        // stdout carries command output
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Process {
            file,
            user,
            job_id,
        } => cmd_process(&file, &user, job_id).await,
        Commands::Predict {
            file,
            profile,
            document_type,
        } => cmd_predict(&file, profile.as_deref(), document_type.as_deref()).await,
        Commands::Learn {
            profile,
            document_type,
            feedback,
            user,
        } => cmd_learn(&profile, &document_type, &feedback, &user).await,
        Commands::Suggest {
            profile,
            field,
            document_type,
        } => cmd_suggest(&profile, &field, document_type.as_deref()).await,
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Error unless the job reached `Completed`.
fn ensure_completed(job: &Job) -> anyhow::Result<()> {
    match job.status {
        JobStatus::Completed => Ok(()),
        JobStatus::Failed => bail!(
            "job {} failed: {}",
            job.job_id,
            job.error.as_deref().unwrap_or("unknown error")
        ),
        status => bail!("job {} did not complete (status {})", job.job_id, status),
    }
}

/// Drive the pipeline on the current task.
async fn process_inline(
    store: Arc<dyn JobStore>,
    file: &Path,
    job_id: &str,
    user: &str,
) -> anyhow::Result<Job> {
    ExtractionPipeline::new(store, Arc::new(ExtractionRegistry::with_defaults()))
        .with_config(PipelineConfig::from_env())
        .process(file, job_id, user)
        .await
        .with_context(|| format!("extracting {}", file.display()))
}

/// Run one document through the pipeline and print its record.
///
/// Exits with an error when the job did not complete; the record is still
/// printed first.
async fn cmd_process(file: &Path, user: &str, job_id: Option<String>) -> anyhow::Result<()> {
    let db = Database::connect(&StoreConfig::from_env()).await;
    let store: Arc<dyn JobStore> = db.jobs.clone();
    info!(backend = db.jobs.backend_name().await, "Job store ready");

    let request = match job_id {
        Some(id) => ExtractionRequest::new(file, id, user),
        None => ExtractionRequest::for_upload(file, user),
    };
    let job_id = request.job_id.clone();

    let mut outcome = Ok(());
    let config = WorkerConfig::from_env();
    if config.enabled {
        let worker = WorkerBuilder::new(store.clone())
            .with_config(config)
            .with_pipeline_config(PipelineConfig::from_env())
            .build();
        let mut events = worker.events();
        let handle = worker.start();
        handle.submit(request).await?;

        while let Ok(event) = events.recv().await {
            match event {
                WorkerEvent::JobCompleted { job_id: ref id, .. }
                | WorkerEvent::JobFailed { job_id: ref id, .. }
                | WorkerEvent::JobAbandoned { job_id: ref id }
                    if *id == job_id =>
                {
                    break
                }
                _ => {}
            }
        }
        handle.shutdown().await?;
    } else {
        warn!("Job worker disabled, extracting inline");
        outcome = process_inline(store.clone(), file, &job_id, user)
            .await
            .map(|_| ());
    }

    let job = store
        .get(&job_id)
        .await?
        .with_context(|| format!("job {} disappeared", job_id))?;
    db.close().await;
    print_json(&job)?;
    outcome?;
    ensure_completed(&job)
}

/// Extract in memory and predict fields from the resulting text.
async fn cmd_predict(
    file: &Path,
    profile_path: Option<&Path>,
    document_type: Option<&str>,
) -> anyhow::Result<()> {
    let prediction_config = PredictionConfig::from_env();
    let registry = ProviderRegistry::from_env(prediction_config.timeout_ms)?;
    let engine = PredictionEngine::from_config(&prediction_config, &registry)?;

    let profile = match profile_path {
        Some(path) => Some(read_profile(path).await?.with_context(|| {
            format!("profile {} does not exist", path.display())
        })?),
        None => None,
    };
    let user_id = profile
        .as_ref()
        .map(|p| p.user_id.clone())
        .unwrap_or_else(|| "local".to_string());

    let db = Database::in_memory();
    let pipeline = ExtractionPipeline::new(
        db.jobs.clone(),
        Arc::new(ExtractionRegistry::with_defaults()),
    )
    .with_config(PipelineConfig::from_env());
    let request = ExtractionRequest::for_upload(file, &user_id);
    let job: Job = pipeline
        .process(file, &request.job_id, &user_id)
        .await
        .with_context(|| format!("extracting {}", file.display()))?;

    let response = engine
        .predict(&job.content, profile.as_ref(), document_type)
        .await;
    print_json(&response)
}

async fn cmd_learn(
    profile_path: &Path,
    document_type: &str,
    feedback_path: &Path,
    user: &str,
) -> anyhow::Result<()> {
    let feedback: Vec<FieldFeedback> = serde_json::from_str(
        &tokio::fs::read_to_string(feedback_path)
            .await
            .with_context(|| format!("reading {}", feedback_path.display()))?,
    )
    .with_context(|| format!("parsing {}", feedback_path.display()))?;

    let profile = read_profile(profile_path)
        .await?
        .unwrap_or_else(|| UserProfile::new(user));
    let user_id = profile.user_id.clone();
    let store = Arc::new(MemoryProfileStore::with_profiles([profile]));
    let learner = PreferenceLearner::new(store.clone());

    let changed = learner
        .record_corrections(&user_id, &feedback, document_type)
        .await?;
    if changed {
        if let Some(updated) = store.get(&user_id).await? {
            write_profile(profile_path, &updated).await?;
        }
    }
    print_json(&serde_json::json!({ "profile_updated": changed }))
}

async fn cmd_suggest(
    profile_path: &Path,
    field: &str,
    document_type: Option<&str>,
) -> anyhow::Result<()> {
    let Some(profile) = read_profile(profile_path).await? else {
        bail!("profile {} does not exist", profile_path.display());
    };
    let user_id = profile.user_id.clone();
    let learner = PreferenceLearner::new(Arc::new(MemoryProfileStore::with_profiles([profile])));
    let suggestion = learner.suggest(&user_id, field, document_type).await?;
    print_json(&suggestion)
}

/// Read a profile file; `None` when it does not exist.
async fn read_profile(path: &Path) -> anyhow::Result<Option<UserProfile>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

async fn write_profile(path: &Path, profile: &UserProfile) -> anyhow::Result<()> {
    tokio::fs::write(path, serde_json::to_vec_pretty(profile)?)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use formmonkey_core::FieldType;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_suggest() {
        let cli = Cli::try_parse_from([
            "formmonkey",
            "suggest",
            "--profile",
            "me.json",
            "--field",
            "Party A",
        ])
        .unwrap();
        match cli.command {
            Commands::Suggest {
                field,
                document_type,
                ..
            } => {
                assert_eq!(field, "Party A");
                assert!(document_type.is_none());
            }
            _ => panic!("expected suggest"),
        }
    }

    #[test]
    fn test_ensure_completed_rejects_unfinished_jobs() {
        let mut job = Job::new("j1", "u1", "/uploads/a.docx");
        let err = ensure_completed(&job).unwrap_err();
        assert!(err.to_string().contains("did not complete"), "{}", err);

        job.status = JobStatus::Failed;
        job.error = Some("corrupt archive".into());
        let err = ensure_completed(&job).unwrap_err();
        assert!(err.to_string().contains("corrupt archive"), "{}", err);

        job.status = JobStatus::Completed;
        assert!(ensure_completed(&job).is_ok());
    }

    #[tokio::test]
    async fn test_inline_failure_is_returned_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        tokio::fs::write(&path, b"").await.unwrap();
        let store = Arc::new(formmonkey_db::MemoryJobStore::new());

        let err = process_inline(store.clone(), &path, "j1", "u1")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("is empty"), "{:#}", err);

        let job = store.get("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(ensure_completed(&job).is_err());
    }

    #[tokio::test]
    async fn test_profile_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.json");
        assert!(read_profile(&path).await.unwrap().is_none());

        let mut profile = UserProfile::new("u1");
        profile.apply_feedback(
            "Lease Agreement",
            &[FieldFeedback {
                field_id: None,
                name: "Party A".into(),
                value: "Acme Corp".into(),
                field_type: FieldType::Party,
                is_correct: true,
            }],
        );
        write_profile(&path, &profile).await.unwrap();

        let loaded = read_profile(&path).await.unwrap().unwrap();
        assert_eq!(loaded, profile);
    }

    #[tokio::test]
    async fn test_learn_then_suggest_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("me.json");
        let feedback_path = dir.path().join("fixes.json");
        tokio::fs::write(
            &feedback_path,
            r#"[{"name": "Party A", "value": "Acme Corp", "type": "party", "is_correct": true}]"#,
        )
        .await
        .unwrap();

        cmd_learn(&profile_path, "Lease Agreement", &feedback_path, "u1")
            .await
            .unwrap();

        let profile = read_profile(&profile_path).await.unwrap().unwrap();
        assert_eq!(profile.user_id, "u1");
        let suggestion = profile.suggest("Party A", Some("Lease Agreement"));
        assert_eq!(suggestion.values, vec!["Acme Corp"]);
    }
}
