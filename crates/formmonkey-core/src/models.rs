//! Core data models for the FormMonkey document pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a document processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed jobs accept no further updates.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Pending) | (Pending, Processing) | (Pending, Failed) => true,
            (Processing, Processing) | (Processing, Completed) | (Processing, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown job status: {}", other))),
        }
    }
}

/// Summary of what an extractor produced, persisted on the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub format: DocumentFormat,
    /// Pages (PDF) or body elements (DOCX) walked.
    pub unit_count: usize,
    pub char_count: usize,
    pub line_count: usize,
}

/// One document's processing lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub user_id: String,
    pub file_path: String,
    #[serde(default)]
    pub content: String,
    pub document_type: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(default)]
    pub metadata: Option<ExtractionMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a `Pending` job at progress 0, as the upload collaborator does.
    pub fn new(
        job_id: impl Into<String>,
        user_id: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress: 0,
            user_id: user_id.into(),
            file_path: file_path.into(),
            content: String::new(),
            document_type: defaults::DEFAULT_DOCUMENT_TYPE.to_string(),
            error: None,
            progress_message: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the record invariants. Called at the store boundary.
    pub fn validate(&self) -> Result<()> {
        if self.job_id.trim().is_empty() {
            return Err(Error::InvalidInput("job_id must not be empty".into()));
        }
        if self.progress > defaults::PROGRESS_DONE {
            return Err(Error::InvalidInput(format!(
                "progress {} out of range",
                self.progress
            )));
        }
        match self.status {
            JobStatus::Completed if self.progress != defaults::PROGRESS_DONE => {
                Err(Error::InvalidInput(
                    "completed job must have progress 100".into(),
                ))
            }
            JobStatus::Failed if self.error.is_none() => {
                Err(Error::InvalidInput("failed job must carry an error".into()))
            }
            JobStatus::Completed => Ok(()),
            _ if self.progress == defaults::PROGRESS_DONE => Err(Error::InvalidInput(
                "only a completed job may report progress 100".into(),
            )),
            _ if !self.content.is_empty() => Err(Error::InvalidInput(
                "content is only set once extraction completes".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Apply a partial update, enforcing the job state machine.
    ///
    /// Progress never decreases; `Completed` pins it to 100 and any other
    /// status caps it at 99. Terminal jobs reject every update.
    pub fn apply(&mut self, update: JobUpdate) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "job {} is {} and cannot be modified",
                self.job_id, self.status
            )));
        }

        let next = update.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition(format!(
                "job {} cannot move from {} to {}",
                self.job_id, self.status, next
            )));
        }
        if update.content.is_some() && next != JobStatus::Completed {
            return Err(Error::InvalidInput(
                "content may only be written when completing a job".into(),
            ));
        }

        self.status = next;
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(defaults::PROGRESS_DONE));
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(document_type) = update.document_type {
            self.document_type = document_type;
        }
        if let Some(message) = update.progress_message {
            self.progress_message = Some(message);
        }
        if let Some(metadata) = update.metadata {
            self.metadata = Some(metadata);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }

        match self.status {
            JobStatus::Completed => self.progress = defaults::PROGRESS_DONE,
            JobStatus::Failed => {
                if self.error.is_none() {
                    self.error = Some("unknown error".to_string());
                }
                self.progress = self.progress.min(defaults::PROGRESS_DONE - 1);
            }
            _ => self.progress = self.progress.min(defaults::PROGRESS_DONE - 1),
        }

        self.touch();
        Ok(())
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Typed partial update for a job record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub content: Option<String>,
    pub document_type: Option<String>,
    pub error: Option<String>,
    pub progress_message: Option<String>,
    pub metadata: Option<ExtractionMetadata>,
}

impl JobUpdate {
    /// Move the job into `Processing` at the given progress.
    pub fn processing(progress: u8) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Progress tick without status change.
    pub fn progress(progress: u8, message: Option<String>) -> Self {
        Self {
            progress: Some(progress),
            progress_message: message,
            ..Default::default()
        }
    }

    /// Terminal success with the extracted text.
    pub fn completed(content: String, metadata: Option<ExtractionMetadata>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(defaults::PROGRESS_DONE),
            content: Some(content),
            metadata,
            progress_message: Some("Done".to_string()),
            ..Default::default()
        }
    }

    /// Terminal failure; progress is left where it was.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub user_id: Option<String>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.user_id.as_deref().map_or(true, |u| job.user_id == u)
            && self.status.map_or(true, |s| job.status == s)
    }
}

// =============================================================================
// EXTRACTION TYPES
// =============================================================================

/// Document formats with a registered extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolve the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    /// Resolve the format from a path, failing with `UnsupportedFormat`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "'{}' (extension '{}')",
                path.display(),
                if ext.is_empty() { "<none>" } else { ext }
            ))
        })
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => f.write_str("pdf"),
            DocumentFormat::Docx => f.write_str("docx"),
        }
    }
}

/// Raw text produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// Pages or body elements walked.
    pub unit_count: usize,
}

impl ExtractedText {
    pub fn metadata(&self, format: DocumentFormat) -> ExtractionMetadata {
        ExtractionMetadata {
            format,
            unit_count: self.unit_count,
            char_count: self.text.chars().count(),
            line_count: self.text.lines().count(),
        }
    }
}

// =============================================================================
// PREDICTION TYPES
// =============================================================================

/// Type of a predicted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Date,
    Amount,
    Email,
    Phone,
    Address,
    Party,
    Signature,
    Checkbox,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Amount => "amount",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Address => "address",
            FieldType::Party => "party",
            FieldType::Signature => "signature",
            FieldType::Checkbox => "checkbox",
        };
        f.write_str(s)
    }
}

/// Where a prediction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    RuleBased,
    Model,
    Profile,
}

impl PredictionSource {
    /// Short tag used as the prefix of deterministic field ids.
    pub fn tag(self) -> &'static str {
        match self {
            PredictionSource::RuleBased => "rule",
            PredictionSource::Model => "model",
            PredictionSource::Profile => "profile",
        }
    }
}

/// Location of a field. Rule-based predictions use text-grid units
/// (column, line within page, characters, lines).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    #[serde(alias = "width")]
    pub w: f32,
    #[serde(alias = "height")]
    pub h: f32,
}

/// A typed, confidence-scored guess at a field's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPrediction {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
    pub confidence: f32,
    pub source: PredictionSource,
    pub page: u32,
    pub bounding_box: BoundingBox,
}

impl FieldPrediction {
    /// Deterministic id derived from source and field name.
    pub fn make_id(source: PredictionSource, name: &str) -> String {
        let slug: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        let slug = slug
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        format!("{}-{}", source.tag(), slug)
    }
}

/// Output of one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub fields: Vec<FieldPrediction>,
    pub count: usize,
    pub document_type: String,
    /// Model provider that contributed fields, if any.
    pub provider: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Field as returned by a model provider, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelField {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
    pub confidence: f32,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, alias = "position")]
    pub bounding_box: Option<BoundingBox>,
}

impl ModelField {
    /// Convert into a `Model`-sourced prediction, clamping confidence.
    pub fn into_prediction(self) -> FieldPrediction {
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        FieldPrediction {
            id: self
                .id
                .unwrap_or_else(|| FieldPrediction::make_id(PredictionSource::Model, &self.name)),
            name: self.name,
            field_type: self.field_type,
            value: self.value,
            confidence,
            source: PredictionSource::Model,
            page: self.page.unwrap_or(1).max(1),
            bounding_box: self.bounding_box.unwrap_or_default(),
        }
    }
}

// =============================================================================
// PROFILE TYPES
// =============================================================================

/// Identity values used to autofill documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileIdentity {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Score of one candidate value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredValue {
    pub value: String,
    pub score: i64,
}

/// Learned preference for one field of one document type.
///
/// Values keep insertion order so score ties resolve to the value seen first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPreference {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub preferred_values: Vec<PreferredValue>,
    pub last_updated: DateTime<Utc>,
}

impl FieldPreference {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            preferred_values: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Add `delta` to the value's score, inserting it at 0 first if unseen.
    pub fn adjust(&mut self, value: &str, delta: i64) {
        match self.preferred_values.iter_mut().find(|v| v.value == value) {
            Some(entry) => entry.score += delta,
            None => self.preferred_values.push(PreferredValue {
                value: value.to_string(),
                score: delta,
            }),
        }
        self.last_updated = Utc::now();
    }

    pub fn score_of(&self, value: &str) -> Option<i64> {
        self.preferred_values
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.score)
    }

    /// Top `limit` strictly positive values, highest score first.
    pub fn top_values(&self, limit: usize) -> Vec<String> {
        let mut positive: Vec<&PreferredValue> = self
            .preferred_values
            .iter()
            .filter(|v| v.score > 0)
            .collect();
        // sort_by is stable: ties keep insertion order
        positive.sort_by(|a, b| b.score.cmp(&a.score));
        positive
            .into_iter()
            .take(limit)
            .map(|v| v.value.clone())
            .collect()
    }

    pub fn has_positive(&self) -> bool {
        self.preferred_values.iter().any(|v| v.score > 0)
    }
}

/// Ranked suggestions for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub values: Vec<String>,
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub confidence: f32,
}

impl Suggestion {
    pub fn empty() -> Self {
        Self {
            values: Vec::new(),
            field_type: None,
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-user identity and learned field preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub identity: ProfileIdentity,
    /// document_type → field_name → preference
    #[serde(default)]
    pub field_preferences: BTreeMap<String, BTreeMap<String, FieldPreference>>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            identity: ProfileIdentity::default(),
            field_preferences: BTreeMap::new(),
        }
    }

    pub fn with_identity(mut self, identity: ProfileIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Apply feedback for one document type. Returns `false` on empty input.
    pub fn apply_feedback(&mut self, document_type: &str, feedback: &[FieldFeedback]) -> bool {
        if feedback.is_empty() {
            return false;
        }
        let buckets = self
            .field_preferences
            .entry(document_type.to_string())
            .or_default();
        for item in feedback {
            let preference = buckets
                .entry(item.name.clone())
                .or_insert_with(|| FieldPreference::new(item.field_type));
            preference.field_type = item.field_type;
            preference.adjust(&item.value, if item.is_correct { 1 } else { -1 });
        }
        self.updated_at = Utc::now();
        true
    }

    /// Preference bucket for one `(document_type, field_name)` pair.
    pub fn preference(&self, document_type: &str, field_name: &str) -> Option<&FieldPreference> {
        self.field_preferences.get(document_type)?.get(field_name)
    }

    /// Ranked suggestions for a field.
    ///
    /// The exact document type is searched first; otherwise the first other
    /// document type (in key order) holding a positive value for the field
    /// is used at lower confidence.
    pub fn suggest(&self, field_name: &str, document_type: Option<&str>) -> Suggestion {
        if let Some(doc_type) = document_type {
            if let Some(pref) = self.preference(doc_type, field_name) {
                if pref.has_positive() {
                    return Suggestion {
                        values: pref.top_values(defaults::SUGGESTION_LIMIT),
                        field_type: Some(pref.field_type),
                        confidence: defaults::SUGGESTION_CONFIDENCE_EXACT,
                    };
                }
            }
        }

        let fallback = self
            .field_preferences
            .iter()
            .filter(|(doc_type, _)| Some(doc_type.as_str()) != document_type)
            .filter_map(|(_, fields)| fields.get(field_name))
            .find(|pref| pref.has_positive());

        match fallback {
            Some(pref) => Suggestion {
                values: pref.top_values(defaults::SUGGESTION_LIMIT),
                field_type: Some(pref.field_type),
                confidence: defaults::SUGGESTION_CONFIDENCE_FALLBACK,
            },
            None => Suggestion::empty(),
        }
    }
}

// =============================================================================
// CORRECTION TYPES
// =============================================================================

/// Reason a user corrected a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionReason {
    LowConfidence,
    WrongField,
    FormattingIssue,
    IncorrectValue,
    #[default]
    Other,
}

/// Learner input: one value confirmed or rejected for a named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFeedback {
    #[serde(default)]
    pub field_id: Option<String>,
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub is_correct: bool,
}

/// User feedback on one predicted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub field_id: String,
    pub original_value: String,
    pub corrected_value: String,
    #[serde(default)]
    pub reason: CorrectionReason,
    pub is_correct: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Correction {
    /// Translate into learner feedback for the named field.
    ///
    /// A confirmation scores the original value. A correction scores the
    /// corrected value and, if different and non-empty, penalises the
    /// original one.
    pub fn to_feedback(&self, name: &str, field_type: FieldType) -> Vec<FieldFeedback> {
        let make = |value: &str, is_correct: bool| FieldFeedback {
            field_id: Some(self.field_id.clone()),
            name: name.to_string(),
            value: value.to_string(),
            field_type,
            is_correct,
        };

        if self.is_correct {
            return vec![make(&self.original_value, true)];
        }

        let mut out = vec![make(&self.corrected_value, true)];
        if !self.original_value.is_empty() && self.original_value != self.corrected_value {
            out.push(make(&self.original_value, false));
        }
        out
    }
}
