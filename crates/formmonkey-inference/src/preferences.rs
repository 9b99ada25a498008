//! Preference learner: turns user corrections into per-field value scores
//! and serves ranked suggestions from them.

use std::sync::Arc;

use tracing::{debug, info};

use formmonkey_core::{
    Correction, FieldFeedback, FieldPrediction, ProfileStore, Result, Suggestion, UserProfile,
};

/// Learns field preferences from corrections, persisted through a
/// [`ProfileStore`].
#[derive(Clone)]
pub struct PreferenceLearner {
    profiles: Arc<dyn ProfileStore>,
}

impl PreferenceLearner {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    /// Apply `feedback` for one document type.
    ///
    /// Every item is applied in one pass inside a single atomic store update,
    /// creating the profile if missing, so concurrent calls for the same user
    /// never lose increments. Returns `false` without touching the store when
    /// `feedback` is empty.
    pub async fn record_corrections(
        &self,
        user_id: &str,
        feedback: &[FieldFeedback],
        document_type: &str,
    ) -> Result<bool> {
        if feedback.is_empty() {
            debug!(user_id, "No corrections to record");
            return Ok(false);
        }

        let changed = self
            .profiles
            .update(
                user_id,
                Box::new(move |profile: &mut UserProfile| {
                    profile.apply_feedback(document_type, feedback)
                }),
            )
            .await?;

        info!(
            user_id,
            document_type,
            corrections = feedback.len(),
            "Corrections recorded"
        );
        Ok(changed)
    }

    /// Convert field corrections to feedback and record them.
    ///
    /// `fields` is the prediction set the corrections refer to; it supplies
    /// each field's name and type. Corrections for unknown ids are skipped.
    pub async fn record_field_corrections(
        &self,
        user_id: &str,
        corrections: &[Correction],
        fields: &[FieldPrediction],
        document_type: &str,
    ) -> Result<bool> {
        let feedback: Vec<FieldFeedback> = corrections
            .iter()
            .filter_map(|c| {
                let field = fields.iter().find(|f| f.id == c.field_id)?;
                Some(c.to_feedback(&field.name, field.field_type))
            })
            .flatten()
            .collect();
        self.record_corrections(user_id, &feedback, document_type)
            .await
    }

    /// Ranked suggestions for `field_name`. Unknown users get the empty
    /// suggestion.
    pub async fn suggest(
        &self,
        user_id: &str,
        field_name: &str,
        document_type: Option<&str>,
    ) -> Result<Suggestion> {
        let suggestion = match self.profiles.get(user_id).await? {
            Some(profile) => profile.suggest(field_name, document_type),
            None => Suggestion::empty(),
        };
        debug!(
            user_id,
            field = field_name,
            values = suggestion.values.len(),
            confidence = suggestion.confidence,
            "Suggestion served"
        );
        Ok(suggestion)
    }
}
