//! Profile enrichment of predicted fields.
//!
//! Two passes run after detection:
//!
//! 1. Identity: fields mapped to a profile identity value are overwritten
//!    when below [`PROFILE_OVERRIDE_THRESHOLD`], and synthesized when
//!    missing.
//! 2. Learned preferences: fields still below the threshold take the top
//!    suggestion the user's correction history offers for their name.

use tracing::debug;

use formmonkey_core::defaults::{PROFILE_CONFIDENCE, PROFILE_OVERRIDE_THRESHOLD};
use formmonkey_core::{
    BoundingBox, FieldPrediction, FieldType, PredictionSource, ProfileIdentity, UserProfile,
};

/// One field name backed by a profile identity value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMapping {
    pub field_name: &'static str,
    pub field_type: FieldType,
    pub value: String,
}

/// Identity-backed fields available for `identity`, in emission order.
///
/// "Party A" takes the company name, falling back to the person's name.
pub fn identity_mappings(identity: &ProfileIdentity) -> Vec<ProfileMapping> {
    let non_empty = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let candidates = [
        (
            "Party A",
            FieldType::Party,
            non_empty(&identity.company_name).or_else(|| non_empty(&identity.full_name)),
        ),
        ("Full Name", FieldType::Text, non_empty(&identity.full_name)),
        ("Email", FieldType::Email, non_empty(&identity.email)),
        ("Phone", FieldType::Phone, non_empty(&identity.phone)),
        ("Address", FieldType::Address, non_empty(&identity.address)),
    ];

    candidates
        .into_iter()
        .filter_map(|(field_name, field_type, value)| {
            value.map(|value| ProfileMapping {
                field_name,
                field_type,
                value,
            })
        })
        .collect()
}

fn relabel(field: &mut FieldPrediction, value: String, confidence: f32) {
    field.value = value;
    field.confidence = confidence;
    field.source = PredictionSource::Profile;
}

/// Apply identity enrichment in place.
pub fn apply_identity(fields: &mut Vec<FieldPrediction>, identity: &ProfileIdentity) -> usize {
    let mut touched = 0;

    for mapping in identity_mappings(identity) {
        match fields.iter_mut().find(|f| f.name == mapping.field_name) {
            Some(field) => {
                if field.confidence < PROFILE_OVERRIDE_THRESHOLD {
                    debug!(field = mapping.field_name, "Overriding low-confidence field from profile");
                    relabel(field, mapping.value, PROFILE_CONFIDENCE);
                    touched += 1;
                }
            }
            None => {
                debug!(field = mapping.field_name, "Synthesizing field from profile");
                fields.push(FieldPrediction {
                    id: FieldPrediction::make_id(PredictionSource::Profile, mapping.field_name),
                    name: mapping.field_name.to_string(),
                    field_type: mapping.field_type,
                    value: mapping.value,
                    confidence: PROFILE_CONFIDENCE,
                    source: PredictionSource::Profile,
                    page: 1,
                    bounding_box: BoundingBox::default(),
                });
                touched += 1;
            }
        }
    }

    touched
}

/// Apply learned-preference enrichment in place.
pub fn apply_preferences(
    fields: &mut [FieldPrediction],
    profile: &UserProfile,
    document_type: &str,
) -> usize {
    let mut touched = 0;

    for field in fields
        .iter_mut()
        .filter(|f| f.confidence < PROFILE_OVERRIDE_THRESHOLD)
    {
        let suggestion = profile.suggest(&field.name, Some(document_type));
        if let Some(top) = suggestion.values.first() {
            debug!(
                field = %field.name,
                confidence = suggestion.confidence,
                "Applying learned preference"
            );
            relabel(field, top.clone(), suggestion.confidence);
            touched += 1;
        }
    }

    touched
}

/// Run both enrichment passes.
pub fn enrich(fields: &mut Vec<FieldPrediction>, profile: &UserProfile, document_type: &str) {
    let from_identity = apply_identity(fields, &profile.identity);
    let from_preferences = apply_preferences(fields, profile, document_type);
    debug!(
        user_id = %profile.user_id,
        from_identity,
        from_preferences,
        "Profile enrichment applied"
    );
}
