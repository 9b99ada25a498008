//! End-to-end prediction and preference-learning scenarios.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use formmonkey_db::MemoryProfileStore;
use formmonkey_inference::{
    Error, FieldFeedback, FieldType, ModelField, ModelProvider, PredictionConfig,
    PredictionEngine, PredictionSource, PreferenceLearner, ProfileIdentity, ProfileStore,
    ProviderRegistry, Result, UserProfile,
};

const LEASE_TEXT: &str =
    "This Lease is made and entered into by and between Acme Corp, and John Doe";

struct FixedProvider {
    name: &'static str,
    fields: Vec<ModelField>,
}

#[async_trait]
impl ModelProvider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn predict(&self, _text: &str, _document_type: Option<&str>) -> Result<Vec<ModelField>> {
        Ok(self.fields.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

struct DownProvider;

#[async_trait]
impl ModelProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn predict(&self, _text: &str, _document_type: Option<&str>) -> Result<Vec<ModelField>> {
        Err(Error::ProviderUnavailable("down: connection refused".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }
}

fn feedback(name: &str, value: &str, is_correct: bool) -> FieldFeedback {
    FieldFeedback {
        field_id: None,
        name: name.to_string(),
        value: value.to_string(),
        field_type: FieldType::Party,
        is_correct,
    }
}

#[tokio::test]
async fn test_between_clause_yields_two_rule_based_parties() {
    let response = PredictionEngine::rules_only()
        .predict(LEASE_TEXT, None, None)
        .await;

    let parties: Vec<_> = response
        .fields
        .iter()
        .filter(|f| f.field_type == FieldType::Party)
        .collect();
    assert!(parties.len() >= 2);
    assert_eq!(parties[0].value, "Acme Corp");
    assert_eq!(parties[1].value, "John Doe");
    for party in parties {
        assert_eq!(party.source, PredictionSource::RuleBased);
        assert!((party.confidence - 0.85).abs() < 1e-6);
    }
    assert_eq!(response.document_type, "Lease Agreement");
}

#[tokio::test]
async fn test_landlord_tenant_text_resolves_to_lease() {
    let response = PredictionEngine::rules_only()
        .predict(
            "The landlord agrees to maintain the premises for the tenant.",
            None,
            None,
        )
        .await;
    assert_eq!(response.document_type, "Lease Agreement");
}

#[tokio::test]
async fn test_text_without_patterns_yields_no_fields() {
    let response = PredictionEngine::rules_only()
        .predict("These general terms apply to everyone.", None, None)
        .await;
    assert!(response.fields.is_empty());
    assert_eq!(response.count, 0);
    assert_eq!(response.document_type, "Legal Document");
}

#[tokio::test]
async fn test_profile_email_is_synthesized() {
    let profile = UserProfile::new("u1").with_identity(ProfileIdentity {
        email: Some("a@b.com".into()),
        ..Default::default()
    });

    let response = PredictionEngine::rules_only()
        .predict(LEASE_TEXT, Some(&profile), None)
        .await;

    let email = response
        .fields
        .iter()
        .find(|f| f.name == "Email")
        .expect("email synthesized from profile");
    assert_eq!(email.value, "a@b.com");
    assert_eq!(email.source, PredictionSource::Profile);
    assert!((email.confidence - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn test_provider_fields_win_without_duplicates() {
    let provider = FixedProvider {
        name: "local",
        fields: vec![ModelField {
            id: None,
            name: "Party B".into(),
            field_type: FieldType::Party,
            value: "Johnathan Doe".into(),
            confidence: 0.92,
            page: Some(1),
            bounding_box: None,
        }],
    };
    let registry = ProviderRegistry::new().with_provider(Arc::new(provider));
    let engine =
        PredictionEngine::from_config(&PredictionConfig::default().with_model("local"), &registry)
            .unwrap();

    let response = engine.predict(LEASE_TEXT, None, None).await;
    let names: Vec<_> = response.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Party B", "Party A"]);
    assert_eq!(response.fields[0].source, PredictionSource::Model);
    assert_eq!(response.fields[0].id, "model-party-b");
    assert_eq!(response.provider.as_deref(), Some("local"));
}

#[tokio::test]
async fn test_provider_error_never_fails_prediction() {
    let engine = PredictionEngine::with_provider(Arc::new(DownProvider), Duration::from_secs(1));
    let response = engine.predict(LEASE_TEXT, None, None).await;
    assert_eq!(response.fields.len(), 2);
    assert!(response.provider.is_none());
}

#[tokio::test]
async fn test_unregistered_provider_is_configuration_error() {
    let registry = ProviderRegistry::new().with_provider(Arc::new(DownProvider));
    let err = PredictionEngine::from_config(
        &PredictionConfig::default().with_model("remote-b"),
        &registry,
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_confirmed_party_round_trips_into_suggestion() {
    let learner = PreferenceLearner::new(Arc::new(MemoryProfileStore::new()));
    let changed = learner
        .record_corrections(
            "u1",
            &[feedback("Party A", "Acme Corp", true)],
            "Lease Agreement",
        )
        .await
        .unwrap();
    assert!(changed);

    let suggestion = learner
        .suggest("u1", "Party A", Some("Lease Agreement"))
        .await
        .unwrap();
    assert!(suggestion.values.contains(&"Acme Corp".to_string()));
    assert!((suggestion.confidence - 0.8).abs() < 1e-6);
    assert_eq!(suggestion.field_type, Some(FieldType::Party));
}

#[tokio::test]
async fn test_net_zero_score_is_not_suggested() {
    let learner = PreferenceLearner::new(Arc::new(MemoryProfileStore::new()));
    learner
        .record_corrections(
            "u1",
            &[
                feedback("Party A", "Acme Corp", true),
                feedback("Party A", "Acme Corp", false),
            ],
            "Lease Agreement",
        )
        .await
        .unwrap();

    let suggestion = learner
        .suggest("u1", "Party A", Some("Lease Agreement"))
        .await
        .unwrap();
    assert!(suggestion.values.is_empty());
    assert_eq!(suggestion.confidence, 0.0);
}

#[tokio::test]
async fn test_suggest_is_idempotent() {
    let learner = PreferenceLearner::new(Arc::new(MemoryProfileStore::new()));
    learner
        .record_corrections(
            "u1",
            &[
                feedback("Party A", "Acme Corp", true),
                feedback("Party A", "Globex", true),
                feedback("Party A", "Globex", true),
            ],
            "NDA",
        )
        .await
        .unwrap();

    let first = learner.suggest("u1", "Party A", Some("Lease Agreement")).await.unwrap();
    let second = learner.suggest("u1", "Party A", Some("Lease Agreement")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.values, vec!["Globex", "Acme Corp"]);
    assert!((first.confidence - 0.6).abs() < 1e-6);
}

#[tokio::test]
async fn test_learned_preference_replaces_low_confidence_fields_only() {
    let store = Arc::new(MemoryProfileStore::new());
    let learner = PreferenceLearner::new(store.clone());
    learner
        .record_corrections(
            "u1",
            &[
                FieldFeedback {
                    field_id: None,
                    name: "Contract Value".into(),
                    value: "$1,500".into(),
                    field_type: FieldType::Amount,
                    is_correct: true,
                },
                FieldFeedback {
                    field_id: None,
                    name: "Phone".into(),
                    value: "(555) 000-1111".into(),
                    field_type: FieldType::Phone,
                    is_correct: true,
                },
            ],
            "Lease Agreement",
        )
        .await
        .unwrap();
    let profile = store.get("u1").await.unwrap().unwrap();

    let provider = FixedProvider {
        name: "local",
        fields: vec![ModelField {
            id: None,
            name: "Contract Value".into(),
            field_type: FieldType::Amount,
            value: "$15".into(),
            confidence: 0.4,
            page: None,
            bounding_box: None,
        }],
    };
    let engine = PredictionEngine::with_provider(Arc::new(provider), Duration::from_secs(1));
    let text = "Lease between Acme Corp and John Doe. Call (555) 123-4567.";
    let response = engine.predict(text, Some(&profile), None).await;

    let value = response
        .fields
        .iter()
        .find(|f| f.name == "Contract Value")
        .unwrap();
    assert_eq!(value.value, "$1,500");
    assert_eq!(value.source, PredictionSource::Profile);
    assert!((value.confidence - 0.8).abs() < 1e-6);

    // Phone rules sit at the threshold, so the detected value stays.
    let phone = response.fields.iter().find(|f| f.name == "Phone").unwrap();
    assert_eq!(phone.value, "(555) 123-4567");
    assert_eq!(phone.source, PredictionSource::RuleBased);
}
