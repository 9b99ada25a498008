//! Keyword-based document type classification.

use std::collections::HashSet;

use formmonkey_core::defaults::DEFAULT_DOCUMENT_TYPE;

pub const LEASE_AGREEMENT: &str = "Lease Agreement";
pub const EMPLOYMENT_CONTRACT: &str = "Employment Contract";
pub const PURCHASE_AGREEMENT: &str = "Purchase Agreement";
pub const NDA: &str = "NDA";
pub const SERVICE_AGREEMENT: &str = "Service Agreement";

/// Lowercased word set of `text`. Hyphenated words are kept whole and also
/// split into their parts.
fn words(text: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    for token in text
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        for part in token.split('-').filter(|p| !p.is_empty()) {
            set.insert(part.to_string());
        }
        set.insert(token);
    }
    set
}

fn any(words: &HashSet<String>, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| words.contains(*k))
}

/// Classify `text` by keyword; the first matching rule wins.
pub fn classify(text: &str) -> &'static str {
    let words = words(text);

    if any(
        &words,
        &[
            "lease", "leases", "leased", "landlord", "landlords", "tenant", "tenants",
        ],
    ) {
        LEASE_AGREEMENT
    } else if any(&words, &["employer", "employers", "employee", "employees"]) {
        EMPLOYMENT_CONTRACT
    } else if any(&words, &["purchase", "purchases"]) && any(&words, &["sale", "sales"]) {
        PURCHASE_AGREEMENT
    } else if any(
        &words,
        &["confidentiality", "non-disclosure", "nondisclosure"],
    ) {
        NDA
    } else if any(&words, &["services", "service"]) && any(&words, &["agreement", "agreements"])
    {
        SERVICE_AGREEMENT
    } else {
        DEFAULT_DOCUMENT_TYPE
    }
}

/// The caller's document type when given and non-blank, else the classified
/// one.
pub fn resolve(text: &str, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|t| !t.is_empty()) {
        Some(doc_type) => doc_type.to_string(),
        None => classify(text).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_keywords() {
        assert_eq!(
            classify("The Landlord rents the premises to the Tenant."),
            LEASE_AGREEMENT
        );
        assert_eq!(classify("This LEASE is made"), LEASE_AGREEMENT);
    }

    #[test]
    fn test_lease_needs_whole_word() {
        assert_eq!(classify("Mutual release of claims"), DEFAULT_DOCUMENT_TYPE);
    }

    #[test]
    fn test_employment() {
        assert_eq!(
            classify("The Employer shall pay the Employee monthly."),
            EMPLOYMENT_CONTRACT
        );
    }

    #[test]
    fn test_purchase_requires_sale() {
        assert_eq!(
            classify("Agreement of purchase and sale of goods"),
            PURCHASE_AGREEMENT
        );
        assert_eq!(classify("Purchase order 1234"), DEFAULT_DOCUMENT_TYPE);
    }

    #[test]
    fn test_nda() {
        assert_eq!(classify("Mutual Non-Disclosure Agreement"), NDA);
        assert_eq!(classify("Confidentiality obligations survive."), NDA);
    }

    #[test]
    fn test_services_agreement() {
        assert_eq!(
            classify("This Services Agreement covers consulting."),
            SERVICE_AGREEMENT
        );
        assert_eq!(classify("Services rendered"), DEFAULT_DOCUMENT_TYPE);
    }

    #[test]
    fn test_precedence_lease_over_services() {
        assert_eq!(
            classify("Lease services agreement between landlord and tenant"),
            LEASE_AGREEMENT
        );
    }

    #[test]
    fn test_default_and_empty() {
        assert_eq!(classify(""), DEFAULT_DOCUMENT_TYPE);
        assert_eq!(classify("Hello world"), "Legal Document");
    }

    #[test]
    fn test_resolve_prefers_explicit() {
        assert_eq!(resolve("landlord and tenant", Some("NDA")), "NDA");
        assert_eq!(resolve("landlord and tenant", Some("  ")), LEASE_AGREEMENT);
        assert_eq!(resolve("landlord and tenant", None), LEASE_AGREEMENT);
    }
}
