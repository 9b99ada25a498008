//! Rule-based field detection.
//!
//! A fixed, ordered set of pattern families runs over the document text:
//! parties, dates, amounts, emails, phones. Each family has one base
//! confidence, names its matches positionally ("Party A", "Party B", ...)
//! and emits a given value once.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use formmonkey_core::defaults::{
    AMOUNT_CONFIDENCE, DATE_CONFIDENCE, EMAIL_CONFIDENCE, PAGE_SEPARATOR, PARTY_CONFIDENCE,
    PHONE_CONFIDENCE,
};
use formmonkey_core::{BoundingBox, FieldPrediction, FieldType, PredictionSource};

/// Month names and abbreviations shared by the date patterns.
const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

/// Party name body: no clause punctuation, bounded length.
const NAME: &str = r#"[^,;:\n()"]{1,80}?"#;

/// Where a party name ends.
const NAME_END: &str = r#"(?:\s*[,;:\n(".]|\s+(?:a|an|the|hereinafter|as|for|who|whose|located|residing|with|whereas)\b|\s*$)"#;

static PARTY_BETWEEN: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\b(?:between|among)\s+({name})\s*,?\s+and\s+({name}){end}",
        name = NAME,
        end = NAME_END
    ))
});

static PARTY_LABELED: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?im)^[ \t]*(?:landlord|tenant|lessor|lessee|buyer|seller|purchaser|vendor|employer|employee|client|contractor|disclosing party|receiving party|party [a-z])[ \t]*:[ \t]*([^\n]+?)[ \t]*$",
    )
});

static DATE_FORMATS: Lazy<String> = Lazy::new(|| {
    format!(
        concat!(
            r"(?:\d{{4}}-\d{{2}}-\d{{2}}",
            r"|{m}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}",
            r"|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:day\s+of\s+|of\s+)?{m},?\s+\d{{4}}",
            r"|\d{{1,2}}[/-]\d{{1,2}}[/-](?:\d{{4}}|\d{{2}}))"
        ),
        m = MONTH
    )
});

static DATE_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\b(?:dated|effective(?:\s+date)?(?:\s+as\s+of)?|as\s+of)\s*:?\s*(?:the\s+)?(?:on\s+)?\b({})\b",
        *DATE_FORMATS
    ))
});

static DATE_BARE: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"(?i)\b({})\b", *DATE_FORMATS)));

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    compile(concat!(
        r"(?i)(",
        r"[$€£]\s?\d{1,3}(?:,\d{3})+(?:\.\d{2})?",
        r"|[$€£]\s?\d+(?:\.\d{2})?",
        r"|\bUSD\s?\d{1,3}(?:,\d{3})*(?:\.\d{2})?\b",
        r"|\b\d{1,3}(?:,\d{3})+(?:\.\d{2})?\s*(?:USD|dollars)\b",
        r"|\b\d+(?:\.\d{2})?\s*(?:USD|dollars)\b",
        r")"
    ))
});

static EMAIL: Lazy<Regex> =
    Lazy::new(|| compile(r"\b([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})\b"));

static PHONE: Lazy<Regex> = Lazy::new(|| {
    compile(r"((?:\+?1[ .-]?)?(?:\(\d{3}\)\s?|\b\d{3}[ .-])\d{3}[ .-]\d{4})\b")
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid field pattern")
}

/// One rule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Party,
    Date,
    Amount,
    Email,
    Phone,
}

impl Family {
    /// Families in the order they run.
    pub const ALL: [Family; 5] = [
        Family::Party,
        Family::Date,
        Family::Amount,
        Family::Email,
        Family::Phone,
    ];

    pub fn field_type(self) -> FieldType {
        match self {
            Family::Party => FieldType::Party,
            Family::Date => FieldType::Date,
            Family::Amount => FieldType::Amount,
            Family::Email => FieldType::Email,
            Family::Phone => FieldType::Phone,
        }
    }

    pub fn confidence(self) -> f32 {
        match self {
            Family::Party => PARTY_CONFIDENCE,
            Family::Date => DATE_CONFIDENCE,
            Family::Amount => AMOUNT_CONFIDENCE,
            Family::Email => EMAIL_CONFIDENCE,
            Family::Phone => PHONE_CONFIDENCE,
        }
    }

    /// Positional field name of the `index`-th (0-based) match.
    pub fn field_name(self, index: usize) -> String {
        match (self, index) {
            (Family::Party, i) if i < 26 => format!("Party {}", (b'A' + i as u8) as char),
            (Family::Party, i) => format!("Party {}", i + 1),
            (Family::Date, 0) => "Effective Date".to_string(),
            (Family::Date, i) => format!("Date {}", i + 1),
            (Family::Amount, 0) => "Contract Value".to_string(),
            (Family::Amount, i) => format!("Amount {}", i + 1),
            (Family::Email, 0) => "Email".to_string(),
            (Family::Email, i) => format!("Email {}", i + 1),
            (Family::Phone, 0) => "Phone".to_string(),
            (Family::Phone, i) => format!("Phone {}", i + 1),
        }
    }

    /// Raw `(byte offset, value)` matches in emission order.
    fn matches(self, text: &str) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        match self {
            Family::Party => {
                for caps in PARTY_BETWEEN.captures_iter(text) {
                    for group in [caps.get(1), caps.get(2)].into_iter().flatten() {
                        out.push((group.start(), group.as_str().to_string()));
                    }
                }
                collect_group(&PARTY_LABELED, text, &mut out);
            }
            Family::Date => {
                collect_group(&DATE_CONTEXT, text, &mut out);
                collect_group(&DATE_BARE, text, &mut out);
            }
            Family::Amount => collect_group(&AMOUNT, text, &mut out),
            Family::Email => collect_group(&EMAIL, text, &mut out),
            Family::Phone => collect_group(&PHONE, text, &mut out),
        }
        out
    }
}

fn collect_group(re: &Regex, text: &str, out: &mut Vec<(usize, String)>) {
    for caps in re.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            out.push((m.start(), m.as_str().to_string()));
        }
    }
}

/// Strip surrounding whitespace, trailing clause punctuation and quotes.
pub fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| c.is_whitespace() || ",.;:".contains(c))
        .trim_matches('"')
        .trim()
        .to_string()
}

/// Page number and text-grid box of a match starting at byte `start`.
///
/// Pages are separated by form feeds. `x` is the column, `y` the line within
/// the page, `w` the match length in characters, `h` one line.
pub fn locate(text: &str, start: usize, value: &str) -> (u32, BoundingBox) {
    let before = &text[..start];
    let page = 1 + before.matches(PAGE_SEPARATOR).count() as u32;
    let page_text = match before.rfind(PAGE_SEPARATOR) {
        Some(i) => &before[i + PAGE_SEPARATOR.len_utf8()..],
        None => before,
    };
    let line = page_text.matches('\n').count();
    let column = match page_text.rfind('\n') {
        Some(i) => page_text[i + 1..].chars().count(),
        None => page_text.chars().count(),
    };
    (
        page,
        BoundingBox {
            x: column as f32,
            y: line as f32,
            w: value.chars().count() as f32,
            h: 1.0,
        },
    )
}

/// Run one family over `text`.
pub fn detect_family(family: Family, text: &str) -> Vec<FieldPrediction> {
    let mut seen = HashSet::new();
    let mut fields = Vec::new();

    for (start, raw) in family.matches(text) {
        let value = clean_value(&raw);
        if value.is_empty() || !seen.insert(value.to_lowercase()) {
            continue;
        }
        let name = family.field_name(fields.len());
        let (page, bounding_box) = locate(text, start, &raw);
        trace!(field = %name, value = %value, page, "Rule matched");
        fields.push(FieldPrediction {
            id: FieldPrediction::make_id(PredictionSource::RuleBased, &name),
            name,
            field_type: family.field_type(),
            value,
            confidence: family.confidence(),
            source: PredictionSource::RuleBased,
            page,
            bounding_box,
        });
    }
    fields
}

/// Run every family over `text`, in family order.
pub fn detect_fields(text: &str) -> Vec<FieldPrediction> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut fields = Vec::new();
    for family in Family::ALL {
        let found = detect_family(family, text);
        debug!(family = ?family, field_count = found.len(), "Rule family evaluated");
        fields.extend(found);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(fields: &[FieldPrediction]) -> Vec<&str> {
        fields.iter().map(|f| f.value.as_str()).collect()
    }

    #[test]
    fn test_patterns_compile() {
        Lazy::force(&PARTY_BETWEEN);
        Lazy::force(&PARTY_LABELED);
        Lazy::force(&DATE_CONTEXT);
        Lazy::force(&DATE_BARE);
        Lazy::force(&AMOUNT);
        Lazy::force(&EMAIL);
        Lazy::force(&PHONE);
    }

    #[test]
    fn test_parties_between_trim_trailing_punctuation() {
        let text = "This Lease is made and entered into by and between Acme Corp, and John Doe";
        let parties = detect_family(Family::Party, text);
        assert_eq!(values(&parties), vec!["Acme Corp", "John Doe"]);
        assert_eq!(parties[0].name, "Party A");
        assert_eq!(parties[1].name, "Party B");
        assert!(parties.iter().all(|p| p.field_type == FieldType::Party));
        assert!(parties.iter().all(|p| (p.confidence - 0.85).abs() < 1e-6));
        assert!(parties.iter().all(|p| p.source == PredictionSource::RuleBased));
        assert_eq!(parties[0].id, "rule-party-a");
    }

    #[test]
    fn test_parties_stop_at_role_description() {
        let text = "Agreement between Acme Corp. and Jane Roe (the \"Tenant\").";
        let parties = detect_family(Family::Party, text);
        assert_eq!(values(&parties), vec!["Acme Corp", "Jane Roe"]);
    }

    #[test]
    fn test_labeled_parties_follow_between_matches() {
        let text = "between Acme Corp and John Doe.\nLandlord: Acme Corp\nGuarantor note\nParty C: Widget LLC";
        let parties = detect_family(Family::Party, text);
        assert_eq!(values(&parties), vec!["Acme Corp", "John Doe", "Widget LLC"]);
        assert_eq!(parties[2].name, "Party C");
    }

    #[test]
    fn test_dates_context_first_then_formats() {
        let text = "Signed 03/04/2024. This agreement is effective as of January 1, 2025.";
        let dates = detect_family(Family::Date, text);
        assert_eq!(values(&dates), vec!["January 1, 2025", "03/04/2024"]);
        assert_eq!(dates[0].name, "Effective Date");
        assert_eq!(dates[1].name, "Date 2");
        assert!((dates[0].confidence - 0.80).abs() < 1e-6);
    }

    #[test]
    fn test_date_formats() {
        let text = "2025-02-28, 1st of March, 2025, Dec. 5 2024 and 7-8-24";
        let dates = detect_family(Family::Date, text);
        assert_eq!(
            values(&dates),
            vec!["2025-02-28", "1st of March, 2025", "Dec. 5 2024", "7-8-24"]
        );
    }

    #[test]
    fn test_amounts() {
        let text = "Rent of $1,200.00 per month, a deposit of 2,400 USD and a fee of $50.";
        let amounts = detect_family(Family::Amount, text);
        assert_eq!(values(&amounts), vec!["$1,200.00", "2,400 USD", "$50"]);
        assert_eq!(amounts[0].name, "Contract Value");
        assert_eq!(amounts[1].name, "Amount 2");
    }

    #[test]
    fn test_email_and_phone() {
        let text = "Contact legal@acme.com or (555) 123-4567, backup 555.987.6543.";
        let emails = detect_family(Family::Email, text);
        assert_eq!(values(&emails), vec!["legal@acme.com"]);
        assert!((emails[0].confidence - 0.90).abs() < 1e-6);

        let phones = detect_family(Family::Phone, text);
        assert_eq!(values(&phones), vec!["(555) 123-4567", "555.987.6543"]);
        assert_eq!(phones[1].name, "Phone 2");
    }

    #[test]
    fn test_same_value_emitted_once_per_family() {
        let text = "Pay $500 now and $500 later.";
        let amounts = detect_family(Family::Amount, text);
        assert_eq!(values(&amounts), vec!["$500"]);
    }

    #[test]
    fn test_page_and_grid_position() {
        let text = "Page one\x0cLine one\n  Pay $75 today";
        let amounts = detect_family(Family::Amount, text);
        assert_eq!(amounts.len(), 1);
        assert_eq!(amounts[0].page, 2);
        assert_eq!(
            amounts[0].bounding_box,
            BoundingBox {
                x: 6.0,
                y: 1.0,
                w: 3.0,
                h: 1.0
            }
        );
    }

    #[test]
    fn test_no_patterns_yield_no_fields() {
        assert!(detect_fields("General terms apply to everyone.").is_empty());
        assert!(detect_fields("").is_empty());
        assert!(detect_fields("   \n ").is_empty());
    }

    #[test]
    fn test_field_names_positional() {
        assert_eq!(Family::Party.field_name(0), "Party A");
        assert_eq!(Family::Party.field_name(25), "Party Z");
        assert_eq!(Family::Party.field_name(26), "Party 27");
        assert_eq!(Family::Email.field_name(1), "Email 2");
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("  Acme Corp, "), "Acme Corp");
        assert_eq!(clean_value("\"Widget LLC\";"), "Widget LLC");
        assert_eq!(clean_value("Acme Corp."), "Acme Corp");
    }
}
