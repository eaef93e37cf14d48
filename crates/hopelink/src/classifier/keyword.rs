//! Keyword-based intent classification.
//!
//! No network, no API key; this is both the default classifier and the
//! fallback when an LLM call fails. Priority order is most-specific first:
//! medical, then sponsorship, then supply, with education as the default.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use hopelink_protocol::{DonationWorkflow, Intent, IntentFilters};

use super::Classifier;

const URGENT_KEYWORDS: &[&str] = &[
    "urgent",
    "emergency",
    "critical",
    "immediately",
    "asap",
    "right now",
    "serious",
    "severe",
];

const MEDICAL_KEYWORDS: &[&str] = &[
    "sick",
    "hospital",
    "surgery",
    "treatment",
    "medicine",
    "medical",
    "disease",
    "operation",
    "doctor",
    "ill",
    "emergency",
    "cancer",
    "injury",
    "health",
];

const SPONSORSHIP_KEYWORDS: &[&str] = &[
    "sponsor",
    "sponsorship",
    "monthly",
    "long-term",
    "long term",
    "adopt",
    "support a child",
    "regular",
];

const SUPPLY_KEYWORDS: &[&str] = &[
    "supply",
    "supplies",
    "blanket",
    "blankets",
    "food",
    "clothes",
    "clothing",
    "uniform",
    "uniforms",
    "items",
    "material",
    "stationery",
    "toys",
    "mattress",
    "bed",
    "orphanage",
    "send",
    "donate items",
    "donate goods",
];

const EDUCATION_KEYWORDS: &[&str] = &[
    "education",
    "school",
    "book",
    "books",
    "study",
    "learn",
    "uniform",
    "fee",
    "fees",
    "tuition",
    "scholarship",
    "college",
    "class",
    "stationary",
];

/// `(keyword, canonical item name)` pairs for supply item detection.
const ITEM_MAP: &[(&str, &str)] = &[
    ("blanket", "blankets"),
    ("book", "books"),
    ("uniform", "uniforms"),
    ("food", "food"),
    ("toy", "toys"),
    ("stationery", "stationery"),
    ("clothes", "clothing"),
    ("mattress", "mattress"),
];

const CLARIFICATION_QUESTION: &str =
    "I'd love to help! Could you tell me more about what you'd like to do? \
     For example: donate money for education, help with a medical emergency, \
     send supplies to an orphanage, or sponsor a child monthly?";

pub struct KeywordClassifier {
    amount_patterns: Vec<Regex>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        // Matches: ₹5000, Rs 5,000, 5000 rupees, INR 5000. Patterns are
        // applied to the lowercased message.
        let amount_patterns = [
            r"₹\s*(\d+(?:,\d+)*(?:\.\d+)?)",
            r"rs\.?\s*(\d+(?:,\d+)*(?:\.\d+)?)",
            r"(\d+(?:,\d+)*(?:\.\d+)?)\s*rupees",
            r"inr\s*(\d+(?:,\d+)*(?:\.\d+)?)",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("amount pattern is valid"))
        .collect();
        Self { amount_patterns }
    }

    /// Pull the first rupee amount out of a lowercased message.
    fn extract_amount(&self, msg: &str) -> Option<f64> {
        for pattern in &self.amount_patterns {
            if let Some(captures) = pattern.captures(msg) {
                let raw = captures.get(1)?.as_str().replace(',', "");
                if let Ok(amount) = raw.parse::<f64>() {
                    return Some(amount);
                }
            }
        }
        None
    }

    /// The synchronous classification core.
    pub fn classify_message(&self, message: &str) -> Intent {
        let msg = message.to_lowercase();
        let amount = self.extract_amount(&msg);
        let is_urgent = contains_any(&msg, URGENT_KEYWORDS);

        if contains_any(&msg, MEDICAL_KEYWORDS) {
            return Intent {
                workflow: DonationWorkflow::EmergencyMedical,
                amount,
                filters: IntentFilters {
                    category: Some("medical".into()),
                    urgent: true,
                    item: None,
                },
                confidence: 0.85,
                needs_clarification: false,
                clarification_question: None,
                raw_message: message.to_string(),
            };
        }

        if contains_any(&msg, SPONSORSHIP_KEYWORDS) {
            return Intent {
                workflow: DonationWorkflow::ChildSponsorship,
                amount,
                filters: IntentFilters {
                    category: Some("sponsorship".into()),
                    urgent: is_urgent,
                    item: None,
                },
                confidence: 0.85,
                needs_clarification: false,
                clarification_question: None,
                raw_message: message.to_string(),
            };
        }

        if contains_any(&msg, SUPPLY_KEYWORDS) {
            let item = ITEM_MAP
                .iter()
                .find(|(keyword, _)| msg.contains(keyword))
                .map(|(_, canonical)| canonical.to_string());
            return Intent {
                workflow: DonationWorkflow::OrphanageSupply,
                amount,
                filters: IntentFilters {
                    category: Some("supplies".into()),
                    urgent: is_urgent,
                    item,
                },
                confidence: 0.85,
                needs_clarification: false,
                clarification_question: None,
                raw_message: message.to_string(),
            };
        }

        if contains_any(&msg, EDUCATION_KEYWORDS) {
            return Intent {
                workflow: DonationWorkflow::EducationDonation,
                amount,
                filters: IntentFilters {
                    category: Some("education".into()),
                    urgent: is_urgent,
                    item: None,
                },
                confidence: 0.85,
                needs_clarification: false,
                clarification_question: None,
                raw_message: message.to_string(),
            };
        }

        // No keyword matched. Very short messages are too vague to act on.
        if msg.split_whitespace().count() < 4 {
            return Intent {
                workflow: DonationWorkflow::EducationDonation,
                amount,
                filters: IntentFilters::default(),
                confidence: 0.3,
                needs_clarification: true,
                clarification_question: Some(CLARIFICATION_QUESTION.to_string()),
                raw_message: message.to_string(),
            };
        }

        // Generic donation talk defaults to education.
        Intent {
            workflow: DonationWorkflow::EducationDonation,
            amount,
            filters: IntentFilters {
                category: None,
                urgent: is_urgent,
                item: None,
            },
            confidence: 0.6,
            needs_clarification: false,
            clarification_question: None,
            raw_message: message.to_string(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_any(msg: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| msg.contains(keyword))
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, message: &str) -> Result<Intent> {
        Ok(self.classify_message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_extraction_variants() {
        let classifier = KeywordClassifier::new();
        assert_eq!(classifier.extract_amount("donate ₹5000 now"), Some(5000.0));
        assert_eq!(classifier.extract_amount("rs. 2,500 please"), Some(2500.0));
        assert_eq!(classifier.extract_amount("give 750 rupees"), Some(750.0));
        assert_eq!(classifier.extract_amount("inr 1200.50"), Some(1200.5));
        assert_eq!(classifier.extract_amount("no amount here"), None);
    }

    #[test]
    fn test_medical_outranks_other_categories() {
        let classifier = KeywordClassifier::new();
        // "school" would match education, but "surgery" wins.
        let intent =
            classifier.classify_message("Help a school child who needs urgent surgery, ₹10000");
        assert_eq!(intent.workflow, DonationWorkflow::EmergencyMedical);
        assert_eq!(intent.amount, Some(10_000.0));
        assert!(intent.filters.urgent);
    }

    #[test]
    fn test_sponsorship_outranks_supply_and_education() {
        let classifier = KeywordClassifier::new();
        let intent = classifier.classify_message("I want to sponsor a child monthly for school");
        assert_eq!(intent.workflow, DonationWorkflow::ChildSponsorship);
        assert_eq!(intent.filters.category.as_deref(), Some("sponsorship"));
    }

    #[test]
    fn test_supply_detects_specific_item() {
        let classifier = KeywordClassifier::new();
        let intent =
            classifier.classify_message("Send blankets to an orphanage that needs them urgently");
        assert_eq!(intent.workflow, DonationWorkflow::OrphanageSupply);
        assert_eq!(intent.filters.item.as_deref(), Some("blankets"));
        assert!(intent.filters.urgent);
    }

    #[test]
    fn test_education_keywords_match() {
        let classifier = KeywordClassifier::new();
        let intent =
            classifier.classify_message("Donate ₹5000 for children's tuition and scholarship");
        assert_eq!(intent.workflow, DonationWorkflow::EducationDonation);
        assert_eq!(intent.amount, Some(5000.0));
    }

    #[test]
    fn test_short_vague_message_needs_clarification() {
        let classifier = KeywordClassifier::new();
        let intent = classifier.classify_message("Help");
        assert!(intent.needs_clarification);
        assert!(intent.clarification_question.is_some());
        assert_eq!(intent.confidence, 0.3);
    }

    #[test]
    fn test_longer_generic_message_defaults_to_education() {
        let classifier = KeywordClassifier::new();
        let intent = classifier.classify_message("I want to donate ₹2000 to a good cause");
        assert_eq!(intent.workflow, DonationWorkflow::EducationDonation);
        assert!(!intent.needs_clarification);
        assert_eq!(intent.confidence, 0.6);
        assert_eq!(intent.amount, Some(2000.0));
    }
}
