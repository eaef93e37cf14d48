//! Core data model: workflows, intents, proposals, and execution results.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Session ID - Newtype to prevent mixing with other IDs
// ============================================================================

/// Opaque conversation session identifier supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

// ============================================================================
// Donation Workflow - The closed routing enumeration
// ============================================================================

/// The four donation workflows the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationWorkflow {
    /// Donate money for children's education, split across several children
    EducationDonation,
    /// Urgent medical fundraising, full amount to a single child
    EmergencyMedical,
    /// Physical supplies for an orphanage
    OrphanageSupply,
    /// Long-term monthly sponsorship of an individual child
    ChildSponsorship,
}

impl DonationWorkflow {
    pub const ALL: [DonationWorkflow; 4] = [
        DonationWorkflow::EducationDonation,
        DonationWorkflow::EmergencyMedical,
        DonationWorkflow::OrphanageSupply,
        DonationWorkflow::ChildSponsorship,
    ];

    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationWorkflow::EducationDonation => "education_donation",
            DonationWorkflow::EmergencyMedical => "emergency_medical",
            DonationWorkflow::OrphanageSupply => "orphanage_supply",
            DonationWorkflow::ChildSponsorship => "child_sponsorship",
        }
    }

    /// Whether the donation amount is split across several recipients.
    pub fn splits_amount(&self) -> bool {
        matches!(self, DonationWorkflow::EducationDonation)
    }
}

impl fmt::Display for DonationWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing a DonationWorkflow from string.
#[derive(Debug, Error, Clone)]
#[error("unknown workflow: {0}")]
pub struct WorkflowParseError(String);

impl std::str::FromStr for DonationWorkflow {
    type Err = WorkflowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "education_donation" => Ok(DonationWorkflow::EducationDonation),
            "emergency_medical" => Ok(DonationWorkflow::EmergencyMedical),
            "orphanage_supply" => Ok(DonationWorkflow::OrphanageSupply),
            "child_sponsorship" => Ok(DonationWorkflow::ChildSponsorship),
            _ => Err(WorkflowParseError(s.to_string())),
        }
    }
}

// ============================================================================
// Intent - Classification result
// ============================================================================

/// Filters extracted from the user message, consumed by workflow handlers
/// to narrow beneficiary search. All fields are optional hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    /// Specific item mentioned, e.g. "blankets" or "books"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
}

/// Structured interpretation of a user's free-text request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub workflow: DonationWorkflow,
    /// Donation amount in rupees, if the user stated one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub filters: IntentFilters,
    /// Classifier certainty in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub needs_clarification: bool,
    /// Must be present when `needs_clarification` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    /// Original message, retained for audit and logging only.
    #[serde(default)]
    pub raw_message: String,
}

impl Intent {
    /// An intent the operator may route to a workflow.
    pub fn is_actionable(&self) -> bool {
        !self.needs_clarification
    }

    /// A positive, stated amount; `None` means the user did not give one.
    pub fn stated_amount(&self) -> Option<f64> {
        self.amount.filter(|amount| *amount > 0.0)
    }
}

// ============================================================================
// Beneficiary records - read boundary shapes
// ============================================================================

/// A child record returned by the beneficiary read boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    pub category: String,
    pub funding_needed: f64,
    pub funding_received: f64,
    /// Normalized ranking signal in [0, 1].
    pub urgency_score: f64,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub items_needed: Vec<String>,
}

impl Beneficiary {
    /// Funding still required; never negative.
    pub fn outstanding_need(&self) -> f64 {
        (self.funding_needed - self.funding_received).max(0.0)
    }
}

/// One supply line an orphanage has asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyNeed {
    pub item: String,
    pub quantity: u32,
    pub estimated_cost: f64,
}

/// An orphanage record returned by the read boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orphanage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub urgency_score: f64,
    #[serde(default)]
    pub urgent: bool,
    pub children_count: u32,
    #[serde(default)]
    pub supplies_needed: Vec<SupplyNeed>,
    #[serde(default)]
    pub verified: bool,
}

// ============================================================================
// Proposal - the not-yet-executed allocation plan
// ============================================================================

/// One beneficiary's share of a donation amount within a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub allocated_amount: f64,
    /// Outstanding need at proposal time.
    pub funding_needed: f64,
    pub funding_received: f64,
    /// Share of the donated total, not of the recipient's own need.
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub story: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items_needed: Vec<String>,
}

/// An emergency case card shown to the donor in the medical workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalCase {
    pub beneficiary_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    pub condition: String,
    #[serde(default)]
    pub location: String,
    pub urgency_score: f64,
    #[serde(default)]
    pub story: String,
    pub funding_needed: f64,
    pub funding_received: f64,
    pub still_needed: f64,
    /// Funding progress as a percentage of the goal.
    pub progress_pct: f64,
    /// How much of the remaining need this donation would cover, capped at 100.
    pub donation_covers_pct: f64,
}

/// A computed, not-yet-executed allocation plan shown to the user for
/// confirmation. Workflow-specific fields are optional and omitted on the
/// wire when unused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub workflow: DonationWorkflow,
    pub total_amount: f64,
    pub allocations: Vec<AllocationLine>,
    pub summary: String,
    pub has_write_action: bool,
    /// True when the user must state an amount before anything can happen.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_amount: bool,
    /// Emergency medical: top cases shown to the donor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cases: Option<Vec<MedicalCase>>,
    /// Emergency medical: default recipient (most critical case).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_beneficiary_id: Option<String>,
    /// Emergency medical: donor override set by the caller before confirm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_beneficiary_id: Option<String>,
    /// Child sponsorship: the recurring monthly figure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_amount: Option<f64>,
    /// Orphanage supply: receiving orphanage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphanage_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphanage_name: Option<String>,
    /// Orphanage supply: items covered by the donation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supply_items: Option<Vec<SupplyNeed>>,
}

impl Proposal {
    /// A bare proposal with no allocations and no write action.
    pub fn empty(workflow: DonationWorkflow, total_amount: f64, summary: impl Into<String>) -> Self {
        Self {
            workflow,
            total_amount,
            allocations: Vec::new(),
            summary: summary.into(),
            has_write_action: false,
            needs_amount: false,
            cases: None,
            recommended_beneficiary_id: None,
            selected_beneficiary_id: None,
            monthly_amount: None,
            orphanage_id: None,
            orphanage_name: None,
            supply_items: None,
        }
    }

    /// Terminal propose outcome: the user never stated an amount.
    pub fn needs_amount(workflow: DonationWorkflow, prompt: impl Into<String>) -> Self {
        let mut proposal = Self::empty(workflow, 0.0, prompt);
        proposal.needs_amount = true;
        proposal
    }

    pub fn allocated_total(&self) -> f64 {
        self.allocations.iter().map(|line| line.allocated_amount).sum()
    }
}

// ============================================================================
// Execution result
// ============================================================================

/// Outcome of executing a confirmed proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub workflow: DonationWorkflow,
    /// Unique per executed donation; used for idempotency and audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub total_amount: f64,
    /// The amounts and beneficiaries actually credited.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<AllocationLine>,
    pub beneficiaries_helped: usize,
    pub impact_summary: String,
    /// Emergency medical: did this donation complete the funding goal?
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_funded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_needed: Option<f64>,
    /// Child sponsorship: id of the recurring record created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsorship_id: Option<String>,
    /// Orphanage supply: id of the delivery request created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supply_request_id: Option<String>,
    /// Internal error detail; logged, never shown to the end user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A failure result with a user-safe message. The message must make
    /// clear that no money was charged.
    pub fn failure(
        workflow: DonationWorkflow,
        total_amount: f64,
        impact_summary: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            success: false,
            workflow,
            transaction_id: None,
            total_amount,
            allocations: Vec::new(),
            beneficiaries_helped: 0,
            impact_summary: impact_summary.into(),
            fully_funded: None,
            remaining_needed: None,
            sponsorship_id: None,
            supply_request_id: None,
            error,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_roundtrip() {
        for workflow in DonationWorkflow::ALL {
            let s = workflow.as_str();
            let parsed: DonationWorkflow = s.parse().unwrap();
            assert_eq!(workflow, parsed);
        }
    }

    #[test]
    fn test_workflow_parse_rejects_unknown() {
        assert!("orphanage_suply".parse::<DonationWorkflow>().is_err());
        assert!("".parse::<DonationWorkflow>().is_err());
    }

    #[test]
    fn test_workflow_serde_uses_snake_case() {
        let encoded = serde_json::to_string(&DonationWorkflow::EmergencyMedical).unwrap();
        assert_eq!(encoded, "\"emergency_medical\"");
        let decoded: DonationWorkflow = serde_json::from_str("\"child_sponsorship\"").unwrap();
        assert_eq!(decoded, DonationWorkflow::ChildSponsorship);
    }

    #[test]
    fn test_outstanding_need_never_negative() {
        let child = Beneficiary {
            id: "child_001".into(),
            name: "Arjun".into(),
            age: Some(10),
            category: "education".into(),
            funding_needed: 1000.0,
            funding_received: 1500.0,
            urgency_score: 0.5,
            urgent: false,
            story: String::new(),
            location: String::new(),
            items_needed: vec![],
        };
        assert_eq!(child.outstanding_need(), 0.0);
    }

    #[test]
    fn test_needs_amount_proposal_shape() {
        let proposal =
            Proposal::needs_amount(DonationWorkflow::EducationDonation, "How much?");
        assert!(proposal.needs_amount);
        assert!(!proposal.has_write_action);
        assert!(proposal.allocations.is_empty());
        assert_eq!(proposal.total_amount, 0.0);
    }

    #[test]
    fn test_stated_amount_filters_non_positive() {
        let mut intent = Intent {
            workflow: DonationWorkflow::EducationDonation,
            amount: Some(0.0),
            filters: IntentFilters::default(),
            confidence: 1.0,
            needs_clarification: false,
            clarification_question: None,
            raw_message: String::new(),
        };
        assert_eq!(intent.stated_amount(), None);
        intent.amount = Some(250.0);
        assert_eq!(intent.stated_amount(), Some(250.0));
    }
}
