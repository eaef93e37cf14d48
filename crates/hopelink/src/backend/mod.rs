//! Boundaries to the platform backend.
//!
//! Two traits split reads from writes: [`BeneficiaryReader`] is safe to call
//! in propose mode (zero side effects); [`DonationLedger`] moves money and is
//! only ever reached through the donation gate in execute mode.

mod fixture;
mod http;

pub use fixture::FixtureBackend;
pub use http::HttpBackend;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hopelink_protocol::{AllocationLine, Beneficiary, DonationWorkflow, Orphanage, SupplyNeed};

/// Read-only search over beneficiaries and orphanages.
#[async_trait]
pub trait BeneficiaryReader: Send + Sync {
    async fn search_children(
        &self,
        category: Option<&str>,
        max_results: usize,
        urgent_only: bool,
    ) -> Result<Vec<Beneficiary>>;

    async fn search_orphanages(
        &self,
        supply_type: Option<&str>,
        urgent_only: bool,
        max_results: usize,
    ) -> Result<Vec<Orphanage>>;
}

/// One executed donation as submitted to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Unique per execution; lets the backend drop duplicate submissions.
    pub transaction_id: String,
    pub user_id: String,
    pub workflow: DonationWorkflow,
    pub total_amount: f64,
    pub allocations: Vec<AllocationLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphanage_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Explicit flag the backend validates as well.
    pub confirmed: bool,
}

/// Acknowledgement returned by the ledger for a submitted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub transaction_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Recurring sponsorship creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorshipRequest {
    pub beneficiary_id: String,
    pub user_id: String,
    pub monthly_amount: f64,
    pub transaction_id: String,
}

/// Supply delivery request for an orphanage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyRequest {
    pub orphanage_id: String,
    pub user_id: String,
    pub items: Vec<SupplyNeed>,
    pub total_amount: f64,
    pub transaction_id: String,
}

/// Terminal state of a donation attempt, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failed,
}

/// One audit trail entry. Written for every donation attempt, success or
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: String,
    pub workflow: DonationWorkflow,
    pub amount: f64,
    pub status: AuditStatus,
    pub transaction_id: String,
    #[serde(default)]
    pub detail: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        user_id: &str,
        workflow: DonationWorkflow,
        amount: f64,
        status: AuditStatus,
        transaction_id: &str,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            workflow,
            amount,
            status,
            transaction_id: transaction_id.to_string(),
            detail,
            timestamp: Utc::now(),
        }
    }
}

/// Money-movement and side-record writes.
#[async_trait]
pub trait DonationLedger: Send + Sync {
    /// Record an executed donation. The only call that moves money.
    async fn submit(&self, record: &LedgerRecord) -> Result<LedgerReceipt>;

    /// Credit a beneficiary's funding progress. Best-effort: the donation is
    /// already recorded when this runs, so callers log failures and move on.
    async fn update_funding_status(
        &self,
        beneficiary_id: &str,
        amount_added: f64,
        transaction_id: &str,
    ) -> Result<()>;

    /// Create the recurring sponsorship record; returns its id.
    async fn create_sponsorship(&self, request: &SponsorshipRequest) -> Result<String>;

    /// Record a supply delivery request; returns its id.
    async fn create_supply_request(&self, request: &SupplyRequest) -> Result<String>;

    /// Append to the audit trail. Must never fail the caller.
    async fn log_donation(&self, entry: &AuditEntry);
}
