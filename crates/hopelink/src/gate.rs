//! The single choke point for moving money.
//!
//! Every execute path funnels through [`DonationGate::execute`]. The gate
//! checks the confirmation flag and the amount ceiling before any side
//! effect, generates the transaction id, and submits to the ledger exactly
//! once. It performs no retries and writes no business-level logs; those
//! belong to the workflow handlers.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use hopelink_protocol::Proposal;

use crate::backend::{DonationLedger, LedgerReceipt, LedgerRecord};
use crate::config::SafetyLimits;

#[derive(Debug, Error)]
pub enum GateError {
    /// Execute reached without a confirmed flag. This is a programming
    /// error in the caller, not a user mistake.
    #[error("donation execution attempted without confirmation")]
    NotConfirmed,

    #[error("amount ₹{amount:.0} exceeds the single-transaction limit of ₹{limit:.0}")]
    AmountExceedsLimit { amount: f64, limit: f64 },

    #[error("allocation plan has {count} lines, above the limit of {limit}")]
    TooManyAllocations { count: usize, limit: usize },

    #[error("ledger submission failed: {0}")]
    Ledger(#[from] anyhow::Error),
}

pub struct DonationGate {
    ledger: Arc<dyn DonationLedger>,
    limits: SafetyLimits,
}

impl DonationGate {
    pub fn new(ledger: Arc<dyn DonationLedger>, limits: SafetyLimits) -> Self {
        Self { ledger, limits }
    }

    /// Submit a confirmed plan to the ledger.
    ///
    /// Check order is fixed: confirmation first, amount ceiling second,
    /// allocation count third, all before the transaction id exists or the
    /// ledger is touched.
    pub async fn execute(
        &self,
        plan: &Proposal,
        user_id: &str,
        confirmed: bool,
    ) -> Result<LedgerReceipt, GateError> {
        debug_assert!(confirmed, "gate reached with confirmed=false");
        if !confirmed {
            return Err(GateError::NotConfirmed);
        }
        if plan.total_amount > self.limits.max_donation_amount {
            return Err(GateError::AmountExceedsLimit {
                amount: plan.total_amount,
                limit: self.limits.max_donation_amount,
            });
        }
        if plan.allocations.len() > self.limits.max_allocation_count {
            return Err(GateError::TooManyAllocations {
                count: plan.allocations.len(),
                limit: self.limits.max_allocation_count,
            });
        }

        let transaction_id = new_transaction_id();
        let record = LedgerRecord {
            transaction_id,
            user_id: user_id.to_string(),
            workflow: plan.workflow,
            total_amount: plan.total_amount,
            allocations: plan.allocations.clone(),
            orphanage_id: plan.orphanage_id.clone(),
            timestamp: Utc::now(),
            confirmed: true,
        };

        let receipt = self.ledger.submit(&record).await?;
        Ok(receipt)
    }
}

/// Fresh ledger transaction id, `txn_` plus 12 hex characters.
fn new_transaction_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("txn_{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FixtureBackend;
    use hopelink_protocol::{AllocationLine, DonationWorkflow};

    fn limits() -> SafetyLimits {
        SafetyLimits {
            max_donation_amount: 50_000.0,
            always_confirm_above: 1_000.0,
            max_allocation_count: 10,
        }
    }

    fn plan(amount: f64) -> Proposal {
        let mut plan = Proposal::empty(DonationWorkflow::EducationDonation, amount, "plan");
        plan.has_write_action = true;
        plan
    }

    fn line(id: usize, amount: f64) -> AllocationLine {
        AllocationLine {
            beneficiary_id: format!("child_{id:03}"),
            beneficiary_name: format!("Child {id}"),
            allocated_amount: amount,
            funding_needed: amount,
            funding_received: 0.0,
            percentage: 0.0,
            story: String::new(),
            location: String::new(),
            items_needed: vec![],
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_is_refused_with_no_ledger_traffic() {
        let ledger = Arc::new(FixtureBackend::new());
        let gate = Arc::new(DonationGate::new(
            ledger.clone() as Arc<dyn crate::backend::DonationLedger>,
            limits(),
        ));

        let task_gate = Arc::clone(&gate);
        let handle =
            tokio::spawn(async move { task_gate.execute(&plan(5000.0), "u1", false).await });
        match handle.await {
            // Debug builds trip the assert; release builds get the typed error.
            Err(join_error) => assert!(join_error.is_panic()),
            Ok(result) => assert!(matches!(result, Err(GateError::NotConfirmed))),
        }
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_over_limit_is_refused_before_submission() {
        let ledger = Arc::new(FixtureBackend::new());
        let gate = DonationGate::new(ledger.clone(), limits());
        let result = gate.execute(&plan(999_999.0), "u1", true).await;
        assert!(matches!(
            result,
            Err(GateError::AmountExceedsLimit { .. })
        ));
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_allocation_plan_is_refused() {
        let ledger = Arc::new(FixtureBackend::new());
        let gate = DonationGate::new(ledger.clone(), limits());

        let mut oversized = plan(5000.0);
        oversized.allocations = (0..11).map(|id| line(id, 100.0)).collect();
        let result = gate.execute(&oversized, "u1", true).await;
        assert!(matches!(
            result,
            Err(GateError::TooManyAllocations { count: 11, limit: 10 })
        ));
        assert!(ledger.submitted().is_empty());

        // The limit itself passes.
        let mut at_limit = plan(5000.0);
        at_limit.allocations = (0..10).map(|id| line(id, 100.0)).collect();
        assert!(gate.execute(&at_limit, "u1", true).await.is_ok());
    }

    #[tokio::test]
    async fn test_limit_is_inclusive() {
        let ledger = Arc::new(FixtureBackend::new());
        let gate = DonationGate::new(ledger.clone(), limits());
        let receipt = gate.execute(&plan(50_000.0), "u1", true).await.unwrap();
        assert!(receipt.transaction_id.starts_with("txn_"));
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_plan_is_submitted_once() {
        let ledger = Arc::new(FixtureBackend::new());
        let gate = DonationGate::new(ledger.clone(), limits());
        let receipt = gate.execute(&plan(5000.0), "u1", true).await.unwrap();

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].transaction_id, receipt.transaction_id);
        assert!(submitted[0].confirmed);
        assert_eq!(submitted[0].user_id, "u1");
    }

    #[test]
    fn test_transaction_ids_are_unique_and_prefixed() {
        let a = new_transaction_id();
        let b = new_transaction_id();
        assert_ne!(a, b);
        assert!(a.starts_with("txn_"));
        assert_eq!(a.len(), "txn_".len() + 12);
    }
}
