//! Education donation: split one amount across several children.
//!
//! The reference workflow; the other three follow its propose/execute shape.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use hopelink_protocol::{DonationWorkflow, ExecutionResult, Intent, Proposal};

use super::{child_word, fail_execution, format_inr, WorkflowContext, WorkflowHandler};
use crate::allocation::{allocate, rank_by_urgency};
use crate::backend::{AuditEntry, AuditStatus};

pub struct EducationDonation;

const WORKFLOW: DonationWorkflow = DonationWorkflow::EducationDonation;

#[async_trait]
impl WorkflowHandler for EducationDonation {
    async fn propose(
        &self,
        ctx: &WorkflowContext,
        intent: &Intent,
        _user_id: &str,
    ) -> Result<Proposal> {
        let Some(amount) = intent.stated_amount() else {
            return Ok(Proposal::needs_amount(
                WORKFLOW,
                "I found children who need education support! How much would you \
                 like to donate? Even ₹500 can cover a child's books for a month.",
            ));
        };

        // Fetch extra so trimming happens after ranking, not before.
        let children = ctx
            .reader
            .search_children(
                Some("education"),
                ctx.tuning.education_max_results * 2,
                intent.filters.urgent,
            )
            .await?;
        if children.is_empty() {
            return Ok(Proposal::empty(
                WORKFLOW,
                amount,
                "I couldn't find any children needing education support right now. \
                 Please try again later or consider a different category.",
            ));
        }

        let mut ranked = rank_by_urgency(children);
        ranked.truncate(ctx.tuning.education_max_results);
        info!(count = ranked.len(), "education candidates selected");

        let allocations = allocate(amount, &ranked);
        if allocations.is_empty() {
            return Ok(Proposal::empty(
                WORKFLOW,
                amount,
                "Could not calculate an allocation. Please try a different amount.",
            ));
        }

        let summary = build_proposal_summary(amount, &allocations, intent.filters.item.as_deref());
        let mut proposal = Proposal::empty(WORKFLOW, amount, summary);
        proposal.allocations = allocations;
        proposal.has_write_action = true;
        Ok(proposal)
    }

    async fn execute(
        &self,
        ctx: &WorkflowContext,
        _intent: &Intent,
        user_id: &str,
        proposal: &Proposal,
    ) -> ExecutionResult {
        let total_amount = proposal.total_amount;

        let receipt = match ctx.gate.execute(proposal, user_id, true).await {
            Ok(receipt) => receipt,
            Err(e) => return fail_execution(ctx, WORKFLOW, user_id, total_amount, e.into()).await,
        };

        // The donation is recorded; funding updates are best-effort from here.
        for line in &proposal.allocations {
            if line.allocated_amount <= 0.0 {
                continue;
            }
            if let Err(e) = ctx
                .ledger
                .update_funding_status(
                    &line.beneficiary_id,
                    line.allocated_amount,
                    &receipt.transaction_id,
                )
                .await
            {
                warn!(beneficiary = %line.beneficiary_id, error = %e,
                    "funding update failed; donation already recorded");
            }
        }

        ctx.ledger
            .log_donation(&AuditEntry::new(
                user_id,
                WORKFLOW,
                total_amount,
                AuditStatus::Success,
                &receipt.transaction_id,
                serde_json::json!({ "children_count": proposal.allocations.len() }),
            ))
            .await;

        let count = proposal.allocations.len();
        let names: Vec<&str> = proposal
            .allocations
            .iter()
            .take(3)
            .map(|line| line.beneficiary_name.as_str())
            .collect();
        let mut names_text = names.join(", ");
        if count > 3 {
            names_text.push_str(&format!(" and {} more", count - 3));
        }

        let impact_summary = format!(
            "Your donation of {} has been processed! You are now helping {} {} \
             ({}) with their education. They will receive books, uniforms, and \
             school fee support. Transaction ID: {}",
            format_inr(total_amount),
            count,
            child_word(count),
            names_text,
            receipt.transaction_id,
        );

        ExecutionResult {
            success: true,
            workflow: WORKFLOW,
            transaction_id: Some(receipt.transaction_id),
            total_amount,
            allocations: proposal.allocations.clone(),
            beneficiaries_helped: count,
            impact_summary,
            fully_funded: None,
            remaining_needed: None,
            sponsorship_id: None,
            supply_request_id: None,
            error: None,
        }
    }
}

fn build_proposal_summary(
    amount: f64,
    allocations: &[hopelink_protocol::AllocationLine],
    specific_item: Option<&str>,
) -> String {
    let item_text = specific_item
        .map(|item| format!(" for {item}"))
        .unwrap_or_default();
    let mut lines = vec![
        format!(
            "Here's how your {} donation{} will be allocated:",
            format_inr(amount),
            item_text
        ),
        String::new(),
    ];

    for (index, line) in allocations.iter().enumerate() {
        let items = if line.items_needed.is_empty() {
            "education support".to_string()
        } else {
            line.items_needed.join(", ")
        };
        let location = if line.location.is_empty() {
            "India"
        } else {
            &line.location
        };
        lines.push(format!(
            "{}. {} ({}) - {} ({}%) - Needs: {}",
            index + 1,
            line.beneficiary_name,
            location,
            format_inr(line.allocated_amount),
            line.percentage,
            items,
        ));
    }

    let count = allocations.len();
    lines.push(String::new());
    lines.push(format!(
        "Total: {} helping {} {}.",
        format_inr(amount),
        count,
        child_word(count)
    ));
    lines.push("Would you like to confirm this donation?".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hopelink_protocol::IntentFilters;

    use crate::backend::FixtureBackend;
    use crate::config::EngineConfig;
    use crate::gate::DonationGate;

    fn context(fixture: Arc<FixtureBackend>) -> WorkflowContext {
        let config = EngineConfig::default();
        WorkflowContext {
            reader: fixture.clone(),
            ledger: fixture.clone(),
            gate: DonationGate::new(fixture, config.safety.clone()),
            tuning: config.workflows,
        }
    }

    fn intent(amount: Option<f64>) -> Intent {
        Intent {
            workflow: WORKFLOW,
            amount,
            filters: IntentFilters {
                category: Some("education".into()),
                urgent: false,
                item: None,
            },
            confidence: 0.85,
            needs_clarification: false,
            clarification_question: None,
            raw_message: "donate for education".into(),
        }
    }

    #[tokio::test]
    async fn test_propose_splits_across_education_children() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());

        let proposal = EducationDonation
            .propose(&ctx, &intent(Some(5000.0)), "u1")
            .await
            .unwrap();

        assert!(proposal.has_write_action);
        assert_eq!(proposal.allocations.len(), 3);
        let total: f64 = proposal.allocations.iter().map(|l| l.allocated_amount).sum();
        assert!((total - 5000.0).abs() < 1e-6);
        // Highest urgency (Arjun, 0.9) leads the plan.
        assert_eq!(proposal.allocations[0].beneficiary_id, "child_001");
        // Proposing never writes.
        assert!(fixture.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_propose_without_amount_asks_for_one() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture);
        let proposal = EducationDonation
            .propose(&ctx, &intent(None), "u1")
            .await
            .unwrap();
        assert!(proposal.needs_amount);
        assert!(!proposal.has_write_action);
        assert!(proposal.allocations.is_empty());
    }

    #[tokio::test]
    async fn test_propose_with_empty_pool_has_no_write_action() {
        let fixture = Arc::new(FixtureBackend::with_children(vec![]));
        let ctx = context(fixture);
        let proposal = EducationDonation
            .propose(&ctx, &intent(Some(5000.0)), "u1")
            .await
            .unwrap();
        assert!(!proposal.has_write_action);
        assert!(proposal.allocations.is_empty());
        assert!(proposal.summary.contains("couldn't find"));
    }

    #[tokio::test]
    async fn test_execute_credits_each_line_and_audits() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = EducationDonation
            .propose(&ctx, &intent(Some(5000.0)), "u1")
            .await
            .unwrap();

        let result = EducationDonation
            .execute(&ctx, &intent(Some(5000.0)), "u1", &proposal)
            .await;

        assert!(result.success);
        assert_eq!(fixture.submitted().len(), 1);
        assert_eq!(fixture.funding_updates().len(), proposal.allocations.len());
        let audit = fixture.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, AuditStatus::Success);
        assert!(result.impact_summary.contains("Transaction ID"));
    }

    #[tokio::test]
    async fn test_execute_failure_says_no_money_charged() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = EducationDonation
            .propose(&ctx, &intent(Some(5000.0)), "u1")
            .await
            .unwrap();

        let failing = Arc::new(FixtureBackend::new().failing_writes());
        let failing_ctx = WorkflowContext {
            reader: failing.clone(),
            ledger: failing.clone(),
            gate: DonationGate::new(failing.clone(), EngineConfig::default().safety),
            tuning: EngineConfig::default().workflows,
        };

        let result = EducationDonation
            .execute(&failing_ctx, &intent(Some(5000.0)), "u1", &proposal)
            .await;

        assert!(!result.success);
        assert!(result.impact_summary.contains("No money has been charged"));
        let audit = failing.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, AuditStatus::Failed);
    }
}
