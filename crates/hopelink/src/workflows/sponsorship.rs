//! Child sponsorship: a recurring monthly commitment to one child.
//!
//! The proposal picks the child waiting longest for a sponsor (highest
//! urgency), and execution records the first month's payment plus a
//! sponsorship enrolment with the backend.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use hopelink_protocol::{
    AllocationLine, Beneficiary, DonationWorkflow, ExecutionResult, Intent, Proposal,
};

use super::{fail_execution, format_inr, WorkflowContext, WorkflowHandler};
use crate::allocation::rank_by_urgency;
use crate::backend::{AuditEntry, AuditStatus, SponsorshipRequest};

pub struct ChildSponsorship;

const WORKFLOW: DonationWorkflow = DonationWorkflow::ChildSponsorship;

/// Candidates to fetch; only the top-ranked child is proposed.
const SEARCH_POOL_SIZE: usize = 5;

#[async_trait]
impl WorkflowHandler for ChildSponsorship {
    async fn propose(
        &self,
        ctx: &WorkflowContext,
        intent: &Intent,
        _user_id: &str,
    ) -> Result<Proposal> {
        let Some(amount) = intent.stated_amount() else {
            return Ok(Proposal::needs_amount(
                WORKFLOW,
                format!(
                    "Sponsoring a child is a wonderful commitment! How much would \
                     you like to give each month? Most sponsors give {} or more, \
                     which covers food, education, and healthcare.",
                    format_inr(ctx.tuning.sponsorship_min_amount)
                ),
            ));
        };

        let children = ctx
            .reader
            .search_children(Some("sponsorship"), SEARCH_POOL_SIZE, intent.filters.urgent)
            .await?;
        if children.is_empty() {
            return Ok(Proposal::empty(
                WORKFLOW,
                amount,
                "I couldn't find any children awaiting sponsorship right now. \
                 Please try again later.",
            ));
        }

        let ranked = rank_by_urgency(children);
        info!(count = ranked.len(), "sponsorship candidates found");
        let child = &ranked[0];

        let summary =
            build_proposal_summary(amount, child, ctx.tuning.sponsorship_min_amount);
        let mut proposal = Proposal::empty(WORKFLOW, amount, summary);
        proposal.allocations = vec![AllocationLine {
            beneficiary_id: child.id.clone(),
            beneficiary_name: child.name.clone(),
            allocated_amount: amount,
            funding_needed: child.outstanding_need(),
            funding_received: child.funding_received,
            percentage: 100.0,
            story: child.story.clone(),
            location: child.location.clone(),
            items_needed: child.items_needed.clone(),
        }];
        proposal.has_write_action = true;
        proposal.monthly_amount = Some(amount);
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

        let Some(line) = proposal.allocations.first() else {
            return ExecutionResult::failure(
                WORKFLOW,
                total_amount,
                "Could not find the selected child. Please try again.",
                None,
            );
        };

        let receipt = match ctx.gate.execute(proposal, user_id, true).await {
            Ok(receipt) => receipt,
            Err(e) => return fail_execution(ctx, WORKFLOW, user_id, total_amount, e.into()).await,
        };

        // First month is recorded; the remaining steps are best-effort.
        if let Err(e) = ctx
            .ledger
            .update_funding_status(&line.beneficiary_id, total_amount, &receipt.transaction_id)
            .await
        {
            warn!(beneficiary = %line.beneficiary_id, error = %e,
                "funding update failed; donation already recorded");
        }

        let sponsorship_id = match ctx
            .ledger
            .create_sponsorship(&SponsorshipRequest {
                beneficiary_id: line.beneficiary_id.clone(),
                user_id: user_id.to_string(),
                monthly_amount: proposal.monthly_amount.unwrap_or(total_amount),
                transaction_id: receipt.transaction_id.clone(),
            })
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(beneficiary = %line.beneficiary_id, error = %e,
                    "sponsorship enrolment failed; first payment already recorded");
                None
            }
        };

        ctx.ledger
            .log_donation(&AuditEntry::new(
                user_id,
                WORKFLOW,
                total_amount,
                AuditStatus::Success,
                &receipt.transaction_id,
                serde_json::json!({
                    "beneficiary_id": line.beneficiary_id,
                    "monthly_amount": proposal.monthly_amount,
                }),
            ))
            .await;

        let impact_summary = format!(
            "Congratulations! Your monthly sponsorship of {} for {} has begun. \
             Your first payment is recorded and you'll receive monthly updates \
             with photos and progress reports. Transaction ID: {}",
            format_inr(total_amount),
            line.beneficiary_name,
            receipt.transaction_id,
        );

        ExecutionResult {
            success: true,
            workflow: WORKFLOW,
            transaction_id: Some(receipt.transaction_id),
            total_amount,
            allocations: proposal.allocations.clone(),
            beneficiaries_helped: 1,
            impact_summary,
            fully_funded: None,
            remaining_needed: None,
            sponsorship_id,
            supply_request_id: None,
            error: None,
        }
    }
}

fn build_proposal_summary(amount: f64, child: &Beneficiary, min_amount: f64) -> String {
    let age = child
        .age
        .map(|age| format!(", age {age}"))
        .unwrap_or_default();
    let mut lines = vec![
        "I found a child who would love a sponsor!".to_string(),
        String::new(),
        format!("{}{} ({})", child.name, age, child.location),
    ];
    if !child.story.is_empty() {
        lines.push(format!("\"{}\"", child.story));
    }
    lines.push(String::new());
    lines.push(format!(
        "Your monthly sponsorship of {} will cover their food, education, \
         and healthcare.",
        format_inr(amount)
    ));
    if amount < min_amount {
        lines.push(format!(
            "Note: {} per month is below our usual minimum of {}. A smaller \
             amount still helps, but full coverage starts at {}.",
            format_inr(amount),
            format_inr(min_amount),
            format_inr(min_amount)
        ));
    }
    lines.push("Would you like to confirm this monthly sponsorship?".to_string());
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
                category: Some("sponsorship".into()),
                urgent: false,
                item: None,
            },
            confidence: 0.85,
            needs_clarification: false,
            clarification_question: None,
            raw_message: "sponsor a child monthly".into(),
        }
    }

    #[tokio::test]
    async fn test_propose_picks_single_child_with_monthly_amount() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = ChildSponsorship
            .propose(&ctx, &intent(Some(1500.0)), "u1")
            .await
            .unwrap();

        assert_eq!(proposal.allocations.len(), 1);
        // Fatima is the only sponsorship-category child in the pool.
        assert_eq!(proposal.allocations[0].beneficiary_id, "child_004");
        assert_eq!(proposal.monthly_amount, Some(1500.0));
        assert!(proposal.has_write_action);
        assert!(fixture.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_propose_warns_below_monthly_minimum() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture);
        let proposal = ChildSponsorship
            .propose(&ctx, &intent(Some(300.0)), "u1")
            .await
            .unwrap();
        assert!(proposal.summary.contains("below our usual minimum"));
        // A low amount is a warning, not a refusal.
        assert!(proposal.has_write_action);
    }

    #[tokio::test]
    async fn test_execute_enrols_sponsorship_and_credits_child() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = ChildSponsorship
            .propose(&ctx, &intent(Some(1500.0)), "u1")
            .await
            .unwrap();

        let result = ChildSponsorship
            .execute(&ctx, &intent(Some(1500.0)), "u1", &proposal)
            .await;

        assert!(result.success);
        assert!(result.sponsorship_id.is_some());
        let sponsorships = fixture.sponsorships();
        assert_eq!(sponsorships.len(), 1);
        assert_eq!(sponsorships[0].beneficiary_id, "child_004");
        assert_eq!(sponsorships[0].monthly_amount, 1500.0);
        assert_eq!(
            fixture.funding_updates(),
            vec![("child_004".to_string(), 1500.0)]
        );
        assert!(result.impact_summary.contains("monthly sponsorship"));
    }

    #[tokio::test]
    async fn test_execute_with_empty_plan_fails_before_the_gate() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = Proposal::empty(WORKFLOW, 1500.0, "stale");

        let result = ChildSponsorship
            .execute(&ctx, &intent(Some(1500.0)), "u1", &proposal)
            .await;
        assert!(!result.success);
        assert!(fixture.submitted().is_empty());
    }
}
