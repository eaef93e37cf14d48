//! Orphanage supply: fund supplies for the most urgent orphanage.
//!
//! Proposes the top orphanages matching the requested item, directs the full
//! amount to the most urgent one, and raises a supply request with the
//! backend after the donation is recorded.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use hopelink_protocol::{
    AllocationLine, DonationWorkflow, ExecutionResult, Intent, Orphanage, Proposal, SupplyNeed,
};

use super::{fail_execution, format_inr, WorkflowContext, WorkflowHandler};
use crate::allocation::rank_by_urgency;
use crate::backend::{AuditEntry, AuditStatus, SupplyRequest};

pub struct OrphanageSupply;

const WORKFLOW: DonationWorkflow = DonationWorkflow::OrphanageSupply;

#[async_trait]
impl WorkflowHandler for OrphanageSupply {
    async fn propose(
        &self,
        ctx: &WorkflowContext,
        intent: &Intent,
        _user_id: &str,
    ) -> Result<Proposal> {
        let item = intent.filters.item.clone();

        let Some(amount) = intent.stated_amount() else {
            let item_text = item
                .as_deref()
                .map(|it| format!(" {it}"))
                .unwrap_or_default();
            return Ok(Proposal::needs_amount(
                WORKFLOW,
                format!(
                    "I found orphanages that need{item_text} supplies! How much \
                     would you like to contribute? We'll buy and deliver the \
                     supplies on your behalf."
                ),
            ));
        };

        let orphanages = ctx
            .reader
            .search_orphanages(
                item.as_deref(),
                intent.filters.urgent,
                ctx.tuning.supply_max_orphanages,
            )
            .await?;
        if orphanages.is_empty() {
            return Ok(Proposal::empty(
                WORKFLOW,
                amount,
                "I couldn't find any orphanages needing supplies right now. \
                 Please try again later.",
            ));
        }

        let ranked = rank_by_urgency(orphanages);
        info!(count = ranked.len(), "orphanage candidates selected");
        let top = &ranked[0];

        let supply_items = matching_supplies(top, item.as_deref());
        let summary = build_proposal_summary(amount, &ranked, &supply_items, item.as_deref());

        let mut proposal = Proposal::empty(WORKFLOW, amount, summary);
        proposal.allocations = vec![AllocationLine {
            beneficiary_id: top.id.clone(),
            beneficiary_name: top.name.clone(),
            allocated_amount: amount,
            funding_needed: supply_items.iter().map(|need| need.estimated_cost).sum(),
            funding_received: 0.0,
            percentage: 100.0,
            story: String::new(),
            location: top.location.clone(),
            items_needed: supply_items.iter().map(|need| need.item.clone()).collect(),
        }];
        proposal.has_write_action = true;
        proposal.orphanage_id = Some(top.id.clone());
        proposal.orphanage_name = Some(top.name.clone());
        proposal.supply_items = Some(supply_items);
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

        let (Some(orphanage_id), Some(orphanage_name)) = (
            proposal.orphanage_id.as_deref(),
            proposal.orphanage_name.as_deref(),
        ) else {
            return ExecutionResult::failure(
                WORKFLOW,
                total_amount,
                "Could not find the selected orphanage. Please try again.",
                None,
            );
        };

        let items = proposal.supply_items.clone().unwrap_or_default();

        let receipt = match ctx.gate.execute(proposal, user_id, true).await {
            Ok(receipt) => receipt,
            Err(e) => return fail_execution(ctx, WORKFLOW, user_id, total_amount, e.into()).await,
        };

        // The donation is recorded; raising the fulfilment request is
        // best-effort from here.
        let supply_request_id = match ctx
            .ledger
            .create_supply_request(&SupplyRequest {
                orphanage_id: orphanage_id.to_string(),
                user_id: user_id.to_string(),
                items: items.clone(),
                total_amount,
                transaction_id: receipt.transaction_id.clone(),
            })
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(orphanage = %orphanage_id, error = %e,
                    "supply request failed; donation already recorded");
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
                    "orphanage_id": orphanage_id,
                    "items": items.len(),
                }),
            ))
            .await;

        let items_text = if items.is_empty() {
            "essential supplies".to_string()
        } else {
            items
                .iter()
                .map(|need| need.item.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let impact_summary = format!(
            "Your contribution of {} will provide {} to {}. The supplies will \
             be purchased and delivered within 5-7 days. You'll receive photos \
             once delivered! Transaction ID: {}",
            format_inr(total_amount),
            items_text,
            orphanage_name,
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
            sponsorship_id: None,
            supply_request_id,
            error: None,
        }
    }
}

/// The orphanage's needs, narrowed to the requested item when one was named.
fn matching_supplies(orphanage: &Orphanage, item: Option<&str>) -> Vec<SupplyNeed> {
    let Some(item) = item else {
        return orphanage.supplies_needed.clone();
    };
    let wanted = item.to_lowercase();
    let matched: Vec<SupplyNeed> = orphanage
        .supplies_needed
        .iter()
        .filter(|need| {
            let have = need.item.to_lowercase();
            have.contains(&wanted) || wanted.contains(&have)
        })
        .cloned()
        .collect();
    if matched.is_empty() {
        orphanage.supplies_needed.clone()
    } else {
        matched
    }
}

fn build_proposal_summary(
    amount: f64,
    orphanages: &[Orphanage],
    supply_items: &[SupplyNeed],
    item: Option<&str>,
) -> String {
    let item_text = item.map(|it| format!(" {it}")).unwrap_or_default();
    let mut lines = vec![
        format!(
            "Here's my plan for your {} supply contribution{}:",
            format_inr(amount),
            item_text
        ),
        String::new(),
    ];

    for (index, orphanage) in orphanages.iter().enumerate() {
        let marker = if index == 0 { " (recommended)" } else { "" };
        lines.push(format!(
            "{}. {} ({}) - {} children{}",
            index + 1,
            orphanage.name,
            orphanage.location,
            orphanage.children_count,
            marker,
        ));
    }

    let top = &orphanages[0];
    lines.push(String::new());
    lines.push(format!("{} currently needs:", top.name));
    for need in supply_items {
        lines.push(format!(
            "  - {} x{} (approx {})",
            need.item,
            need.quantity,
            format_inr(need.estimated_cost)
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Your {} will go to {}. We'll purchase and deliver the supplies. \
         Would you like to confirm?",
        format_inr(amount),
        top.name
    ));
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

    fn intent(amount: Option<f64>, item: Option<&str>) -> Intent {
        Intent {
            workflow: WORKFLOW,
            amount,
            filters: IntentFilters {
                category: Some("supplies".into()),
                urgent: false,
                item: item.map(str::to_string),
            },
            confidence: 0.85,
            needs_clarification: false,
            clarification_question: None,
            raw_message: "send supplies to an orphanage".into(),
        }
    }

    #[tokio::test]
    async fn test_propose_targets_most_urgent_orphanage() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = OrphanageSupply
            .propose(&ctx, &intent(Some(3000.0), None), "u1")
            .await
            .unwrap();

        // Sunshine Children's Home has the highest urgency score.
        assert_eq!(proposal.orphanage_id.as_deref(), Some("orphanage_001"));
        assert_eq!(proposal.allocations.len(), 1);
        assert_eq!(proposal.allocations[0].percentage, 100.0);
        assert!(proposal.has_write_action);
        let items = proposal.supply_items.as_deref().expect("supply items");
        assert!(!items.is_empty());
        assert!(fixture.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_propose_narrows_to_requested_item() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture);
        let proposal = OrphanageSupply
            .propose(&ctx, &intent(Some(3000.0), Some("blankets")), "u1")
            .await
            .unwrap();

        let items = proposal.supply_items.as_deref().expect("supply items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item, "blankets");
    }

    #[tokio::test]
    async fn test_propose_without_amount_asks_for_one() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture);
        let proposal = OrphanageSupply
            .propose(&ctx, &intent(None, Some("blankets")), "u1")
            .await
            .unwrap();
        assert!(proposal.needs_amount);
        assert!(!proposal.has_write_action);
    }

    #[tokio::test]
    async fn test_execute_records_supply_request() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = OrphanageSupply
            .propose(&ctx, &intent(Some(3000.0), None), "u1")
            .await
            .unwrap();

        let result = OrphanageSupply
            .execute(&ctx, &intent(Some(3000.0), None), "u1", &proposal)
            .await;

        assert!(result.success);
        assert!(result.supply_request_id.is_some());
        let requests = fixture.supply_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].orphanage_id, "orphanage_001");
        assert_eq!(fixture.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_without_orphanage_fails_before_the_gate() {
        let fixture = Arc::new(FixtureBackend::new());
        let ctx = context(fixture.clone());
        let proposal = Proposal::empty(WORKFLOW, 3000.0, "stale");

        let result = OrphanageSupply
            .execute(&ctx, &intent(Some(3000.0), None), "u1", &proposal)
            .await;
        assert!(!result.success);
        assert!(fixture.submitted().is_empty());
    }
}
