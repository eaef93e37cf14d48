//! Emergency medical: the full amount goes to one child.
//!
//! Propose shows the donor the top emergency cases with stories and funding
//! progress; the most critical case is the default recipient, and the caller
//! may override it with `selected_beneficiary_id` before confirming.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use hopelink_protocol::{
    AllocationLine, Beneficiary, DonationWorkflow, ExecutionResult, Intent, MedicalCase, Proposal,
};

use super::{fail_execution, format_inr, WorkflowContext, WorkflowHandler};
use crate::allocation::{filter_emergency_cases, rank_by_urgency};
use crate::backend::{AuditEntry, AuditStatus};

pub struct EmergencyMedical;

const WORKFLOW: DonationWorkflow = DonationWorkflow::EmergencyMedical;

/// How many children to fetch before the emergency filter runs.
const SEARCH_POOL_SIZE: usize = 10;

/// How many cases to show the donor.
const MAX_CASES: usize = 3;

#[async_trait]
impl WorkflowHandler for EmergencyMedical {
    async fn propose(
        &self,
        ctx: &WorkflowContext,
        intent: &Intent,
        _user_id: &str,
    ) -> Result<Proposal> {
        let Some(amount) = intent.stated_amount() else {
            return Ok(Proposal::needs_amount(
                WORKFLOW,
                "I found children who urgently need medical help. How much would \
                 you like to donate? Even ₹1000 can cover medication for a week.",
            ));
        };

        // Fetch broadly; the urgency filter below is stricter than the
        // backend's urgent flag.
        let children = ctx
            .reader
            .search_children(Some("medical"), SEARCH_POOL_SIZE, false)
            .await?;
        if children.is_empty() {
            return Ok(Proposal::empty(
                WORKFLOW,
                amount,
                "I couldn't find any children needing emergency medical support \
                 right now. Please try again later.",
            ));
        }

        let mut emergencies =
            filter_emergency_cases(&children, ctx.tuning.emergency_urgency_threshold);
        if emergencies.is_empty() {
            // No case clears the bar; show the full medical pool instead of
            // nothing.
            info!("no cases above the emergency threshold; using the full pool");
            emergencies = children;
        }

        let mut ranked = rank_by_urgency(emergencies);
        ranked.truncate(MAX_CASES);

        let cases: Vec<MedicalCase> = ranked
            .iter()
            .map(|child| build_case(child, amount))
            .collect();
        let summary = build_proposal_summary(amount, &ranked);
        let top = &ranked[0];

        let mut proposal = Proposal::empty(WORKFLOW, amount, summary);
        // The plan carries a single 100% line for the recommended case; the
        // override is applied at execute time.
        proposal.allocations = vec![full_amount_line(top, amount)];
        proposal.has_write_action = true;
        proposal.recommended_beneficiary_id = Some(top.id.clone());
        proposal.cases = Some(cases);
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

        let Some(case) = select_case(proposal) else {
            return ExecutionResult::failure(
                WORKFLOW,
                total_amount,
                "Could not find the selected child. Please try again.",
                None,
            );
        };

        let plan = {
            let mut plan = Proposal::empty(WORKFLOW, total_amount, "");
            plan.allocations = vec![AllocationLine {
                beneficiary_id: case.beneficiary_id.clone(),
                beneficiary_name: case.name.clone(),
                allocated_amount: total_amount,
                funding_needed: case.still_needed,
                funding_received: case.funding_received,
                percentage: 100.0,
                story: String::new(),
                location: case.location.clone(),
                items_needed: Vec::new(),
            }];
            plan
        };

        let receipt = match ctx.gate.execute(&plan, user_id, true).await {
            Ok(receipt) => receipt,
            Err(e) => return fail_execution(ctx, WORKFLOW, user_id, total_amount, e.into()).await,
        };

        if let Err(e) = ctx
            .ledger
            .update_funding_status(&case.beneficiary_id, total_amount, &receipt.transaction_id)
            .await
        {
            warn!(beneficiary = %case.beneficiary_id, error = %e,
                "funding update failed; donation already recorded");
        }

        let new_total_received = case.funding_received + total_amount;
        let fully_funded = new_total_received >= case.funding_needed;
        let remaining_needed = (case.funding_needed - new_total_received).max(0.0);

        ctx.ledger
            .log_donation(&AuditEntry::new(
                user_id,
                WORKFLOW,
                total_amount,
                AuditStatus::Success,
                &receipt.transaction_id,
                serde_json::json!({
                    "beneficiary_id": case.beneficiary_id,
                    "condition": case.condition,
                    "fully_funded": fully_funded,
                }),
            ))
            .await;

        let impact_summary = build_impact_summary(
            total_amount,
            &case.name,
            &case.condition,
            &receipt.transaction_id,
            fully_funded,
            remaining_needed,
        );

        ExecutionResult {
            success: true,
            workflow: WORKFLOW,
            transaction_id: Some(receipt.transaction_id),
            total_amount,
            allocations: plan.allocations,
            beneficiaries_helped: 1,
            impact_summary,
            fully_funded: Some(fully_funded),
            remaining_needed: Some(remaining_needed),
            sponsorship_id: None,
            supply_request_id: None,
            error: None,
        }
    }
}

/// Resolve which case the donation goes to: the donor's override if it names
/// a known case, otherwise the recommended one, otherwise the first.
fn select_case(proposal: &Proposal) -> Option<MedicalCase> {
    let cases = proposal.cases.as_deref()?;
    let wanted = proposal
        .selected_beneficiary_id
        .as_deref()
        .or(proposal.recommended_beneficiary_id.as_deref());
    wanted
        .and_then(|id| cases.iter().find(|case| case.beneficiary_id == id))
        .or_else(|| cases.first())
        .cloned()
}

fn full_amount_line(child: &Beneficiary, amount: f64) -> AllocationLine {
    AllocationLine {
        beneficiary_id: child.id.clone(),
        beneficiary_name: child.name.clone(),
        allocated_amount: amount,
        funding_needed: child.outstanding_need(),
        funding_received: child.funding_received,
        percentage: 100.0,
        story: child.story.clone(),
        location: child.location.clone(),
        items_needed: child.items_needed.clone(),
    }
}

fn build_case(child: &Beneficiary, amount: f64) -> MedicalCase {
    let still_needed = child.outstanding_need();
    let progress_pct = if child.funding_needed > 0.0 {
        round1(child.funding_received / child.funding_needed * 100.0)
    } else {
        0.0
    };
    let donation_covers_pct = if still_needed > 0.0 {
        round1((amount / still_needed * 100.0).min(100.0))
    } else {
        100.0
    };
    MedicalCase {
        beneficiary_id: child.id.clone(),
        name: child.name.clone(),
        age: child.age,
        condition: extract_condition(child),
        location: child.location.clone(),
        urgency_score: child.urgency_score,
        story: child.story.clone(),
        funding_needed: child.funding_needed,
        funding_received: child.funding_received,
        still_needed,
        progress_pct,
        donation_covers_pct,
    }
}

/// Best-effort condition label from the child's needed items, then story.
fn extract_condition(child: &Beneficiary) -> String {
    const ITEM_MARKERS: &[&str] = &["surgery", "treatment", "medication", "operation", "fund"];
    for item in &child.items_needed {
        let lowered = item.to_lowercase();
        if ITEM_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return item.clone();
        }
    }

    const STORY_CONDITIONS: &[&str] = &[
        "heart condition",
        "surgery",
        "cancer",
        "kidney",
        "liver",
        "brain",
        "bone",
        "eye",
        "ear",
        "lung",
    ];
    let story = child.story.to_lowercase();
    for condition in STORY_CONDITIONS {
        if story.contains(condition) {
            return condition.to_string();
        }
    }

    "medical treatment".to_string()
}

fn build_proposal_summary(amount: f64, cases: &[Beneficiary]) -> String {
    let mut lines = vec![
        format!(
            "I found {} children who urgently need medical help.",
            cases.len()
        ),
        format!("Your {} will go entirely to one child.", format_inr(amount)),
        String::new(),
    ];

    for (index, child) in cases.iter().enumerate() {
        let age = child
            .age
            .map(|age| format!("Age {age}"))
            .unwrap_or_else(|| "age unknown".to_string());
        lines.push(format!(
            "{}. {} ({}) - {} - Still needs {}",
            index + 1,
            child.name,
            age,
            extract_condition(child),
            format_inr(child.outstanding_need()),
        ));
        if !child.story.is_empty() {
            let excerpt: String = child.story.chars().take(80).collect();
            lines.push(format!("   \"{excerpt}...\""));
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "We recommend donating to {} (most critical). Your full {} will go to them.",
        cases[0].name,
        format_inr(amount)
    ));
    lines.push("Would you like to confirm?".to_string());
    lines.join("\n")
}

fn build_impact_summary(
    amount: f64,
    name: &str,
    condition: &str,
    transaction_id: &str,
    fully_funded: bool,
    remaining_needed: f64,
) -> String {
    let mut lines = vec![
        format!(
            "Your donation of {} has been directed to {}'s {} fund.",
            format_inr(amount),
            name,
            condition
        ),
        format!("Transaction ID: {transaction_id}"),
        String::new(),
    ];

    if fully_funded {
        lines.push(format!(
            "Great news: {name} is now fully funded! Your donation helped reach \
             the goal. The medical team will be notified immediately."
        ));
    } else {
        lines.push(format!(
            "{} still needs {} more to reach their goal. Consider sharing their \
             story to help them get fully funded.",
            name,
            format_inr(remaining_needed)
        ));
    }

    lines.push(String::new());
    lines.push(
        "Thank you for making a difference. You may receive an update on their recovery."
            .to_string(),
    );
    lines.join("\n")
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
