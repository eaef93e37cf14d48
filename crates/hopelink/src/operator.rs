//! The single entry point for a user turn.
//!
//! One `handle` call runs exactly one phase of the protocol. A fresh message
//! is classified, routed, and answered with a read-only proposal that is
//! parked in the session store. A confirmation consumes the parked proposal
//! and executes it. `handle` never returns an error; every failure becomes
//! an error envelope and the detail stays in the logs.

use std::sync::Arc;

use tracing::{error, info};

use hopelink_protocol::{AgentResponse, Intent, Proposal, UserRequest};

use crate::backend::{BeneficiaryReader, DonationLedger};
use crate::classifier::Classifier;
use crate::config::EngineConfig;
use crate::gate::DonationGate;
use crate::session::{PendingDonation, SessionStore};
use crate::workflows::{format_inr, handler_for, WorkflowContext};

const GENERIC_ERROR_MESSAGE: &str =
    "Sorry, I couldn't process that request. Please try again.";

const STALE_SESSION_MESSAGE: &str =
    "I couldn't find your previous request. Your session may have expired. \
     Please describe what you'd like to do again.";

pub struct Operator {
    classifier: Arc<dyn Classifier>,
    sessions: SessionStore,
    ctx: WorkflowContext,
    config: EngineConfig,
}

impl Operator {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        reader: Arc<dyn BeneficiaryReader>,
        ledger: Arc<dyn DonationLedger>,
        config: EngineConfig,
    ) -> Self {
        let gate = DonationGate::new(ledger.clone(), config.safety.clone());
        Self {
            classifier,
            sessions: SessionStore::new(config.session_ttl),
            ctx: WorkflowContext {
                reader,
                ledger,
                gate,
                tuning: config.workflows.clone(),
            },
            config,
        }
    }

    /// Run one protocol phase for one request.
    pub async fn handle(&self, request: &UserRequest) -> AgentResponse {
        if request.confirmation {
            self.confirm(request).await
        } else {
            self.propose(request).await
        }
    }

    async fn propose(&self, request: &UserRequest) -> AgentResponse {
        let intent = match self.classifier.classify(&request.message).await {
            Ok(intent) => intent,
            Err(e) => {
                error!(user = %request.user_id, error = %e, "classification failed");
                return AgentResponse::error(GENERIC_ERROR_MESSAGE);
            }
        };
        info!(
            user = %request.user_id,
            workflow = %intent.workflow,
            confidence = intent.confidence,
            "intent classified"
        );

        if intent.needs_clarification {
            let question = intent
                .clarification_question
                .clone()
                .unwrap_or_else(|| "Could you tell me more about what you'd like to do?".into());
            return AgentResponse::clarification(question);
        }

        // The ceiling is checked before any backend traffic.
        if let Some(amount) = intent.stated_amount() {
            if amount > self.config.safety.max_donation_amount {
                return AgentResponse::error(format!(
                    "That amount ({}) exceeds our single-transaction limit of {}. \
                     Please choose a smaller amount, or contact us about a \
                     major gift.",
                    format_inr(amount),
                    format_inr(self.config.safety.max_donation_amount),
                ));
            }
        }

        let handler = handler_for(intent.workflow);
        let proposal = match handler.propose(&self.ctx, &intent, &request.user_id).await {
            Ok(proposal) => proposal,
            Err(e) => {
                error!(user = %request.user_id, workflow = %intent.workflow,
                    error = %e, "proposal failed");
                return AgentResponse::error(GENERIC_ERROR_MESSAGE);
            }
        };

        let requires_confirmation = self.requires_confirmation(&intent, &proposal);
        if proposal.has_write_action {
            self.sessions.upsert(
                &request.session_id,
                PendingDonation {
                    user_id: request.user_id.clone(),
                    proposal: proposal.clone(),
                    intent,
                },
            );
        }
        AgentResponse::proposal(proposal.workflow, proposal, requires_confirmation)
    }

    async fn confirm(&self, request: &UserRequest) -> AgentResponse {
        // take_pending is atomic, so a double confirm has exactly one winner.
        let Some(pending) = self.sessions.take_pending(&request.session_id) else {
            return AgentResponse::error(STALE_SESSION_MESSAGE);
        };
        info!(
            user = %request.user_id,
            workflow = %pending.proposal.workflow,
            amount = pending.proposal.total_amount,
            "executing confirmed proposal"
        );

        let handler = handler_for(pending.proposal.workflow);
        let result = handler
            .execute(&self.ctx, &pending.intent, &request.user_id, &pending.proposal)
            .await;
        AgentResponse::executed(result.workflow, result)
    }

    fn requires_confirmation(&self, intent: &Intent, proposal: &Proposal) -> bool {
        // Only write-action proposals are parked in the session store, so
        // only they can be confirmed.
        if !proposal.has_write_action {
            return false;
        }
        let above_threshold = intent
            .stated_amount()
            .map(|amount| amount >= self.config.safety.always_confirm_above)
            .unwrap_or(false);
        above_threshold || proposal.has_write_action
    }
}
