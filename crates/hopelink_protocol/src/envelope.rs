//! Request/response envelope between the outer transport and the operator.
//!
//! Every request produces an `AgentResponse`, regardless of outcome, so the
//! caller always knows what shape to expect. Exactly one of
//! `proposal`/`result` is populated depending on phase; both are absent for
//! error and clarification statuses.

use serde::{Deserialize, Serialize};

use crate::types::{DonationWorkflow, ExecutionResult, Proposal, SessionId};

/// One incoming user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
    pub session_id: SessionId,
    pub message: String,
    /// False on a fresh message; true when the user confirms a pending
    /// proposal.
    #[serde(default)]
    pub confirmation: bool,
}

/// Outcome classes of a single operator pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// A plan awaiting user confirmation
    Proposal,
    /// A confirmed plan was executed
    Executed,
    /// Something went wrong; no state was changed beyond what `message` says
    Error,
    /// The message was too ambiguous to route
    Clarification,
}

/// Uniform response envelope returned to the caller for every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub status: ResponseStatus,
    /// Human-readable text to show the user.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<DonationWorkflow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<Proposal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    /// True when the caller should present a Confirm step.
    pub requires_confirmation: bool,
}

impl AgentResponse {
    pub fn proposal(
        workflow: DonationWorkflow,
        proposal: Proposal,
        requires_confirmation: bool,
    ) -> Self {
        Self {
            status: ResponseStatus::Proposal,
            message: proposal.summary.clone(),
            workflow: Some(workflow),
            proposal: Some(proposal),
            result: None,
            requires_confirmation,
        }
    }

    pub fn executed(workflow: DonationWorkflow, result: ExecutionResult) -> Self {
        Self {
            status: ResponseStatus::Executed,
            message: result.impact_summary.clone(),
            workflow: Some(workflow),
            proposal: None,
            result: Some(result),
            requires_confirmation: false,
        }
    }

    pub fn clarification(question: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Clarification,
            message: question.into(),
            workflow: None,
            proposal: None,
            result: None,
            requires_confirmation: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            workflow: None,
            proposal: None,
            result: None,
            requires_confirmation: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_has_no_payloads() {
        let response = AgentResponse::error("limit exceeded");
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.proposal.is_none());
        assert!(response.result.is_none());
        assert!(!response.requires_confirmation);
    }

    #[test]
    fn test_clarification_carries_question_as_message() {
        let response = AgentResponse::clarification("What would you like to do?");
        assert_eq!(response.status, ResponseStatus::Clarification);
        assert_eq!(response.message, "What would you like to do?");
        assert!(response.workflow.is_none());
    }

    #[test]
    fn test_request_confirmation_defaults_false() {
        let request: UserRequest = serde_json::from_str(
            r#"{"user_id":"u1","session_id":"s1","message":"help"}"#,
        )
        .unwrap();
        assert!(!request.confirmation);
        assert_eq!(request.session_id.as_str(), "s1");
    }
}
