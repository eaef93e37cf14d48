//! Canonical types for the HopeLink donation engine.
//!
//! Shared by the operator, the workflow handlers, and the backend
//! boundaries. The wire shapes here are the contract with the platform
//! backend: every field serializes in snake_case and optional fields are
//! omitted rather than null.

pub mod defaults;
pub mod envelope;
pub mod types;

pub use envelope::{AgentResponse, ResponseStatus, UserRequest};
pub use types::{
    AllocationLine, Beneficiary, DonationWorkflow, ExecutionResult, Intent, IntentFilters,
    MedicalCase, Orphanage, Proposal, SessionId, SupplyNeed, WorkflowParseError,
};
