//! HopeLink donation engine.
//!
//! Turns a free-text donor message into a reviewable donation proposal and,
//! after an explicit confirmation, executes it against the platform ledger.
//! The flow is strictly two-phase: `propose` never writes, `execute` writes
//! exactly once through the donation gate.

pub mod allocation;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod gate;
pub mod operator;
pub mod session;
pub mod workflows;

pub use config::EngineConfig;
pub use operator::Operator;
