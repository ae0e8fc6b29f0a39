//! Error types for the action layer.

use pilot_core::error::PilotError;
use pilot_core::types::ToolKind;

/// Errors from the approval gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Actions can only be resolved to Approved or Rejected")]
    InvalidDecision,
    #[error("Storage error: {0}")]
    Storage(#[from] PilotError),
}

/// Errors from processing a single lead.
#[derive(Debug, thiserror::Error)]
pub enum AutoPilotError {
    #[error("Research failed: {0}")]
    Research(String),
    #[error("Storage error: {0}")]
    Storage(#[from] PilotError),
}

/// Errors from agent tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("Tool '{0}' is not enabled for this agent")]
    NotEnabled(ToolKind),
    #[error("Unknown tool: {0}")]
    Unknown(String),
    #[error("Approval gate error: {0}")]
    Gate(#[from] GateError),
    #[error("Storage error: {0}")]
    Storage(#[from] PilotError),
}
