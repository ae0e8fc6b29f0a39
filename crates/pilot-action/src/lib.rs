//! Pilot Action crate - approval gate, agent tools, and the auto-pilot worker.
//!
//! Anything with an outward side effect passes through the [`ActionGate`]
//! first. The [`AutoPilot`] drives pending leads through research and
//! outreach in the background.

pub mod autopilot;
pub mod error;
pub mod gate;
pub mod tools;

pub use autopilot::{AutoPilot, LeadResearcher, ResearchReport, StartOutcome, TemplateResearcher};
pub use error::{AutoPilotError, GateError, ToolError};
pub use gate::{ActionGate, GateOutcome};
pub use tools::{build_tool, AgentTool, ToolBox, ToolContext};
