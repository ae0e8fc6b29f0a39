//! Agent tools and their dispatch.
//!
//! Each `ToolKind` maps to one `AgentTool` implementation. A `ToolBox` holds
//! the tools enabled for a custom agent and renders every result, including
//! failures, as text the agent can read.

pub mod email;
pub mod memory;
pub mod social;
pub mod telephony;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use pilot_core::types::ToolKind;
use pilot_storage::{CustomAgent, Store};
use pilot_telephony::{MailSender, TelephonyFacade};

use crate::error::ToolError;
use crate::gate::ActionGate;

pub use email::EmailTool;
pub use memory::{MemoryRecallTool, MemoryStoreTool};
pub use social::SocialPostTool;
pub use telephony::TelephonyTool;

/// A capability an agent can invoke with JSON arguments.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// One-line description shown to the agent.
    fn description(&self) -> &'static str;

    async fn invoke(&self, args: &Value) -> Result<String, ToolError>;
}

/// Collaborators shared by every tool.
#[derive(Clone)]
pub struct ToolContext {
    pub store: Store,
    pub gate: Arc<ActionGate>,
    pub telephony: TelephonyFacade,
    /// `None` when SMTP credentials are not configured.
    pub mailer: Option<Arc<dyn MailSender>>,
}

/// Build the implementation for a tool kind.
pub fn build_tool(kind: ToolKind, ctx: &ToolContext) -> Box<dyn AgentTool> {
    match kind {
        ToolKind::Telephony => Box::new(TelephonyTool::new(ctx.telephony.clone(), ctx.store.clone())),
        ToolKind::SocialPost => Box::new(SocialPostTool::new(Arc::clone(&ctx.gate))),
        ToolKind::MemoryStore => Box::new(MemoryStoreTool::new(ctx.store.clone())),
        ToolKind::MemoryRecall => Box::new(MemoryRecallTool::new(ctx.store.clone())),
        ToolKind::Email => Box::new(EmailTool::new(Arc::clone(&ctx.gate), ctx.mailer.clone())),
    }
}

/// The tools enabled for one agent.
pub struct ToolBox {
    tools: Vec<Box<dyn AgentTool>>,
}

impl ToolBox {
    pub fn new(kinds: &[ToolKind], ctx: &ToolContext) -> Self {
        let mut tools: Vec<Box<dyn AgentTool>> = Vec::new();
        for &kind in kinds {
            if tools.iter().any(|t| t.kind() == kind) {
                continue;
            }
            tools.push(build_tool(kind, ctx));
        }
        Self { tools }
    }

    pub fn for_agent(agent: &CustomAgent, ctx: &ToolContext) -> Self {
        debug!(agent = %agent.name, tools = agent.tools.len(), "Building toolbox");
        Self::new(&agent.tools, ctx)
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools.iter().map(|t| t.kind()).collect()
    }

    /// Invoke a tool by kind. Errors come back as text.
    pub async fn invoke(&self, kind: ToolKind, args: &Value) -> String {
        let result = match self.tools.iter().find(|t| t.kind() == kind) {
            Some(tool) => tool.invoke(args).await,
            None => Err(ToolError::NotEnabled(kind)),
        };
        render(kind.tag(), result)
    }

    /// Invoke a tool by its tag, as named by an agent.
    pub async fn invoke_tag(&self, tag: &str, args: &Value) -> String {
        match tag.parse::<ToolKind>() {
            Ok(kind) => self.invoke(kind, args).await,
            Err(_) => render(tag, Err(ToolError::Unknown(tag.to_string()))),
        }
    }
}

fn render(tag: &str, result: Result<String, ToolError>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            warn!(tool = tag, error = %e, "Tool invocation failed");
            format!("Error: {}", e)
        }
    }
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArgs(format!("missing '{}'", field)))
}
