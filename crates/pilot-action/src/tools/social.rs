//! Social post drafting, gated on human approval.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use pilot_core::types::ToolKind;

use super::{required_str, AgentTool};
use crate::error::ToolError;
use crate::gate::{ActionGate, GateOutcome};

pub const SOCIAL_POST_ACTION: &str = "Social Media Post";

pub struct SocialPostTool {
    gate: Arc<ActionGate>,
}

impl SocialPostTool {
    pub fn new(gate: Arc<ActionGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl AgentTool for SocialPostTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SocialPost
    }

    fn description(&self) -> &'static str {
        "Submit a finished social media post for human review. Blocks until the \
         post is approved or rejected. Args: platform, topic, content."
    }

    async fn invoke(&self, args: &Value) -> Result<String, ToolError> {
        let platform = required_str(args, "platform")?;
        let topic = required_str(args, "topic")?;
        let content = required_str(args, "content")?;

        let details = format!("Platform: {}\nTopic: {}\n\nContent:\n{}", platform, topic, content);
        let outcome = self.gate.gated(SOCIAL_POST_ACTION, &details).await?;

        match outcome {
            GateOutcome::Approved => {
                let store = self.gate.store();
                if let Some(post_id) = store.save_social_post(platform, topic, content)? {
                    store.update_social_post(post_id, content, "Approved")?;
                    info!(post_id, platform, "Approved social post recorded");
                }
                Ok(format!(
                    "Action Successful: Post drafted for {} on topic '{}' was APPROVED by the human.",
                    platform, topic
                ))
            }
            GateOutcome::Rejected(_) => Ok(format!(
                "{}. You MUST revise your approach based on this feedback.",
                outcome
            )),
            GateOutcome::TimedOut => Ok(format!(
                "{}. The human took too long to respond; do not publish this post.",
                outcome
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_context;
    use pilot_core::types::ActionStatus;
    use serde_json::json;
    use std::time::Duration;

    fn post_args() -> Value {
        json!({ "platform": "LinkedIn", "topic": "Launch", "content": "We are live!" })
    }

    async fn resolve_first_pending(gate: Arc<ActionGate>, decision: ActionStatus, feedback: Option<&str>) {
        for _ in 0..100 {
            let pending = gate.store().pending_actions().unwrap();
            if let Some(action) = pending.first() {
                assert_eq!(action.tool_name, SOCIAL_POST_ACTION);
                assert!(action.action_details.contains("Content:\nWe are live!"));
                gate.resolve(action.id, decision, feedback).unwrap();
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no pending action appeared");
    }

    #[tokio::test]
    async fn test_approved_post_is_recorded() {
        let (_dir, ctx) = test_context();
        let tool = SocialPostTool::new(Arc::clone(&ctx.gate));

        let args = post_args();
        let (text, _) = tokio::join!(
            tool.invoke(&args),
            resolve_first_pending(Arc::clone(&ctx.gate), ActionStatus::Approved, None)
        );

        let text = text.unwrap();
        assert!(text.starts_with("Action Successful"));
        // Approved posts leave the review queue.
        assert!(ctx.store.pending_social_posts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_post_returns_feedback() {
        let (_dir, ctx) = test_context();
        let tool = SocialPostTool::new(Arc::clone(&ctx.gate));

        let args = post_args();
        let (text, _) = tokio::join!(
            tool.invoke(&args),
            resolve_first_pending(
                Arc::clone(&ctx.gate),
                ActionStatus::Rejected,
                Some("too many emojis")
            )
        );

        let text = text.unwrap();
        assert!(text.starts_with("Rejected: too many emojis."));
        assert!(ctx.store.pending_social_posts().unwrap().is_empty());
    }
}
