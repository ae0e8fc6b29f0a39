//! Email dispatch, gated on human approval.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use pilot_core::types::ToolKind;
use pilot_telephony::{MailSender, OutboundEmail};

use super::{required_str, AgentTool};
use crate::error::ToolError;
use crate::gate::{ActionGate, GateOutcome};

pub const EMAIL_ACTION: &str = "Email Dispatch";

pub struct EmailTool {
    gate: Arc<ActionGate>,
    mailer: Option<Arc<dyn MailSender>>,
}

impl EmailTool {
    pub fn new(gate: Arc<ActionGate>, mailer: Option<Arc<dyn MailSender>>) -> Self {
        Self { gate, mailer }
    }
}

#[async_trait]
impl AgentTool for EmailTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Email
    }

    fn description(&self) -> &'static str {
        "Send an email once a human approves it. Blocks until the email is \
         approved or rejected. Args: recipient_email, subject, body."
    }

    async fn invoke(&self, args: &Value) -> Result<String, ToolError> {
        let recipient = required_str(args, "recipient_email")?;
        let subject = required_str(args, "subject")?;
        let body = required_str(args, "body")?;

        // Nothing is queued for review when the message could never be sent.
        let Some(mailer) = &self.mailer else {
            return Ok(
                "Error: Email not configured. Set SMTP_USERNAME and SMTP_PASSWORD.".to_string(),
            );
        };

        let details = format!("To: {}\nSubject: {}\n\n{}", recipient, subject, body);
        let outcome = self.gate.gated(EMAIL_ACTION, &details).await?;

        match outcome {
            GateOutcome::Approved => {
                let email = OutboundEmail {
                    to: recipient.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                };
                match mailer.send(&email).await {
                    Ok(()) => {
                        info!(to = recipient, "Approved email sent");
                        Ok(format!("Success: Email sent to {}.", recipient))
                    }
                    Err(e) => {
                        warn!(to = recipient, error = %e, "Approved email failed to send");
                        Ok(format!("Error sending email: {}", e))
                    }
                }
            }
            GateOutcome::Rejected(_) => Ok(format!(
                "{}. You MUST revise your approach based on this feedback.",
                outcome
            )),
            GateOutcome::TimedOut => Ok(format!(
                "{}. The human took too long to respond; do not send this email.",
                outcome
            )),
        }
    }
}
