//! SMS and voice call tool.

use async_trait::async_trait;
use serde_json::Value;

use pilot_core::types::{CallKind, ToolKind};
use pilot_storage::{NewTelephonyLog, Store};
use pilot_telephony::{describe, reached_provider, Provider, TelephonyFacade};

use super::{required_str, AgentTool};
use crate::error::ToolError;

pub struct TelephonyTool {
    telephony: TelephonyFacade,
    store: Store,
}

impl TelephonyTool {
    pub fn new(telephony: TelephonyFacade, store: Store) -> Self {
        Self { telephony, store }
    }
}

#[async_trait]
impl AgentTool for TelephonyTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Telephony
    }

    fn description(&self) -> &'static str {
        "Send an SMS or place a voice call that speaks the content aloud. \
         Args: to_number (E.164), content, action ('sms' or 'call')."
    }

    async fn invoke(&self, args: &Value) -> Result<String, ToolError> {
        let to = required_str(args, "to_number")?;
        let content = required_str(args, "content")?;
        let action = required_str(args, "action")?;

        let kind: CallKind = match action.parse() {
            Ok(kind) => kind,
            Err(_) => {
                return Ok(format!(
                    "Error: Invalid action '{}'. Use 'sms' or 'call'.",
                    action
                ))
            }
        };

        let delivery = match kind {
            CallKind::Sms => self.telephony.send_text(to, content).await,
            CallKind::Call => self.telephony.place_voice_call(to, content).await,
        };
        let result = describe(kind, &delivery);

        if reached_provider(&delivery) {
            self.store.log_telephony(&NewTelephonyLog {
                lead_id: None,
                provider: Provider::Twilio.as_str(),
                sid: delivery.as_ref().ok().map(|r| r.sid.as_str()),
                kind,
                result: &result,
            })?;
        }
        Ok(result)
    }
}
