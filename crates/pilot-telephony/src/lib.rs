//! Pilot Telephony crate - outbound SMS, voice, and AI-assistant calls.
//!
//! One facade over two interchangeable backends: a Twilio-style REST API for
//! SMS and scripted voice calls, and a Vapi-style API for assistant-driven
//! calls and transcripts. A backend without credentials reports itself as not
//! configured and never touches the network. Email goes out over SMTP.

pub mod error;
pub mod facade;
pub mod mail;
pub mod number;
pub mod twilio;
pub mod vapi;

use std::fmt;

use serde::{Deserialize, Serialize};

use pilot_core::types::CallKind;

pub use error::TelephonyError;
pub use facade::{describe_transcript, TelephonyFacade};
pub use mail::{MailSender, OutboundEmail, SmtpMailer};
pub use number::normalize_number;

/// Which provider handled an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Twilio,
    Vapi,
}

impl Provider {
    /// Identifier stored in the telephony log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Twilio => "twilio",
            Provider::Vapi => "vapi",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Twilio => f.write_str("Twilio"),
            Provider::Vapi => f.write_str("Vapi"),
        }
    }
}

/// Proof that a provider accepted a message or call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReceipt {
    pub provider: Provider,
    pub kind: CallKind,
    /// Provider-assigned id of the message or call.
    pub sid: String,
}

impl fmt::Display for ProviderReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.provider, self.kind) {
            (Provider::Vapi, _) => write!(f, "Vapi Call Started. ID: {}", self.sid),
            (_, CallKind::Sms) => write!(f, "SMS Sent. SID: {}", self.sid),
            (_, CallKind::Call) => write!(f, "Call Initiated. SID: {}", self.sid),
        }
    }
}

pub type Delivery = Result<ProviderReceipt, TelephonyError>;

/// Whether an attempt belongs in the telephony log.
pub fn reached_provider(delivery: &Delivery) -> bool {
    delivery.as_ref().err().map_or(true, TelephonyError::reached_provider)
}

/// Render an attempt as the narrative line shown to operators and agents.
pub fn describe(kind: CallKind, delivery: &Delivery) -> String {
    match delivery {
        Ok(receipt) => receipt.to_string(),
        Err(TelephonyError::NotConfigured(Provider::Twilio)) => {
            "Error: Twilio not configured.".to_string()
        }
        Err(TelephonyError::NotConfigured(Provider::Vapi)) => {
            "Error: Vapi API Key not configured.".to_string()
        }
        Err(e) => match kind {
            CallKind::Sms => format!("SMS Failed: {}", e),
            CallKind::Call => format!("Voice Call Failed: {}", e),
        },
    }
}
