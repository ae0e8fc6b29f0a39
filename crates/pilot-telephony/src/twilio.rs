//! Twilio-style SMS and scripted voice backend.

use serde::Deserialize;
use tracing::{info, warn};

use pilot_core::config::TelephonyConfig;
use pilot_core::types::CallKind;

use crate::{Provider, ProviderReceipt, TelephonyError};

const API_VERSION: &str = "2010-04-01";
const VOICE: &str = "Polly.Joanna-Neural";

#[derive(Debug, Clone)]
pub struct TwilioBackend {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

impl TwilioBackend {
    /// Build the backend, or `None` if the account credentials are missing.
    pub fn from_config(config: &TelephonyConfig, client: reqwest::Client) -> Option<Self> {
        Some(Self {
            client,
            base_url: config.twilio_base_url.trim_end_matches('/').to_string(),
            account_sid: config.twilio_sid.clone()?,
            auth_token: config.twilio_auth_token.clone()?,
            from_number: config.twilio_from_number.clone(),
        })
    }

    pub async fn send_sms(&self, to: &str, body: &str) -> Result<ProviderReceipt, TelephonyError> {
        let from = self.sender()?;
        let sid = self
            .create("Messages.json", &[("To", to), ("From", from), ("Body", body)])
            .await?;
        info!(sid = %sid, "SMS accepted");
        Ok(ProviderReceipt {
            provider: Provider::Twilio,
            kind: CallKind::Sms,
            sid,
        })
    }

    /// Place a call that reads `spoken_text` aloud.
    pub async fn place_call(
        &self,
        to: &str,
        spoken_text: &str,
    ) -> Result<ProviderReceipt, TelephonyError> {
        let from = self.sender()?;
        let twiml = say_twiml(spoken_text);
        let sid = self
            .create("Calls.json", &[("To", to), ("From", from), ("Twiml", twiml.as_str())])
            .await?;
        info!(sid = %sid, "Voice call accepted");
        Ok(ProviderReceipt {
            provider: Provider::Twilio,
            kind: CallKind::Call,
            sid,
        })
    }

    fn sender(&self) -> Result<&str, TelephonyError> {
        self.from_number
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(TelephonyError::MissingSender(Provider::Twilio))
    }

    async fn create(&self, resource: &str, form: &[(&str, &str)]) -> Result<String, TelephonyError> {
        let url = format!(
            "{}/{}/Accounts/{}/{}",
            self.base_url, API_VERSION, self.account_sid, resource
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), %message, "Twilio request rejected");
            return Err(TelephonyError::Provider {
                provider: Provider::Twilio,
                status: status.as_u16(),
                message,
            });
        }

        let body: ResourceResponse = response.json().await.map_err(|e| TelephonyError::Decode {
            provider: Provider::Twilio,
            message: e.to_string(),
        })?;
        Ok(body.sid)
    }
}

/// TwiML document that speaks `text` in the standard voice.
pub fn say_twiml(text: &str) -> String {
    format!(
        "<Response><Say voice=\"{}\">{}</Say></Response>",
        VOICE,
        xml_escape(text)
    )
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
