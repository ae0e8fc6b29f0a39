//! Unified outbound communication surface.

use std::time::Duration;

use tracing::{debug, warn};

use pilot_core::config::TelephonyConfig;

use crate::number::normalize_number;
use crate::twilio::TwilioBackend;
use crate::vapi::VapiBackend;
use crate::{Provider, ProviderReceipt, TelephonyError};

const TRANSCRIPT_NOT_CONFIGURED: &str = "Transcript unavailable (Vapi not configured). \
     This call might be a standard Twilio voice call or manual outreach.";
const TRANSCRIPT_PROCESSING: &str = "Transcript is still processing or unavailable.";

/// Outbound SMS, voice, and assistant calls over whichever backends are configured.
///
/// Cheap to clone; clones share one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct TelephonyFacade {
    twilio: Option<TwilioBackend>,
    vapi: Option<VapiBackend>,
}

impl TelephonyFacade {
    pub fn new(config: &TelephonyConfig) -> Result<Self, TelephonyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        let facade = Self {
            twilio: TwilioBackend::from_config(config, client.clone()),
            vapi: VapiBackend::from_config(config, client),
        };
        debug!(
            sms_and_voice = facade.voice_configured(),
            assistant = facade.assistant_configured(),
            "Telephony facade ready"
        );
        Ok(facade)
    }

    /// A facade with every backend unconfigured.
    pub fn disabled() -> Self {
        Self {
            twilio: None,
            vapi: None,
        }
    }

    pub fn voice_configured(&self) -> bool {
        self.twilio.is_some()
    }

    pub fn assistant_configured(&self) -> bool {
        self.vapi.is_some()
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<ProviderReceipt, TelephonyError> {
        let twilio = self
            .twilio
            .as_ref()
            .ok_or(TelephonyError::NotConfigured(Provider::Twilio))?;
        let to = normalize_number(to)?;
        twilio.send_sms(&to, body).await
    }

    pub async fn place_voice_call(
        &self,
        to: &str,
        spoken_text: &str,
    ) -> Result<ProviderReceipt, TelephonyError> {
        let twilio = self
            .twilio
            .as_ref()
            .ok_or(TelephonyError::NotConfigured(Provider::Twilio))?;
        let to = normalize_number(to)?;
        twilio.place_call(&to, spoken_text).await
    }

    pub async fn place_assistant_call(
        &self,
        to: &str,
        assistant_or_number_id: &str,
    ) -> Result<ProviderReceipt, TelephonyError> {
        let vapi = self
            .vapi
            .as_ref()
            .ok_or(TelephonyError::NotConfigured(Provider::Vapi))?;
        let to = normalize_number(to)?;
        vapi.place_assistant_call(&to, assistant_or_number_id).await
    }

    /// Transcript of a finished call; `Ok(None)` while it is still processing.
    pub async fn fetch_transcript_text(
        &self,
        call_id: &str,
    ) -> Result<Option<String>, TelephonyError> {
        let vapi = self
            .vapi
            .as_ref()
            .ok_or(TelephonyError::NotConfigured(Provider::Vapi))?;
        vapi.fetch_transcript(call_id).await
    }

    /// Best-effort transcript lookup. Always returns readable text.
    pub async fn fetch_transcript(&self, call_id: &str) -> String {
        let result = self.fetch_transcript_text(call_id).await;
        if let Err(ref e) = result {
            if e.reached_provider() {
                warn!(call_id, error = %e, "Transcript fetch failed");
            }
        }
        describe_transcript(&result)
    }
}

/// Narrative text for a transcript lookup.
pub fn describe_transcript(result: &Result<Option<String>, TelephonyError>) -> String {
    match result {
        Ok(Some(transcript)) => transcript.clone(),
        Ok(None) => TRANSCRIPT_PROCESSING.to_string(),
        Err(TelephonyError::NotConfigured(_)) => TRANSCRIPT_NOT_CONFIGURED.to_string(),
        Err(TelephonyError::Provider { status, .. }) => {
            format!("Vapi Error {}: Unable to fetch transcript.", status)
        }
        Err(e) => format!("Transcript fetch failed: {}", e),
    }
}
