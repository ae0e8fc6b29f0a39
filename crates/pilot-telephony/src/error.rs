use thiserror::Error;

use crate::Provider;

/// Errors from outbound communication backends.
#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("{0} not configured")]
    NotConfigured(Provider),

    #[error("No sender number configured for {0}")]
    MissingSender(Provider),

    #[error("Invalid destination number: {0}")]
    InvalidNumber(String),

    #[error("Invalid {provider} URL: {message}")]
    InvalidUrl { provider: Provider, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {message}")]
    Provider {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {provider}: {message}")]
    Decode { provider: Provider, message: String },

    #[error("Mail error: {0}")]
    Mail(String),
}

impl TelephonyError {
    /// Whether the attempt got as far as a provider. Attempts that never
    /// left the process (no credentials, no sender, bad number) are not logged.
    pub fn reached_provider(&self) -> bool {
        !matches!(
            self,
            TelephonyError::NotConfigured(_)
                | TelephonyError::MissingSender(_)
                | TelephonyError::InvalidNumber(_)
                | TelephonyError::InvalidUrl { .. }
        )
    }
}

impl From<TelephonyError> for pilot_core::PilotError {
    fn from(err: TelephonyError) -> Self {
        pilot_core::PilotError::Telephony(err.to_string())
    }
}
