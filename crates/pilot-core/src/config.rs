use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PilotError, Result};

/// Top-level configuration for the Pilot application.
///
/// Loaded from `~/.pilot/config.toml` by default. Each section corresponds
/// to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PilotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub autopilot: AutoPilotConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl PilotConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PilotConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PilotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub db_path: String,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.pilot/pilot.db".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Human approval gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Seconds between status polls while waiting on a decision.
    pub poll_interval_secs: u64,
    /// Seconds before a waiting caller gives up and treats the action as rejected.
    pub timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            timeout_secs: 600,
        }
    }
}

/// Autonomous lead worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPilotConfig {
    /// Seconds between scans for pending leads.
    pub interval_secs: u64,
    /// How long `stop` waits for the loop to exit.
    pub stop_grace_ms: u64,
    /// Place a voice call to each lead when a voice backend is configured.
    pub place_calls: bool,
    /// Spoken script; `{name}` is replaced with the lead's name.
    pub call_script: String,
    /// Pickups allowed per lead. Failed leads below this are requeued.
    pub max_attempts: u32,
}

impl Default for AutoPilotConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            stop_grace_ms: 2_000,
            place_calls: true,
            max_attempts: 3,
            call_script: "Hello {name}, this is a priority call from the Pilot outreach team. \
                          Our research identified your interest in our services."
                .to_string(),
        }
    }
}

/// Outbound communication provider credentials.
///
/// Each backend is active only when all of its credentials are present.
/// An entirely empty section is a valid, fully degraded configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    pub twilio_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub vapi_api_key: Option<String>,
    pub twilio_base_url: String,
    pub vapi_base_url: String,
    /// Per-request timeout for provider HTTP calls.
    pub request_timeout_secs: u64,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            twilio_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            vapi_api_key: None,
            twilio_base_url: "https://api.twilio.com".to_string(),
            vapi_base_url: "https://api.vapi.ai".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl TelephonyConfig {
    pub const TWILIO_SID_VAR: &'static str = "TWILIO_SID";
    pub const TWILIO_AUTH_TOKEN_VAR: &'static str = "TWILIO_AUTH_TOKEN";
    pub const TWILIO_FROM_NUMBER_VAR: &'static str = "TWILIO_FROM_NUMBER";
    pub const VAPI_API_KEY_VAR: &'static str = "VAPI_API_KEY";

    /// Build a config from the process environment only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.overlay(|key| std::env::var(key).ok());
        config
    }

    /// Overlay credentials from a variable lookup; set, non-empty variables win.
    pub fn overlay<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = read(Self::TWILIO_SID_VAR) {
            self.twilio_sid = Some(v);
        }
        if let Some(v) = read(Self::TWILIO_AUTH_TOKEN_VAR) {
            self.twilio_auth_token = Some(v);
        }
        if let Some(v) = read(Self::TWILIO_FROM_NUMBER_VAR) {
            self.twilio_from_number = Some(v);
        }
        if let Some(v) = read(Self::VAPI_API_KEY_VAR) {
            self.vapi_api_key = Some(v);
        }
    }

    /// Whether the SMS / voice backend has its account credentials.
    pub fn twilio_configured(&self) -> bool {
        self.twilio_sid.is_some() && self.twilio_auth_token.is_some()
    }

    /// Whether the assistant-call backend has its API key.
    pub fn vapi_configured(&self) -> bool {
        self.vapi_api_key.is_some()
    }
}

/// Outbound SMTP settings for the email tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    /// 465 uses implicit TLS; any other port upgrades with STARTTLS.
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address; the username when unset.
    pub from_address: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            username: None,
            password: None,
            from_address: None,
        }
    }
}

impl EmailConfig {
    pub const USERNAME_VAR: &'static str = "SMTP_USERNAME";
    pub const PASSWORD_VAR: &'static str = "SMTP_PASSWORD";

    /// Overlay credentials from a variable lookup; set, non-empty variables win.
    pub fn overlay<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = read(Self::USERNAME_VAR) {
            self.username = Some(v);
        }
        if let Some(v) = read(Self::PASSWORD_VAR) {
            self.password = Some(v);
        }
    }

    pub fn configured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn sender(&self) -> Option<&str> {
        self.from_address.as_deref().or(self.username.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = PilotConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.storage.db_path, "~/.pilot/pilot.db");
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
        assert_eq!(config.gate.poll_interval_secs, 3);
        assert_eq!(config.gate.timeout_secs, 600);
        assert_eq!(config.autopilot.interval_secs, 60);
        assert!(config.autopilot.place_calls);
        assert_eq!(config.autopilot.max_attempts, 3);
        assert!(config.autopilot.call_script.contains("{name}"));
        assert!(!config.telephony.twilio_configured());
        assert!(!config.telephony.vapi_configured());
    }

    #[test]
    fn test_config_load_partial_toml() {
        let file = create_temp_config(
            r#"
[gate]
poll_interval_secs = 1
timeout_secs = 30

[telephony]
vapi_api_key = "vk-test"
"#,
        );
        let config = PilotConfig::load(file.path()).unwrap();
        assert_eq!(config.gate.poll_interval_secs, 1);
        assert_eq!(config.gate.timeout_secs, 30);
        assert_eq!(config.telephony.vapi_api_key.as_deref(), Some("vk-test"));
        assert!(config.telephony.vapi_configured());
        // Untouched sections keep defaults.
        assert_eq!(config.autopilot.interval_secs, 60);
        assert_eq!(config.telephony.vapi_base_url, "https://api.vapi.ai");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(PilotConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_config_load_or_default_missing_file() {
        let config = PilotConfig::load_or_default(Path::new("/does/not/exist/config.toml"));
        assert_eq!(config.gate.timeout_secs, 600);
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = PilotConfig::default();
        config.autopilot.interval_secs = 5;
        config.save(&path).unwrap();

        let reloaded = PilotConfig::load(&path).unwrap();
        assert_eq!(reloaded.autopilot.interval_secs, 5);
    }

    #[test]
    fn test_telephony_overlay_prefers_set_variables() {
        let env: HashMap<&str, &str> = [
            ("TWILIO_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "secret"),
            ("TWILIO_FROM_NUMBER", ""),
        ]
        .into_iter()
        .collect();

        let mut config = TelephonyConfig {
            twilio_from_number: Some("+15550000000".to_string()),
            ..TelephonyConfig::default()
        };
        config.overlay(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.twilio_sid.as_deref(), Some("AC123"));
        assert!(config.twilio_configured());
        // Empty variables do not clobber file values.
        assert_eq!(config.twilio_from_number.as_deref(), Some("+15550000000"));
        assert!(!config.vapi_configured());
    }

    #[test]
    fn test_email_section() {
        let file = create_temp_config(
            r#"
[email]
smtp_host = "smtp.example.com"
smtp_port = 587
username = "bot@example.com"
"#,
        );
        let mut config = PilotConfig::load(file.path()).unwrap();
        assert_eq!(config.email.smtp_port, 587);
        assert!(!config.email.configured());
        assert_eq!(config.email.sender(), Some("bot@example.com"));

        config.email.overlay(|key| (key == "SMTP_PASSWORD").then(|| "app-pw".to_string()));
        assert!(config.email.configured());
        assert_eq!(config.email.username.as_deref(), Some("bot@example.com"));
    }

    #[test]
    fn test_twilio_requires_both_credentials() {
        let config = TelephonyConfig {
            twilio_sid: Some("AC123".to_string()),
            ..TelephonyConfig::default()
        };
        assert!(!config.twilio_configured());
    }
}
