//! CLI argument definitions for the Pilot application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use pilot_core::types::ActionStatus;

/// Pilot - tenant-isolated outreach automation with human approval.
#[derive(Parser, Debug)]
#[command(name = "pilot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database.
    #[arg(short = 'd', long = "db-path", global = true)]
    pub db_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Tenant name to act as (requires --secret).
    #[arg(short = 't', long = "tenant", global = true)]
    pub tenant: Option<String>,

    /// Tenant secret.
    #[arg(long = "secret", global = true)]
    pub secret: Option<String>,

    /// Tenant API key, instead of --tenant/--secret.
    #[arg(long = "api-key", global = true)]
    pub api_key: Option<String>,

    /// Print lists as JSON.
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or repair the database schema.
    Init,
    /// Register a new tenant and print its API key.
    Signup { name: String, secret: String },
    /// Manage leads.
    #[command(subcommand)]
    Lead(LeadCommand),
    /// Review actions awaiting approval.
    #[command(subcommand)]
    Actions(ActionsCommand),
    /// Read and write the long-term memory vault.
    #[command(subcommand)]
    Memory(MemoryCommand),
    /// Fetch a call transcript and store it on the matching log row.
    Transcript { call_id: String },
    /// Run the auto-pilot until Ctrl-C.
    Run {
        /// Seconds between scans for pending leads.
        #[arg(short = 'i', long = "interval")]
        interval: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LeadCommand {
    Add {
        name: String,
        phone: String,
        #[arg(long)]
        email: Option<String>,
    },
    List,
    /// Add leads from a CSV file with Name, Phone and Email columns.
    Import { path: PathBuf },
    /// Write every lead to a CSV file.
    Export { path: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum ActionsCommand {
    List,
    Resolve {
        id: i64,
        decision: Decision,
        #[arg(short = 'f', long = "feedback")]
        feedback: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for ActionStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => ActionStatus::Approved,
            Decision::Reject => ActionStatus::Rejected,
        }
    }
}

/// How the operator identified their tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    NameSecret { name: String, secret: String },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PILOT_CONFIG env var > ~/.pilot/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PILOT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the database path.
    ///
    /// Priority: --db-path flag > PILOT_DB_PATH env var > config file value.
    pub fn resolve_db_path(&self, config_db_path: &str) -> PathBuf {
        if let Some(ref p) = self.db_path {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PILOT_DB_PATH") {
            if !p.trim().is_empty() {
                return expand_home(&p);
            }
        }
        expand_home(config_db_path)
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > PILOT_LOG_LEVEL env var > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(level) = std::env::var("PILOT_LOG_LEVEL") {
            if !level.trim().is_empty() {
                return level;
            }
        }
        config_level.to_string()
    }

    /// Resolve tenant credentials.
    ///
    /// --api-key wins over --tenant/--secret; PILOT_API_KEY is the fallback.
    pub fn resolve_credentials(&self) -> Option<Credentials> {
        if let Some(ref key) = self.api_key {
            return Some(Credentials::ApiKey(key.clone()));
        }
        if let (Some(name), Some(secret)) = (&self.tenant, &self.secret) {
            return Some(Credentials::NameSecret {
                name: name.clone(),
                secret: secret.clone(),
            });
        }
        std::env::var("PILOT_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Credentials::ApiKey)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".pilot").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}
