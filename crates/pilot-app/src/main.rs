//! Pilot application binary - composition root.
//!
//! 1. Parse CLI and load configuration from TOML
//! 2. Open (and repair) the SQLite store
//! 3. Resolve the operator's tenant
//! 4. Run one operator command, or the auto-pilot until Ctrl-C

mod cli;
mod leads_csv;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use pilot_action::{ActionGate, AutoPilot, TemplateResearcher};
use pilot_core::config::PilotConfig;
use pilot_core::error::PilotError;
use pilot_storage::{Database, Store, Tenant, TenantDirectory};
use pilot_telephony::{describe_transcript, TelephonyFacade};

use cli::{ActionsCommand, CliArgs, Command, Credentials, LeadCommand, MemoryCommand};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Look up the tenant named by the operator's credentials.
fn sign_in(directory: &TenantDirectory, credentials: Option<Credentials>) -> AppResult<Tenant> {
    let tenant = match credentials {
        Some(Credentials::ApiKey(key)) => directory.tenant_by_api_key(&key)?,
        Some(Credentials::NameSecret { name, secret }) => directory.verify_tenant(&name, &secret)?,
        None => {
            return Err(PilotError::Config(
                "this command needs a tenant: pass --tenant/--secret or --api-key".to_string(),
            )
            .into())
        }
    };
    tenant.ok_or_else(|| PilotError::Config("invalid tenant credentials".to_string()).into())
}

/// Fetch a transcript and store it on the matching log row. Only a real
/// transcript is stored; status and error text is returned but never saved.
async fn backfill_transcript(
    store: &Store,
    telephony: &TelephonyFacade,
    call_id: &str,
) -> AppResult<String> {
    let result = telephony.fetch_transcript_text(call_id).await;
    if let Ok(Some(transcript)) = &result {
        if store.update_transcript(call_id, transcript)? {
            tracing::info!(call_id = %call_id, "Transcript saved to call log");
        }
    }
    Ok(describe_transcript(&result))
}

/// Print rows as JSON or one line each.
fn print_rows<T: Serialize>(json: bool, rows: &[T], line: impl Fn(&T) -> String) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if rows.is_empty() {
        println!("(none)");
    } else {
        for row in rows {
            println!("{}", line(row));
        }
    }
    Ok(())
}

async fn run_command(
    args: &CliArgs,
    config: &PilotConfig,
    db: Arc<Database>,
) -> AppResult<()> {
    let directory = TenantDirectory::new(Arc::clone(&db));

    match &args.command {
        Command::Init => {
            println!("Database ready at {}", db.path().display());
            return Ok(());
        }
        Command::Signup { name, secret } => {
            let Some(tenant) = directory.create_tenant(name, secret)? else {
                return Err(PilotError::Config(format!("tenant name '{}' is taken", name)).into());
            };
            let store = Store::for_tenant(Arc::clone(&db), tenant.id);
            let api_key = store.api_key()?.unwrap_or_default();
            println!("Tenant '{}' created (id {})", tenant.name, tenant.id);
            println!("API key: {}", api_key);
            return Ok(());
        }
        _ => {}
    }

    let tenant = sign_in(&directory, args.resolve_credentials())?;
    tracing::info!(tenant_id = tenant.id.0, name = %tenant.name, "Signed in");
    let store = Store::for_tenant(Arc::clone(&db), tenant.id);

    match &args.command {
        Command::Init | Command::Signup { .. } => {}
        Command::Lead(LeadCommand::Add { name, phone, email }) => {
            match store.add_lead(name, phone, email.as_deref())? {
                Some(id) => println!("Lead {} added", id),
                None => println!("Lead not added"),
            }
        }
        Command::Lead(LeadCommand::List) => {
            let leads = store.all_leads()?;
            print_rows(args.json, &leads, |l| {
                format!(
                    "#{} {} <{}> {} (attempts: {}){}",
                    l.id,
                    l.name,
                    l.phone,
                    l.status,
                    l.attempts,
                    l.last_error
                        .as_ref()
                        .map(|e| format!(" error: {}", e))
                        .unwrap_or_default()
                )
            })?;
        }
        Command::Lead(LeadCommand::Import { path }) => {
            let file = std::fs::File::open(path)?;
            let count = leads_csv::import_leads(&store, file)?;
            println!("Successfully imported {} leads.", count);
        }
        Command::Lead(LeadCommand::Export { path }) => {
            let file = std::fs::File::create(path)?;
            let count = leads_csv::export_leads(&store, file)?;
            println!("Exported {} leads to {}", count, path.display());
        }
        Command::Actions(ActionsCommand::List) => {
            let actions = store.pending_actions()?;
            print_rows(args.json, &actions, |a| {
                format!(
                    "#{} [{}] {} ({})\n{}\n",
                    a.id, a.status, a.tool_name, a.created_at, a.action_details
                )
            })?;
        }
        Command::Actions(ActionsCommand::Resolve {
            id,
            decision,
            feedback,
        }) => {
            let gate = ActionGate::new(store, &config.gate);
            if gate.resolve(*id, (*decision).into(), feedback.as_deref())? {
                println!("Action {} resolved", id);
            } else {
                println!("Action {} was already resolved or does not exist", id);
            }
        }
        Command::Memory(MemoryCommand::Set { key, value }) => {
            store.save_memory(key, value)?;
            println!("Stored '{}'", key);
        }
        Command::Memory(MemoryCommand::Get { key }) => match store.recall_memory(key)? {
            Some(value) => println!("{}", value),
            None => println!("No memory found for key '{}'", key),
        },
        Command::Memory(MemoryCommand::List) => {
            let entries = store.all_memories()?;
            print_rows(args.json, &entries, |m| {
                format!("[{}] = {} (saved: {})", m.key, m.value, m.updated_at)
            })?;
        }
        Command::Transcript { call_id } => {
            let telephony = TelephonyFacade::new(&config.telephony)?;
            println!("{}", backfill_transcript(&store, &telephony, call_id).await?);
        }
        Command::Run { interval } => {
            let telephony = TelephonyFacade::new(&config.telephony)?;
            let interval = interval.unwrap_or(config.autopilot.interval_secs).max(1);
            let pilot = AutoPilot::new(
                store,
                telephony,
                Arc::new(TemplateResearcher::default()),
                config.autopilot.clone(),
            );
            println!("{}", pilot.start(Duration::from_secs(interval)));

            tokio::signal::ctrl_c().await?;
            tracing::info!("Ctrl-C received, stopping Auto-Pilot");
            if !pilot.stop().await {
                tracing::warn!("Auto-Pilot did not stop within the grace period");
            }
            println!("Auto-Pilot stopped after {} iterations.", pilot.iterations());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        PilotConfig::load(&config_file)?
    } else {
        PilotConfig::default()
    };
    config
        .telephony
        .overlay(|key| std::env::var(key).ok());
    config.email.overlay(|key| std::env::var(key).ok());

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Pilot v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let db_path = args.resolve_db_path(&config.storage.db_path);
    let db = Database::open_with_busy_timeout(
        &db_path,
        Duration::from_millis(config.storage.busy_timeout_ms),
    )?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    run_command(&args, &config, Arc::new(db)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_core::types::{CallKind, TenantId};
    use pilot_storage::NewTelephonyLog;

    #[tokio::test]
    async fn test_unavailable_transcript_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("app.db")).unwrap());
        let store = Store::for_tenant(db, TenantId(1));
        store
            .log_telephony(&NewTelephonyLog {
                lead_id: None,
                provider: "vapi",
                sid: Some("call-1"),
                kind: CallKind::Call,
                result: "Vapi Call Started. ID: call-1",
            })
            .unwrap();

        let text = backfill_transcript(&store, &TelephonyFacade::disabled(), "call-1")
            .await
            .unwrap();
        assert!(!text.is_empty());

        let logs = store.telephony_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].transcript, None);
    }
}
