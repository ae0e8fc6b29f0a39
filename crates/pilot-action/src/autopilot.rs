//! Autonomous lead worker.
//!
//! Polls the store for pending leads and moves each one through
//! Pending -> Contacting -> Completed (or Failed), researching the lead and
//! optionally placing a scripted voice call along the way. Failed leads with
//! pickups to spare go back to Pending at the start of the next iteration.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pilot_core::config::AutoPilotConfig;
use pilot_core::error::PilotError;
use pilot_core::types::{CallKind, LeadStatus};
use pilot_storage::{Lead, NewAgentOutput, NewTelephonyLog, Store};
use pilot_telephony::{describe, reached_provider, Provider, TelephonyFacade};

use crate::error::AutoPilotError;

/// Crew name recorded for research runs in the output history.
pub const AUTOPILOT_CREW: &str = "autopilot";

/// Result of researching one lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchReport {
    pub summary: String,
    pub tokens_used: Option<i64>,
}

/// The research step run for each picked-up lead.
#[async_trait]
pub trait LeadResearcher: Send + Sync {
    async fn research(&self, lead: &Lead) -> Result<ResearchReport, AutoPilotError>;
}

/// Offline researcher that produces a fixed summary after an optional delay.
#[derive(Debug, Clone, Default)]
pub struct TemplateResearcher {
    delay: Duration,
}

impl TemplateResearcher {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl LeadResearcher for TemplateResearcher {
    async fn research(&self, lead: &Lead) -> Result<ResearchReport, AutoPilotError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ResearchReport {
            summary: format!(
                "Autonomous research complete for {}. Agent identified high interest.",
                lead.name
            ),
            tokens_used: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOutcome::Started => f.write_str("Auto-Pilot started."),
            StartOutcome::AlreadyRunning => f.write_str("Auto-Pilot is already running."),
        }
    }
}

/// Shared state used by the background loop.
struct Worker {
    store: Store,
    telephony: TelephonyFacade,
    researcher: Arc<dyn LeadResearcher>,
    config: AutoPilotConfig,
    iterations: AtomicU64,
}

/// One running loop: its stop flag, wake-up signal, and task handle.
struct Run {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

pub struct AutoPilot {
    worker: Arc<Worker>,
    run: Mutex<Option<Run>>,
}

impl AutoPilot {
    pub fn new(
        store: Store,
        telephony: TelephonyFacade,
        researcher: Arc<dyn LeadResearcher>,
        config: AutoPilotConfig,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                store,
                telephony,
                researcher,
                config,
                iterations: AtomicU64::new(0),
            }),
            run: Mutex::new(None),
        }
    }

    /// Spawn the polling loop unless one is already running.
    pub fn start(&self, interval: Duration) -> StartOutcome {
        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        if run.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return StartOutcome::AlreadyRunning;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.worker),
            Arc::clone(&stop),
            Arc::clone(&wake),
            interval,
        ));
        *run = Some(Run { stop, wake, handle });
        info!(interval_ms = interval.as_millis() as u64, "Auto-Pilot started");
        StartOutcome::Started
    }

    /// Ask the loop to stop and wait up to the configured grace period.
    ///
    /// Work on the current lead is never aborted; if the loop does not exit in
    /// time it finishes that lead in the background and then exits. Returns
    /// whether the loop exited within the grace period.
    pub async fn stop(&self) -> bool {
        let run = self.run.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(run) = run else {
            return true;
        };

        run.stop.store(true, Ordering::SeqCst);
        run.wake.notify_one();

        let grace = Duration::from_millis(self.worker.config.stop_grace_ms);
        match tokio::time::timeout(grace, run.handle).await {
            Ok(_) => {
                info!("Auto-Pilot stopped");
                true
            }
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "Auto-Pilot still finishing a lead after stop");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Number of loop iterations started since construction.
    pub fn iterations(&self) -> u64 {
        self.worker.iterations.load(Ordering::SeqCst)
    }
}

async fn run_loop(worker: Arc<Worker>, stop: Arc<AtomicBool>, wake: Arc<Notify>, interval: Duration) {
    while !stop.load(Ordering::SeqCst) {
        worker.iterations.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = worker.run_iteration(&stop).await {
            error!(error = %e, "Auto-Pilot iteration failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = wake.notified() => {}
        }
    }
}

impl Worker {
    async fn run_iteration(&self, stop: &AtomicBool) -> Result<(), AutoPilotError> {
        if self.store.tenant().is_none() {
            return Err(PilotError::TenantUnbound.into());
        }
        self.store.requeue_failed_leads(self.config.max_attempts)?;
        let leads = self.store.pending_leads()?;
        for lead in leads {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.process_lead(&lead).await {
                warn!(lead_id = lead.id, error = %e, "Lead processing failed");
                if let Err(e) = self.store.fail_lead(lead.id, &e.to_string()) {
                    error!(lead_id = lead.id, error = %e, "Failed to mark lead failed");
                }
            }
        }
        Ok(())
    }

    async fn process_lead(&self, lead: &Lead) -> Result<(), AutoPilotError> {
        if !self
            .store
            .update_lead_status(lead.id, LeadStatus::Contacting, None)?
        {
            // Picked up elsewhere since the scan.
            return Ok(());
        }

        let started = Instant::now();
        let report = self.researcher.research(lead).await?;
        let metadata = json!({ "lead_id": lead.id });
        self.store.log_agent_output(&NewAgentOutput {
            crew_name: AUTOPILOT_CREW,
            output: &report.summary,
            status: "Success",
            execution_time: Some(started.elapsed().as_secs_f64()),
            metadata: Some(&metadata),
            tokens_used: report.tokens_used,
        })?;

        if self.config.place_calls && self.telephony.voice_configured() {
            self.call_lead(lead).await?;
        }

        self.store
            .update_lead_status(lead.id, LeadStatus::Completed, Some(&report.summary))?;
        info!(lead_id = lead.id, "Lead processed");
        Ok(())
    }

    /// Place the scripted call and log the attempt. A failed call does not fail the lead.
    async fn call_lead(&self, lead: &Lead) -> Result<(), AutoPilotError> {
        let script = self.config.call_script.replace("{name}", &lead.name);
        let delivery = self.telephony.place_voice_call(&lead.phone, &script).await;
        let result = describe(CallKind::Call, &delivery);
        if delivery.is_err() {
            warn!(lead_id = lead.id, %result, "Voice call not placed");
        }
        if !reached_provider(&delivery) {
            return Ok(());
        }
        self.store.log_telephony(&NewTelephonyLog {
            lead_id: Some(lead.id),
            provider: Provider::Twilio.as_str(),
            sid: delivery.as_ref().ok().map(|r| r.sid.as_str()),
            kind: CallKind::Call,
            result: &result,
        })?;
        Ok(())
    }
}
