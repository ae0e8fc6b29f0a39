//! End-to-end flows across the store, the approval gate, and the auto-pilot.

use std::sync::Arc;
use std::time::Duration;

use pilot_action::{ActionGate, AutoPilot, GateOutcome, StartOutcome, TemplateResearcher};
use pilot_core::config::{AutoPilotConfig, TelephonyConfig};
use pilot_core::types::{ActionStatus, CallKind, LeadStatus};
use pilot_storage::{Database, Store, TenantDirectory};
use pilot_telephony::TelephonyFacade;

// =============================================================================
// Helpers
// =============================================================================

/// A fresh database with a signed-up tenant "ops" and a store bound to it.
fn ops_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(&dir.path().join("pilot.db")).unwrap());
    let tenant = TenantDirectory::new(Arc::clone(&db))
        .create_tenant("ops", "s3cret")
        .unwrap()
        .unwrap();
    (dir, Store::for_tenant(db, tenant.id))
}

fn quick_config() -> AutoPilotConfig {
    AutoPilotConfig {
        interval_secs: 1,
        ..AutoPilotConfig::default()
    }
}

// =============================================================================
// Auto-pilot
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_autopilot_completes_pending_lead() {
    let (_dir, store) = ops_store();
    let id = store.add_lead("Jane", "+15551230000", None).unwrap().unwrap();

    let pilot = AutoPilot::new(
        store.clone(),
        TelephonyFacade::disabled(),
        Arc::new(TemplateResearcher::with_delay(Duration::from_millis(300))),
        quick_config(),
    );
    assert_eq!(pilot.start(Duration::from_secs(1)), StartOutcome::Started);

    let mut seen = Vec::new();
    for _ in 0..100 {
        let status = store.get_lead(id).unwrap().unwrap().status;
        if seen.last() != Some(&status) {
            seen.push(status);
        }
        if status == LeadStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    pilot.stop().await;

    assert_eq!(seen.last(), Some(&LeadStatus::Completed));
    assert!(seen.contains(&LeadStatus::Contacting));
    // Status only ever moved forward.
    for pair in seen.windows(2) {
        assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
    }

    let lead = store.get_lead(id).unwrap().unwrap();
    assert!(!lead.research_summary.unwrap_or_default().is_empty());
    assert_eq!(lead.attempts, 1);
}

#[tokio::test]
async fn test_second_start_does_not_spawn_another_loop() {
    let (_dir, store) = ops_store();
    let pilot = AutoPilot::new(
        store,
        TelephonyFacade::disabled(),
        Arc::new(TemplateResearcher::default()),
        quick_config(),
    );

    assert_eq!(pilot.start(Duration::from_millis(200)), StartOutcome::Started);
    assert_eq!(
        pilot.start(Duration::from_millis(200)),
        StartOutcome::AlreadyRunning
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    pilot.stop().await;

    // One loop at 200ms fits about five iterations in a second.
    let iterations = pilot.iterations();
    assert!(iterations >= 1);
    assert!(iterations <= 7, "saw {} iterations", iterations);
}

#[tokio::test]
async fn test_autopilot_calls_lead_when_voice_configured() {
    let mut server = mockito::Server::new_async().await;
    let calls = server
        .mock("POST", "/2010-04-01/Accounts/AC123/Calls.json")
        .with_status(201)
        .with_body(r#"{"sid": "CA900"}"#)
        .expect(1)
        .create_async()
        .await;
    let telephony = TelephonyFacade::new(&TelephonyConfig {
        twilio_sid: Some("AC123".to_string()),
        twilio_auth_token: Some("token".to_string()),
        twilio_from_number: Some("+15550000000".to_string()),
        twilio_base_url: server.url(),
        ..TelephonyConfig::default()
    })
    .unwrap();

    let (_dir, store) = ops_store();
    let id = store.add_lead("Jane", "+1 (555) 123-0000", None).unwrap().unwrap();

    let pilot = AutoPilot::new(
        store.clone(),
        telephony,
        Arc::new(TemplateResearcher::default()),
        quick_config(),
    );
    pilot.start(Duration::from_secs(60));
    for _ in 0..100 {
        if store.get_lead(id).unwrap().unwrap().status == LeadStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    pilot.stop().await;

    calls.assert_async().await;
    let logs = store.telephony_logs().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].lead_id, Some(id));
    assert_eq!(logs[0].kind, CallKind::Call);
    assert_eq!(logs[0].sid.as_deref(), Some("CA900"));
    assert_eq!(logs[0].result.as_deref(), Some("Call Initiated. SID: CA900"));
}

// =============================================================================
// Approval gate
// =============================================================================

#[tokio::test]
async fn test_rejection_from_another_handle_reaches_waiter() {
    let (_dir, store) = ops_store();
    let waiter = ActionGate::with_timing(
        store.clone(),
        Duration::from_millis(100),
        Duration::from_secs(10),
    );
    // A separate gate, as a reviewer in another process would have.
    let reviewer = ActionGate::with_timing(
        store.clone(),
        Duration::from_millis(100),
        Duration::from_secs(10),
    );

    let id = waiter
        .request_approval("Email Dispatch", "To: x@y.com")
        .unwrap()
        .unwrap();

    let resolve = async {
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(reviewer
            .resolve(id, ActionStatus::Rejected, Some("wrong recipient"))
            .unwrap());
    };
    let (outcome, _) = tokio::join!(
        waiter.await_resolution(id, Duration::from_millis(100), Duration::from_secs(10)),
        resolve
    );

    assert_eq!(outcome, GateOutcome::Rejected("wrong recipient".to_string()));
    let text = outcome.to_string();
    assert!(text.contains("Rejected"));
    assert!(text.contains("wrong recipient"));

    // Write-once: a late approval changes nothing.
    assert!(!reviewer.resolve(id, ActionStatus::Approved, None).unwrap());
    let state = store.action_status(id).unwrap().unwrap();
    assert_eq!(state.status, ActionStatus::Rejected);
}

#[tokio::test]
async fn test_unanswered_action_times_out_and_stays_pending() {
    let (_dir, store) = ops_store();
    let gate = ActionGate::with_timing(store.clone(), Duration::from_millis(100), Duration::from_secs(1));

    let started = std::time::Instant::now();
    let outcome = gate.gated("Email Dispatch", "To: x@y.com").await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, GateOutcome::TimedOut);
    assert!(!outcome.is_approved());
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3));

    let pending = store.pending_actions().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, ActionStatus::Pending);
}

#[tokio::test]
async fn test_actions_are_tenant_scoped() {
    let (_dir, store) = ops_store();
    let gate = ActionGate::with_timing(store.clone(), Duration::from_millis(50), Duration::from_secs(1));
    let id = gate.request_approval("Email Dispatch", "To: x@y.com").unwrap().unwrap();

    let outsider = ActionGate::with_timing(
        store.with_tenant(pilot_core::types::TenantId::BOOTSTRAP),
        Duration::from_millis(50),
        Duration::from_secs(1),
    );
    assert!(outsider.store().pending_actions().unwrap().is_empty());
    assert!(!outsider.resolve(id, ActionStatus::Approved, None).unwrap());
    assert_eq!(
        store.action_status(id).unwrap().unwrap().status,
        ActionStatus::Pending
    );
}
