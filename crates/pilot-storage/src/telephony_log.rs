use tracing::info;

use pilot_core::error::Result;
use pilot_core::types::Timestamp;

use crate::records::{NewTelephonyLog, TelephonyLog};
use crate::store::{collect_rows, sql_err, Store};

impl Store {
    /// Append an outbound attempt to the log.
    pub fn log_telephony(&self, entry: &NewTelephonyLog<'_>) -> Result<Option<i64>> {
        self.scoped(None, |conn, tenant| {
            conn.execute(
                "INSERT INTO telephony_logs (tenant_id, lead_id, provider, sid, type, result, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    tenant.0,
                    entry.lead_id,
                    entry.provider,
                    entry.sid,
                    entry.kind.to_string(),
                    entry.result,
                    Timestamp::now().0,
                ],
            )
            .map_err(sql_err("Failed to log telephony attempt"))?;
            let id = conn.last_insert_rowid();
            info!(
                tenant_id = tenant.0,
                log_id = id,
                provider = entry.provider,
                kind = %entry.kind,
                "Telephony attempt logged"
            );
            Ok(Some(id))
        })
    }

    /// Log entries newest first, with the targeted lead's name and phone where known.
    pub fn telephony_logs(&self) -> Result<Vec<TelephonyLog>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(
                    "SELECT t.id, t.lead_id, l.name, l.phone, t.provider, t.sid, t.type,
                            t.result, t.transcript, t.timestamp
                     FROM telephony_logs t
                     LEFT JOIN leads l ON l.id = t.lead_id AND l.tenant_id = t.tenant_id
                     WHERE t.tenant_id = ?1
                     ORDER BY t.timestamp DESC, t.id DESC",
                )
                .map_err(sql_err("Failed to prepare telephony log query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], TelephonyLog::from_row)
                .map_err(sql_err("Failed to list telephony logs"))?;
            collect_rows(rows, "Failed to read telephony log")
        })
    }

    /// Attach a transcript to the log entry with the given provider call id.
    pub fn update_transcript(&self, sid: &str, transcript: &str) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    "UPDATE telephony_logs SET transcript = ?1 WHERE sid = ?2 AND tenant_id = ?3",
                    rusqlite::params![transcript, sid, tenant.0],
                )
                .map_err(sql_err("Failed to update transcript"))?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use pilot_core::types::{CallKind, TenantId};

    use crate::store::test_support::temp_db;

    use super::*;

    #[test]
    fn test_log_joins_lead() {
        let (_dir, db) = temp_db();
        let store = Store::for_tenant(db, TenantId(2));
        let lead = store.add_lead("Jane", "+15551230000", None).unwrap().unwrap();

        store
            .log_telephony(&NewTelephonyLog {
                lead_id: Some(lead),
                provider: "twilio",
                sid: Some("CA123"),
                kind: CallKind::Call,
                result: "Call Initiated. SID: CA123",
            })
            .unwrap()
            .unwrap();
        store
            .log_telephony(&NewTelephonyLog {
                lead_id: None,
                provider: "twilio",
                sid: None,
                kind: CallKind::Sms,
                result: "SMS Failed: unreachable",
            })
            .unwrap()
            .unwrap();

        let logs = store.telephony_logs().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].kind, CallKind::Sms);
        assert!(logs[0].lead_name.is_none());
        assert_eq!(logs[1].lead_name.as_deref(), Some("Jane"));
        assert_eq!(logs[1].lead_phone.as_deref(), Some("+15551230000"));
    }

    #[test]
    fn test_update_transcript_by_sid() {
        let (_dir, db) = temp_db();
        let store = Store::for_tenant(db.clone(), TenantId(2));
        store
            .log_telephony(&NewTelephonyLog {
                lead_id: None,
                provider: "vapi",
                sid: Some("call-42"),
                kind: CallKind::Call,
                result: "queued",
            })
            .unwrap();

        let other = Store::for_tenant(db, TenantId(3));
        assert!(!other.update_transcript("call-42", "stolen").unwrap());

        assert!(store.update_transcript("call-42", "Hi, this is Jane").unwrap());
        assert!(!store.update_transcript("missing", "x").unwrap());
        let logs = store.telephony_logs().unwrap();
        assert_eq!(logs[0].transcript.as_deref(), Some("Hi, this is Jane"));
        assert!(other.telephony_logs().unwrap().is_empty());
    }
}
