use rusqlite::OptionalExtension;
use tracing::{debug, info};

use pilot_core::error::Result;
use pilot_core::types::{LeadId, LeadStatus, Timestamp};

use crate::records::Lead;
use crate::store::{collect_rows, sql_err, Store};

impl Store {
    /// Add a lead in `Pending` state.
    pub fn add_lead(&self, name: &str, phone: &str, email: Option<&str>) -> Result<Option<LeadId>> {
        self.scoped(None, |conn, tenant| {
            let now = Timestamp::now().0;
            conn.execute(
                "INSERT INTO leads (tenant_id, name, phone, email, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'Pending', ?5, ?5)",
                rusqlite::params![tenant.0, name, phone, email, now],
            )
            .map_err(sql_err("Failed to add lead"))?;
            let id = conn.last_insert_rowid();
            info!(tenant_id = tenant.0, lead_id = id, "Lead added");
            Ok(Some(id))
        })
    }

    pub fn get_lead(&self, id: LeadId) -> Result<Option<Lead>> {
        self.scoped(None, |conn, tenant| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM leads WHERE id = ?1 AND tenant_id = ?2",
                    Lead::COLUMNS
                ),
                rusqlite::params![id, tenant.0],
                Lead::from_row,
            )
            .optional()
            .map_err(sql_err("Failed to get lead"))
        })
    }

    /// All leads, newest first.
    pub fn all_leads(&self) -> Result<Vec<Lead>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM leads WHERE tenant_id = ?1
                     ORDER BY created_at DESC, id DESC",
                    Lead::COLUMNS
                ))
                .map_err(sql_err("Failed to prepare lead query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], Lead::from_row)
                .map_err(sql_err("Failed to list leads"))?;
            collect_rows(rows, "Failed to read lead")
        })
    }

    /// Leads waiting for the worker, oldest first.
    pub fn pending_leads(&self) -> Result<Vec<Lead>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM leads WHERE tenant_id = ?1 AND status = 'Pending'
                     ORDER BY id ASC",
                    Lead::COLUMNS
                ))
                .map_err(sql_err("Failed to prepare pending lead query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], Lead::from_row)
                .map_err(sql_err("Failed to list pending leads"))?;
            collect_rows(rows, "Failed to read lead")
        })
    }

    /// Move a lead forward to `status`, optionally recording a research summary.
    ///
    /// Returns `false` when the lead does not exist for this tenant or is not in
    /// a state that may precede `status`; statuses never move backwards.
    pub fn update_lead_status(
        &self,
        id: LeadId,
        status: LeadStatus,
        summary: Option<&str>,
    ) -> Result<bool> {
        let Some(guard) = predecessor_list(status) else {
            debug!(lead_id = id, %status, "No transition leads into this status");
            return Ok(false);
        };

        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    &format!(
                        "UPDATE leads
                         SET status = ?1,
                             research_summary = COALESCE(?2, research_summary),
                             attempts = attempts + (CASE WHEN ?1 = 'Contacting' THEN 1 ELSE 0 END),
                             updated_at = ?3
                         WHERE id = ?4 AND tenant_id = ?5 AND status IN ({})",
                        guard
                    ),
                    rusqlite::params![status.as_str(), summary, Timestamp::now().0, id, tenant.0],
                )
                .map_err(sql_err("Failed to update lead status"))?;

            if changed > 0 {
                info!(tenant_id = tenant.0, lead_id = id, %status, "Lead status updated");
            } else {
                debug!(lead_id = id, %status, "Lead status update not applied");
            }
            Ok(changed > 0)
        })
    }

    /// Mark a lead `Failed` and record why.
    pub fn fail_lead(&self, id: LeadId, error: &str) -> Result<bool> {
        let Some(guard) = predecessor_list(LeadStatus::Failed) else {
            return Ok(false);
        };
        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    &format!(
                        "UPDATE leads SET status = 'Failed', last_error = ?1, updated_at = ?2
                         WHERE id = ?3 AND tenant_id = ?4 AND status IN ({})",
                        guard
                    ),
                    rusqlite::params![error, Timestamp::now().0, id, tenant.0],
                )
                .map_err(sql_err("Failed to mark lead failed"))?;
            Ok(changed > 0)
        })
    }

    /// Put failed leads with fewer than `max_attempts` pickups back in the queue.
    ///
    /// This is the only way out of `Failed`; `last_error` is kept until the next pickup.
    pub fn requeue_failed_leads(&self, max_attempts: u32) -> Result<usize> {
        self.scoped(0, |conn, tenant| {
            let requeued = conn
                .execute(
                    "UPDATE leads SET status = 'Pending', updated_at = ?1
                     WHERE tenant_id = ?2 AND status = 'Failed' AND attempts < ?3",
                    rusqlite::params![Timestamp::now().0, tenant.0, max_attempts],
                )
                .map_err(sql_err("Failed to requeue leads"))?;
            if requeued > 0 {
                info!(tenant_id = tenant.0, requeued, "Failed leads requeued");
            }
            Ok(requeued)
        })
    }
}

/// SQL list of quoted statuses that may precede `status`; `None` if nothing does.
fn predecessor_list(status: LeadStatus) -> Option<String> {
    let preds = status.predecessors();
    if preds.is_empty() {
        return None;
    }
    Some(
        preds
            .iter()
            .map(|p| format!("'{}'", p.as_str()))
            .collect::<Vec<_>>()
            .join(", "),
    )
}
