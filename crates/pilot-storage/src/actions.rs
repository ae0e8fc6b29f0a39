use rusqlite::OptionalExtension;
use tracing::{info, warn};

use pilot_core::error::Result;
use pilot_core::types::{ActionId, ActionStatus, Timestamp};

use crate::records::{parse_column, ActionState, PendingAction};
use crate::store::{collect_rows, sql_err, Store};

impl Store {
    /// Persist a new action awaiting human sign-off.
    pub fn create_pending_action(&self, tool_name: &str, details: &str) -> Result<Option<ActionId>> {
        self.scoped(None, |conn, tenant| {
            conn.execute(
                "INSERT INTO pending_actions (tenant_id, tool_name, action_details, status, timestamp)
                 VALUES (?1, ?2, ?3, 'Pending', ?4)",
                rusqlite::params![tenant.0, tool_name, details, Timestamp::now().0],
            )
            .map_err(sql_err("Failed to create pending action"))?;
            let id = conn.last_insert_rowid();
            info!(tenant_id = tenant.0, action_id = id, tool_name, "Pending action created");
            Ok(Some(id))
        })
    }

    pub fn action_status(&self, id: ActionId) -> Result<Option<ActionState>> {
        self.scoped(None, |conn, tenant| {
            conn.query_row(
                "SELECT status, feedback FROM pending_actions WHERE id = ?1 AND tenant_id = ?2",
                rusqlite::params![id, tenant.0],
                |row| {
                    Ok(ActionState {
                        status: parse_column(row, 0)?,
                        feedback: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(sql_err("Failed to read action status"))
        })
    }

    /// Actions still awaiting a decision, newest first.
    pub fn pending_actions(&self) -> Result<Vec<PendingAction>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, tool_name, action_details, status, feedback, timestamp
                     FROM pending_actions
                     WHERE tenant_id = ?1 AND status = 'Pending'
                     ORDER BY timestamp DESC, id DESC",
                )
                .map_err(sql_err("Failed to prepare pending action query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], PendingAction::from_row)
                .map_err(sql_err("Failed to list pending actions"))?;
            collect_rows(rows, "Failed to read pending action")
        })
    }

    /// Record a human decision. Only a still-pending action can be resolved;
    /// returns whether this call made the decision.
    pub fn resolve_action(
        &self,
        id: ActionId,
        decision: ActionStatus,
        feedback: Option<&str>,
    ) -> Result<bool> {
        if decision == ActionStatus::Pending {
            warn!(action_id = id, "Ignoring resolution back to Pending");
            return Ok(false);
        }
        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    "UPDATE pending_actions SET status = ?1, feedback = ?2
                     WHERE id = ?3 AND tenant_id = ?4 AND status = 'Pending'",
                    rusqlite::params![decision.as_str(), feedback, id, tenant.0],
                )
                .map_err(sql_err("Failed to resolve action"))?;
            if changed > 0 {
                info!(tenant_id = tenant.0, action_id = id, %decision, "Action resolved");
            } else {
                warn!(action_id = id, %decision, "Action already resolved or not found");
            }
            Ok(changed > 0)
        })
    }
}
