//! Crew output history and social post drafts.

use tracing::info;

use pilot_core::error::Result;
use pilot_core::types::Timestamp;

use crate::records::{AgentOutput, NewAgentOutput, SocialPost};
use crate::store::{collect_rows, sql_err, Store};

impl Store {
    pub fn log_agent_output(&self, entry: &NewAgentOutput<'_>) -> Result<Option<i64>> {
        let metadata = entry.metadata.map(serde_json::to_string).transpose()?;
        self.scoped(None, |conn, tenant| {
            conn.execute(
                "INSERT INTO agent_outputs
                    (tenant_id, crew_name, output, status, execution_time, metadata, tokens_used, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    tenant.0,
                    entry.crew_name,
                    entry.output,
                    entry.status,
                    entry.execution_time,
                    metadata,
                    entry.tokens_used,
                    Timestamp::now().0,
                ],
            )
            .map_err(sql_err("Failed to log agent output"))?;
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    /// Output history, newest first.
    pub fn all_agent_outputs(&self) -> Result<Vec<AgentOutput>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, crew_name, output, status, execution_time, metadata, tokens_used, timestamp
                     FROM agent_outputs WHERE tenant_id = ?1
                     ORDER BY timestamp DESC, id DESC",
                )
                .map_err(sql_err("Failed to prepare output query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], AgentOutput::from_row)
                .map_err(sql_err("Failed to list agent outputs"))?;
            collect_rows(rows, "Failed to read agent output")
        })
    }

    pub fn save_social_post(&self, platform: &str, topic: &str, content: &str) -> Result<Option<i64>> {
        self.scoped(None, |conn, tenant| {
            conn.execute(
                "INSERT INTO social_posts (tenant_id, platform, topic, content, status, timestamp)
                 VALUES (?1, ?2, ?3, ?4, 'Pending', ?5)",
                rusqlite::params![tenant.0, platform, topic, content, Timestamp::now().0],
            )
            .map_err(sql_err("Failed to save social post"))?;
            let id = conn.last_insert_rowid();
            info!(tenant_id = tenant.0, post_id = id, platform, "Social post drafted");
            Ok(Some(id))
        })
    }

    /// Drafts still awaiting review, newest first.
    pub fn pending_social_posts(&self) -> Result<Vec<SocialPost>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, platform, topic, content, status, timestamp FROM social_posts
                     WHERE tenant_id = ?1 AND status = 'Pending'
                     ORDER BY timestamp DESC, id DESC",
                )
                .map_err(sql_err("Failed to prepare social post query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], SocialPost::from_row)
                .map_err(sql_err("Failed to list social posts"))?;
            collect_rows(rows, "Failed to read social post")
        })
    }

    /// Edit a draft's content and set its status.
    pub fn update_social_post(&self, id: i64, content: &str, status: &str) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    "UPDATE social_posts SET content = ?1, status = ?2 WHERE id = ?3 AND tenant_id = ?4",
                    rusqlite::params![content, status, id, tenant.0],
                )
                .map_err(sql_err("Failed to update social post"))?;
            Ok(changed > 0)
        })
    }
}
