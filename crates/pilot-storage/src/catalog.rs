//! User-defined agents and tasks.

use rusqlite::OptionalExtension;
use tracing::info;

use pilot_core::error::Result;
use pilot_core::types::Timestamp;

use crate::records::{CustomAgent, CustomTask};
use crate::store::{collect_rows, sql_err, Store};

const AGENT_COLUMNS: &str = "name, role, goal, backstory, temperature, tools";

impl Store {
    /// Insert or replace an agent by name.
    pub fn save_agent(&self, agent: &CustomAgent) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            conn.execute(
                "INSERT INTO custom_agents (tenant_id, name, role, goal, backstory, temperature, tools)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (tenant_id, name) DO UPDATE
                 SET role = excluded.role, goal = excluded.goal, backstory = excluded.backstory,
                     temperature = excluded.temperature, tools = excluded.tools",
                rusqlite::params![
                    tenant.0,
                    agent.name,
                    agent.role,
                    agent.goal,
                    agent.backstory,
                    agent.temperature,
                    agent.tools_column(),
                ],
            )
            .map_err(sql_err("Failed to save agent"))?;
            info!(tenant_id = tenant.0, name = %agent.name, "Agent saved");
            Ok(true)
        })
    }

    pub fn agent(&self, name: &str) -> Result<Option<CustomAgent>> {
        self.scoped(None, |conn, tenant| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM custom_agents WHERE tenant_id = ?1 AND name = ?2",
                    AGENT_COLUMNS
                ),
                rusqlite::params![tenant.0, name],
                CustomAgent::from_row,
            )
            .optional()
            .map_err(sql_err("Failed to get agent"))
        })
    }

    /// All agents, newest first.
    pub fn all_agents(&self) -> Result<Vec<CustomAgent>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM custom_agents WHERE tenant_id = ?1 ORDER BY id DESC",
                    AGENT_COLUMNS
                ))
                .map_err(sql_err("Failed to prepare agent query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], CustomAgent::from_row)
                .map_err(sql_err("Failed to list agents"))?;
            collect_rows(rows, "Failed to read agent")
        })
    }

    pub fn delete_agent(&self, name: &str) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    "DELETE FROM custom_agents WHERE tenant_id = ?1 AND name = ?2",
                    rusqlite::params![tenant.0, name],
                )
                .map_err(sql_err("Failed to delete agent"))?;
            Ok(changed > 0)
        })
    }

    /// Insert or replace a task by name.
    pub fn save_task(&self, task: &CustomTask) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            conn.execute(
                "INSERT INTO custom_tasks (tenant_id, name, description, expected_output, agent_name, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (tenant_id, name) DO UPDATE
                 SET description = excluded.description,
                     expected_output = excluded.expected_output,
                     agent_name = excluded.agent_name,
                     timestamp = excluded.timestamp",
                rusqlite::params![
                    tenant.0,
                    task.name,
                    task.description,
                    task.expected_output,
                    task.agent_name,
                    Timestamp::now().0,
                ],
            )
            .map_err(sql_err("Failed to save task"))?;
            info!(tenant_id = tenant.0, name = %task.name, "Task saved");
            Ok(true)
        })
    }

    /// All tasks, newest first.
    pub fn all_tasks(&self) -> Result<Vec<CustomTask>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(
                    "SELECT name, description, expected_output, agent_name FROM custom_tasks
                     WHERE tenant_id = ?1 ORDER BY timestamp DESC, id DESC",
                )
                .map_err(sql_err("Failed to prepare task query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], |row| {
                    Ok(CustomTask {
                        name: row.get(0)?,
                        description: row.get(1)?,
                        expected_output: row.get(2)?,
                        agent_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    })
                })
                .map_err(sql_err("Failed to list tasks"))?;
            collect_rows(rows, "Failed to read task")
        })
    }

    pub fn delete_task(&self, name: &str) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    "DELETE FROM custom_tasks WHERE tenant_id = ?1 AND name = ?2",
                    rusqlite::params![tenant.0, name],
                )
                .map_err(sql_err("Failed to delete task"))?;
            Ok(changed > 0)
        })
    }
}
