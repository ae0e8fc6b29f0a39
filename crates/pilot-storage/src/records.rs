//! Row types returned by the store, and the column readers they share.

use chrono::NaiveDateTime;
use rusqlite::types::{Type, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use tracing::warn;

use pilot_core::types::{
    ActionId, ActionStatus, CallKind, LeadId, LeadStatus, TenantId, Timestamp, ToolKind,
};

/// A signed-up tenant. The credential hash never leaves the storage crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub status: LeadStatus,
    pub research_summary: Option<String>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Lead {
    pub(crate) const COLUMNS: &'static str = "id, name, phone, email, status, research_summary, \
         attempts, last_error, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            phone: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            email: row.get(3)?,
            status: parse_column(row, 4)?,
            research_summary: row.get(5)?,
            attempts: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
            last_error: row.get(7)?,
            created_at: read_timestamp(row, 8)?,
            updated_at: read_timestamp(row, 9)?,
        })
    }
}

/// Current decision on a pending action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionState {
    pub status: ActionStatus,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    pub tool_name: String,
    pub action_details: String,
    pub status: ActionStatus,
    pub feedback: Option<String>,
    pub created_at: Timestamp,
}

impl PendingAction {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tool_name: row.get(1)?,
            action_details: row.get(2)?,
            status: parse_column(row, 3)?,
            feedback: row.get(4)?,
            created_at: read_timestamp(row, 5)?,
        })
    }
}

/// One outbound attempt to append to the telephony log.
#[derive(Debug, Clone)]
pub struct NewTelephonyLog<'a> {
    pub lead_id: Option<LeadId>,
    pub provider: &'a str,
    pub sid: Option<&'a str>,
    pub kind: CallKind,
    pub result: &'a str,
}

/// A telephony log row, joined with the lead it targeted when that lead still exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelephonyLog {
    pub id: i64,
    pub lead_id: Option<LeadId>,
    pub lead_name: Option<String>,
    pub lead_phone: Option<String>,
    pub provider: String,
    pub sid: Option<String>,
    pub kind: CallKind,
    pub result: Option<String>,
    pub transcript: Option<String>,
    pub created_at: Timestamp,
}

impl TelephonyLog {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            lead_id: row.get(1)?,
            lead_name: row.get(2)?,
            lead_phone: row.get(3)?,
            provider: row.get(4)?,
            sid: row.get(5)?,
            kind: parse_column(row, 6)?,
            result: row.get(7)?,
            transcript: row.get(8)?,
            created_at: read_timestamp(row, 9)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
    pub updated_at: Timestamp,
}

/// A user-defined agent persona. Unique by name within a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAgent {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub temperature: f64,
    pub tools: Vec<ToolKind>,
}

impl CustomAgent {
    pub fn new(name: &str, role: &str, goal: &str, backstory: &str) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: backstory.to_string(),
            temperature: 0.7,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: &[ToolKind]) -> Self {
        self.tools = tools.to_vec();
        self
    }

    pub(crate) fn tools_column(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.tag())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tools: Option<String> = row.get(5)?;
        Ok(Self {
            name: row.get(0)?,
            role: row.get(1)?,
            goal: row.get(2)?,
            backstory: row.get(3)?,
            temperature: row.get::<_, Option<f64>>(4)?.unwrap_or(0.7),
            tools: parse_tools(tools.as_deref().unwrap_or_default()),
        })
    }
}

/// Parse a comma-separated tool list. Unknown tags are logged and skipped.
pub fn parse_tools(raw: &str) -> Vec<ToolKind> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter_map(|tag| match tag.parse::<ToolKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                warn!(tag, "Skipping unknown tool tag");
                None
            }
        })
        .collect()
}

/// A user-defined task template. Unique by name within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTask {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    pub agent_name: String,
}

/// A crew run result to append to the output history.
#[derive(Debug, Clone)]
pub struct NewAgentOutput<'a> {
    pub crew_name: &'a str,
    pub output: &'a str,
    pub status: &'a str,
    pub execution_time: Option<f64>,
    pub metadata: Option<&'a serde_json::Value>,
    pub tokens_used: Option<i64>,
}

impl<'a> NewAgentOutput<'a> {
    pub fn success(crew_name: &'a str, output: &'a str) -> Self {
        Self {
            crew_name,
            output,
            status: "Success",
            execution_time: None,
            metadata: None,
            tokens_used: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub id: i64,
    pub crew_name: String,
    pub output: String,
    pub status: String,
    pub execution_time: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub tokens_used: Option<i64>,
    pub created_at: Timestamp,
}

impl AgentOutput {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let metadata: Option<String> = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            crew_name: row.get(1)?,
            output: row.get(2)?,
            status: row
                .get::<_, Option<String>>(3)?
                .unwrap_or_else(|| "Success".to_string()),
            execution_time: row.get(4)?,
            // Free-form metadata; anything that is not JSON is dropped.
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
            tokens_used: row.get(6)?,
            created_at: read_timestamp(row, 7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: i64,
    pub platform: String,
    pub topic: String,
    pub content: String,
    pub status: String,
    pub created_at: Timestamp,
}

impl SocialPost {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            platform: row.get(1)?,
            topic: row.get(2)?,
            content: row.get(3)?,
            status: row.get(4)?,
            created_at: read_timestamp(row, 5)?,
        })
    }
}

/// Parse a text column through `FromStr`, surfacing bad values as conversion errors.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Read a timestamp column written either as unix seconds or as legacy `DATETIME` text.
pub(crate) fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(secs) => Timestamp(secs),
        ValueRef::Real(secs) => Timestamp(secs as i64),
        ValueRef::Text(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok())
            .map(|dt| Timestamp(dt.and_utc().timestamp()))
            .unwrap_or(Timestamp(0)),
        ValueRef::Null | ValueRef::Blob(_) => Timestamp(0),
    })
}
