use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Identifier of a tenant (a signed-up user). Every non-tenant row carries one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub i64);

impl TenantId {
    /// The tenant that adopts rows written before multi-tenancy existed.
    pub const BOOTSTRAP: TenantId = TenantId(1);
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row id of a pending action.
pub type ActionId = i64;

/// Row id of a lead.
pub type LeadId = i64;

// =============================================================================
// Enums
// =============================================================================

/// Lead lifecycle states. Transitions only move forward:
/// Pending -> Contacting -> Completed | Failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    Pending,
    Contacting,
    Completed,
    Failed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "Pending",
            LeadStatus::Contacting => "Contacting",
            LeadStatus::Completed => "Completed",
            LeadStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Completed | LeadStatus::Failed)
    }

    /// States a lead may hold immediately before entering `self`.
    pub fn predecessors(&self) -> &'static [LeadStatus] {
        match self {
            LeadStatus::Pending => &[],
            LeadStatus::Contacting => &[LeadStatus::Pending],
            LeadStatus::Completed | LeadStatus::Failed => &[LeadStatus::Contacting],
        }
    }

    pub fn can_advance_to(&self, next: LeadStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(LeadStatus::Pending),
            "Contacting" => Ok(LeadStatus::Contacting),
            "Completed" => Ok(LeadStatus::Completed),
            "Failed" => Ok(LeadStatus::Failed),
            _ => Err(format!("Unknown lead status: {}", s)),
        }
    }
}

/// Pending action states. Write-once: Pending -> Approved | Rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "Pending",
            ActionStatus::Approved => "Approved",
            ActionStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ActionStatus::Pending),
            "Approved" => Ok(ActionStatus::Approved),
            "Rejected" => Ok(ActionStatus::Rejected),
            _ => Err(format!("Unknown action status: {}", s)),
        }
    }
}

/// Kind of outbound communication attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Sms,
    Call,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Sms => write!(f, "sms"),
            CallKind::Call => write!(f, "call"),
        }
    }
}

impl std::str::FromStr for CallKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(CallKind::Sms),
            "call" => Ok(CallKind::Call),
            _ => Err(format!("Unknown call kind: {}", s)),
        }
    }
}

/// Capabilities that can be attached to a custom agent.
///
/// Stored as a comma-separated list of tags on the agent row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Telephony,
    SocialPost,
    MemoryStore,
    MemoryRecall,
    Email,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::Telephony,
        ToolKind::SocialPost,
        ToolKind::MemoryStore,
        ToolKind::MemoryRecall,
        ToolKind::Email,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ToolKind::Telephony => "telephony",
            ToolKind::SocialPost => "social_post",
            ToolKind::MemoryStore => "memory_store",
            ToolKind::MemoryRecall => "memory_recall",
            ToolKind::Email => "email",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s.trim())
            .ok_or_else(|| format!("Unknown tool kind: {}", s))
    }
}

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in seconds since epoch.
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S"))
    }
}

// =============================================================================
// Tests
// =============================================================================
