//! Pilot Storage crate - multi-tenant SQLite state store.
//!
//! Provides a WAL-mode SQLite database with self-repairing schema
//! initialization, a tenant directory, and a tenant-scoped `Store` covering
//! leads, pending actions, telephony logs, memory, agent catalog, and output
//! history.

pub mod actions;
pub mod catalog;
pub mod db;
pub mod leads;
pub mod memory;
pub mod migrations;
pub mod outputs;
pub mod records;
pub mod store;
pub mod telephony_log;
pub mod tenants;

pub use db::Database;
pub use records::{
    parse_tools, ActionState, AgentOutput, CustomAgent, CustomTask, Lead, MemoryEntry,
    NewAgentOutput, NewTelephonyLog, PendingAction, SocialPost, TelephonyLog, Tenant,
};
pub use store::Store;
pub use tenants::{generate_api_key, hash_secret, TenantDirectory};
