//! Tenant-scoped access to the state store.
//!
//! A `Store` is bound to at most one tenant. Every entity operation filters
//! and stamps rows with that tenant's id. While unbound, reads return empty
//! results and writes do nothing, so callers without a signed-in tenant
//! degrade instead of failing.

use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use pilot_core::error::{PilotError, Result};
use pilot_core::types::TenantId;

use crate::db::Database;

#[derive(Debug, Clone)]
pub struct Store {
    db: Arc<Database>,
    tenant: Option<TenantId>,
}

impl Store {
    /// An unbound store.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db, tenant: None }
    }

    pub fn for_tenant(db: Arc<Database>, tenant: TenantId) -> Self {
        Self {
            db,
            tenant: Some(tenant),
        }
    }

    /// Bind (or rebind) this store to a tenant.
    pub fn bind(&mut self, tenant: TenantId) {
        self.tenant = Some(tenant);
    }

    /// A copy of this store bound to another tenant.
    pub fn with_tenant(&self, tenant: TenantId) -> Self {
        Self::for_tenant(Arc::clone(&self.db), tenant)
    }

    pub fn tenant(&self) -> Option<TenantId> {
        self.tenant
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Run `f` on a fresh connection with the bound tenant, or return `unbound` if none.
    pub(crate) fn scoped<T, F>(&self, unbound: T, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, TenantId) -> Result<T>,
    {
        match self.tenant {
            Some(tenant) => self.db.with_conn(|conn| f(conn, tenant)),
            None => {
                debug!("Store has no tenant bound; skipping operation");
                Ok(unbound)
            }
        }
    }

    /// Replace the bound tenant's API key.
    pub fn update_api_key(&self, api_key: &str) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            let changed = conn
                .execute(
                    "UPDATE tenants SET api_key = ?1 WHERE id = ?2",
                    rusqlite::params![api_key, tenant.0],
                )
                .map_err(sql_err("Failed to update API key"))?;
            Ok(changed > 0)
        })
    }

    /// The bound tenant's API key, if one was issued.
    pub fn api_key(&self) -> Result<Option<String>> {
        self.scoped(None, |conn, tenant| {
            let key: Option<Option<String>> = conn
                .query_row(
                    "SELECT api_key FROM tenants WHERE id = ?1",
                    rusqlite::params![tenant.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err("Failed to read API key"))?;
            Ok(key.flatten())
        })
    }
}

/// Map a rusqlite error into a storage error with context.
pub(crate) fn sql_err(context: &'static str) -> impl Fn(rusqlite::Error) -> PilotError {
    move |e| PilotError::Storage(format!("{}: {}", context, e))
}

/// Collect mapped rows, converting the first failure.
pub(crate) fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    context: &'static str,
) -> Result<Vec<T>> {
    rows.collect::<rusqlite::Result<Vec<T>>>()
        .map_err(sql_err(context))
}
