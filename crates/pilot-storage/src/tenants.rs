//! Tenant directory: signup, credential checks, and API key lookup.

use std::sync::Arc;

use rand::Rng;
use rusqlite::OptionalExtension;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use pilot_core::error::{PilotError, Result};
use pilot_core::types::{TenantId, Timestamp};

use crate::db::Database;
use crate::records::{read_timestamp, Tenant};

/// SHA-256 hex digest of a tenant secret.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Generate a random 32-character hex API key.
pub fn generate_api_key() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Lookup and creation of tenants. Not tenant-scoped itself.
#[derive(Debug, Clone)]
pub struct TenantDirectory {
    db: Arc<Database>,
}

impl TenantDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a tenant. Returns `None` when the name is already taken.
    pub fn create_tenant(&self, name: &str, secret: &str) -> Result<Option<Tenant>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PilotError::Storage("Tenant name must not be empty".to_string()));
        }

        self.db.with_conn(|conn| {
            let now = Timestamp::now();
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO tenants (name, secret_hash, api_key, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![name, hash_secret(secret), generate_api_key(), now.0],
                )
                .map_err(|e| PilotError::Storage(format!("Failed to create tenant: {}", e)))?;

            if inserted == 0 {
                warn!(name, "Tenant name already taken");
                return Ok(None);
            }

            let id = TenantId(conn.last_insert_rowid());
            info!(tenant_id = id.0, name, "Tenant created");
            Ok(Some(Tenant {
                id,
                name: name.to_string(),
                created_at: now,
            }))
        })
    }

    /// Check a name/secret pair.
    pub fn verify_tenant(&self, name: &str, secret: &str) -> Result<Option<Tenant>> {
        self.db.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT id, name, created_at, secret_hash FROM tenants WHERE name = ?1",
                    rusqlite::params![name.trim()],
                    |row| Ok((tenant_from_row(row)?, row.get::<_, String>(3)?)),
                )
                .optional()
                .map_err(|e| PilotError::Storage(format!("Failed to look up tenant: {}", e)))?;

            Ok(found.and_then(|(tenant, stored)| (stored == hash_secret(secret)).then_some(tenant)))
        })
    }

    /// Resolve an API key to its tenant.
    pub fn tenant_by_api_key(&self, api_key: &str) -> Result<Option<Tenant>> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Ok(None);
        }
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, created_at FROM tenants WHERE api_key = ?1",
                rusqlite::params![api_key],
                tenant_from_row,
            )
            .optional()
            .map_err(|e| PilotError::Storage(format!("Failed to look up API key: {}", e)))
        })
    }
}

fn tenant_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: TenantId(row.get(0)?),
        name: row.get(1)?,
        created_at: read_timestamp(row, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_directory() -> (tempfile::TempDir, TenantDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("tenants.db")).unwrap();
        (dir, TenantDirectory::new(Arc::new(db)))
    }

    #[test]
    fn test_hash_secret_is_sha256_hex() {
        assert_eq!(
            hash_secret("admin123"),
            "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9"
        );
    }

    #[test]
    fn test_generate_api_key_shape() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_create_tenant_rejects_duplicate_name() {
        let (_dir, tenants) = test_directory();
        let ops = tenants.create_tenant("ops", "s3cret").unwrap().unwrap();
        assert_ne!(ops.id, TenantId::BOOTSTRAP);
        assert!(tenants.create_tenant("ops", "other").unwrap().is_none());
        assert!(tenants.create_tenant("   ", "x").is_err());
    }

    #[test]
    fn test_verify_tenant() {
        let (_dir, tenants) = test_directory();
        let ops = tenants.create_tenant("ops", "s3cret").unwrap().unwrap();

        assert_eq!(tenants.verify_tenant("ops", "s3cret").unwrap(), Some(ops));
        assert!(tenants.verify_tenant("ops", "wrong").unwrap().is_none());
        assert!(tenants.verify_tenant("nobody", "s3cret").unwrap().is_none());
    }

    #[test]
    fn test_bootstrap_admin_can_sign_in() {
        let (_dir, tenants) = test_directory();
        let admin = tenants.verify_tenant("admin", "admin123").unwrap().unwrap();
        assert_eq!(admin.id, TenantId::BOOTSTRAP);
    }

    #[test]
    fn test_tenant_by_api_key() {
        let (dir, tenants) = test_directory();
        let ops = tenants.create_tenant("ops", "s3cret").unwrap().unwrap();

        let db = Database::open(&dir.path().join("tenants.db")).unwrap();
        let key: String = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT api_key FROM tenants WHERE id = ?1",
                    rusqlite::params![ops.id.0],
                    |row| row.get(0),
                )
                .map_err(|e| PilotError::Storage(e.to_string()))
            })
            .unwrap();

        assert_eq!(tenants.tenant_by_api_key(&key).unwrap(), Some(ops));
        assert!(tenants.tenant_by_api_key("deadbeef").unwrap().is_none());
        assert!(tenants.tenant_by_api_key("").unwrap().is_none());
    }
}
