use rusqlite::OptionalExtension;
use tracing::debug;

use pilot_core::error::Result;
use pilot_core::types::Timestamp;

use crate::records::{read_timestamp, MemoryEntry};
use crate::store::{collect_rows, sql_err, Store};

impl Store {
    /// Insert or overwrite a memory value.
    pub fn save_memory(&self, key: &str, value: &str) -> Result<bool> {
        self.scoped(false, |conn, tenant| {
            conn.execute(
                "INSERT INTO agent_memory (tenant_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (tenant_id, key) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![tenant.0, key, value, Timestamp::now().0],
            )
            .map_err(sql_err("Failed to save memory"))?;
            debug!(tenant_id = tenant.0, key, "Memory saved");
            Ok(true)
        })
    }

    pub fn recall_memory(&self, key: &str) -> Result<Option<String>> {
        self.scoped(None, |conn, tenant| {
            conn.query_row(
                "SELECT value FROM agent_memory WHERE tenant_id = ?1 AND key = ?2",
                rusqlite::params![tenant.0, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err("Failed to recall memory"))
        })
    }

    /// Every memory entry, most recently updated first.
    pub fn all_memories(&self) -> Result<Vec<MemoryEntry>> {
        self.scoped(Vec::new(), |conn, tenant| {
            let mut stmt = conn
                .prepare(
                    "SELECT key, value, updated_at FROM agent_memory
                     WHERE tenant_id = ?1
                     ORDER BY updated_at DESC, key ASC",
                )
                .map_err(sql_err("Failed to prepare memory query"))?;
            let rows = stmt
                .query_map(rusqlite::params![tenant.0], |row| {
                    Ok(MemoryEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: read_timestamp(row, 2)?,
                    })
                })
                .map_err(sql_err("Failed to list memories"))?;
            collect_rows(rows, "Failed to read memory")
        })
    }
}

#[cfg(test)]
mod tests {
    use pilot_core::types::TenantId;

    use crate::store::test_support::temp_db;

    use super::*;

    #[test]
    fn test_save_memory_upserts() {
        let (_dir, db) = temp_db();
        let store = Store::for_tenant(db, TenantId(2));

        assert!(store.save_memory("tone", "formal").unwrap());
        assert!(store.save_memory("tone", "friendly").unwrap());

        assert_eq!(store.recall_memory("tone").unwrap().as_deref(), Some("friendly"));
        assert_eq!(store.all_memories().unwrap().len(), 1);
        assert!(store.recall_memory("missing").unwrap().is_none());
    }

    #[test]
    fn test_same_key_different_tenants() {
        let (_dir, db) = temp_db();
        let a = Store::for_tenant(db.clone(), TenantId(2));
        let b = Store::for_tenant(db, TenantId(3));

        a.save_memory("tone", "formal").unwrap();
        b.save_memory("tone", "casual").unwrap();

        assert_eq!(a.recall_memory("tone").unwrap().as_deref(), Some("formal"));
        assert_eq!(b.recall_memory("tone").unwrap().as_deref(), Some("casual"));
    }

    #[test]
    fn test_unbound_memory() {
        let (_dir, db) = temp_db();
        let store = Store::new(db);
        assert!(!store.save_memory("k", "v").unwrap());
        assert!(store.recall_memory("k").unwrap().is_none());
        assert!(store.all_memories().unwrap().is_empty());
    }
}
