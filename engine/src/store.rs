//! SQLite-backed reconciliation state store.
//!
//! Durable record of last-applied state per resource, surviving
//! process restarts so an interrupted run can resume without
//! double-creating resources. One row per resource name; writes go
//! through a mutexed connection, so there is never more than one
//! in-flight write per id.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use stratus_decl::{Declaration, SpecHash};
use stratus_id::ResourceName;
use stratus_provider::Outputs;
use thiserror::Error;
use tracing::debug;

/// Errors from state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A persisted row cannot be decoded.
    #[error("corrupt record for '{resource}': {detail}")]
    Corrupt { resource: String, detail: String },
}

/// Durable last-known state of one resource.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReconciliationRecord {
    /// Declared resource name.
    pub resource: ResourceName,

    /// Provider adapter kind.
    pub kind: String,

    /// Hash of the last applied declaration.
    pub spec_hash: SpecHash,

    /// Provider-side identifier.
    pub provider_id: String,

    /// Outputs recorded at last apply.
    pub outputs: Outputs,

    /// Dependency names at last apply; drives orphan teardown order.
    pub dependencies: Vec<ResourceName>,

    /// Unix timestamp of the last write.
    pub updated_at: i64,
}

/// SQLite state store.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open or create a state store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL mode for durability under concurrent readers
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().unwrap().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                resource TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                spec_hash TEXT NOT NULL,
                provider_id TEXT NOT NULL,
                outputs TEXT NOT NULL,
                dependencies TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        debug!("State store schema initialized");
        Ok(())
    }

    /// Load every record, keyed by resource name.
    pub fn load_all(&self) -> Result<BTreeMap<ResourceName, ReconciliationRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT resource, kind, spec_hash, provider_id, outputs, dependencies, updated_at
             FROM records ORDER BY resource",
        )?;

        let rows = stmt
            .query_map([], row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = BTreeMap::new();
        for raw in rows {
            let record = raw.decode()?;
            out.insert(record.resource.clone(), record);
        }
        Ok(out)
    }

    /// Get one record.
    pub fn get(&self, resource: &ResourceName) -> Result<Option<ReconciliationRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT resource, kind, spec_hash, provider_id, outputs, dependencies, updated_at
             FROM records WHERE resource = ?1",
        )?;

        let raw = stmt
            .query_row(params![resource.as_str()], row_to_raw)
            .optional()?;

        raw.map(RawRecord::decode).transpose()
    }

    /// Insert or update a record.
    pub fn save(&self, record: &ReconciliationRecord) -> Result<(), StoreError> {
        let outputs = serde_json::to_string(&record.outputs).map_err(|e| StoreError::Corrupt {
            resource: record.resource.to_string(),
            detail: e.to_string(),
        })?;
        let dependencies =
            serde_json::to_string(&record.dependencies).map_err(|e| StoreError::Corrupt {
                resource: record.resource.to_string(),
                detail: e.to_string(),
            })?;

        self.conn.lock().unwrap().execute(
            r#"
            INSERT INTO records (resource, kind, spec_hash, provider_id, outputs, dependencies, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(resource) DO UPDATE SET
                kind = excluded.kind,
                spec_hash = excluded.spec_hash,
                provider_id = excluded.provider_id,
                outputs = excluded.outputs,
                dependencies = excluded.dependencies,
                updated_at = excluded.updated_at
            "#,
            params![
                record.resource.as_str(),
                record.kind,
                record.spec_hash.as_str(),
                record.provider_id,
                outputs,
                dependencies,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Remove a record after successful teardown.
    pub fn delete(&self, resource: &ResourceName) -> Result<(), StoreError> {
        self.conn.lock().unwrap().execute(
            "DELETE FROM records WHERE resource = ?1",
            params![resource.as_str()],
        )?;
        Ok(())
    }

    /// Records present in the store but absent from the declaration:
    /// resources no longer declared, due for teardown.
    pub fn orphans(&self, decl: &Declaration) -> Result<Vec<ReconciliationRecord>, StoreError> {
        Ok(self
            .load_all()?
            .into_values()
            .filter(|r| !decl.contains(&r.resource))
            .collect())
    }
}

/// Row as stored, before JSON columns are decoded.
struct RawRecord {
    resource: String,
    kind: String,
    spec_hash: String,
    provider_id: String,
    outputs: String,
    dependencies: String,
    updated_at: i64,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        resource: row.get(0)?,
        kind: row.get(1)?,
        spec_hash: row.get(2)?,
        provider_id: row.get(3)?,
        outputs: row.get(4)?,
        dependencies: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl RawRecord {
    fn decode(self) -> Result<ReconciliationRecord, StoreError> {
        let corrupt = |detail: String| StoreError::Corrupt {
            resource: self.resource.clone(),
            detail,
        };

        let resource = ResourceName::parse(&self.resource).map_err(|e| corrupt(e.to_string()))?;
        let outputs: Outputs =
            serde_json::from_str(&self.outputs).map_err(|e| corrupt(e.to_string()))?;
        let dependencies: Vec<ResourceName> =
            serde_json::from_str(&self.dependencies).map_err(|e| corrupt(e.to_string()))?;

        Ok(ReconciliationRecord {
            resource,
            kind: self.kind,
            spec_hash: SpecHash::from_stored(self.spec_hash),
            provider_id: self.provider_id,
            outputs,
            dependencies,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_decl::{ResolveConflicts, ResourceDecl};

    fn name(s: &str) -> ResourceName {
        ResourceName::parse(s).unwrap()
    }

    fn record(n: &str) -> ReconciliationRecord {
        ReconciliationRecord {
            resource: name(n),
            kind: "iam-role".to_string(),
            spec_hash: SpecHash::from_json(&serde_json::json!({"n": n})),
            provider_id: format!("sim/iam-role/{n}"),
            outputs: Outputs::from([("arn".to_string(), serde_json::json!("arn:x"))]),
            dependencies: vec![],
            updated_at: 1000,
        }
    }

    #[test]
    fn test_save_get_delete_roundtrip() {
        let store = StateStore::open_in_memory().unwrap();

        let rec = record("roleA");
        store.save(&rec).unwrap();

        let fetched = store.get(&name("roleA")).unwrap().unwrap();
        assert_eq!(fetched.provider_id, rec.provider_id);
        assert_eq!(fetched.spec_hash, rec.spec_hash);
        assert_eq!(fetched.outputs, rec.outputs);

        store.delete(&name("roleA")).unwrap();
        assert!(store.get(&name("roleA")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces() {
        let store = StateStore::open_in_memory().unwrap();
        let mut rec = record("roleA");
        store.save(&rec).unwrap();

        rec.provider_id = "sim/iam-role/changed".to_string();
        store.save(&rec).unwrap();

        let fetched = store.get(&name("roleA")).unwrap().unwrap();
        assert_eq!(fetched.provider_id, "sim/iam-role/changed");
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_orphan_detection() {
        let store = StateStore::open_in_memory().unwrap();
        store.save(&record("roleA")).unwrap();
        store.save(&record("gone")).unwrap();

        let decl = Declaration::new(
            "s",
            vec![ResourceDecl {
                name: name("roleA"),
                kind: "iam-role".to_string(),
                properties: serde_json::json!({}),
                depends_on: vec![],
                resolve_conflicts: ResolveConflicts::default(),
                timeout_secs: None,
            }],
        )
        .unwrap();

        let orphans = store.orphans(&decl).unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].resource, name("gone"));
    }

    #[test]
    fn test_durable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = StateStore::open(&path).unwrap();
            store.save(&record("roleA")).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        assert!(store.get(&name("roleA")).unwrap().is_some());
    }
}
