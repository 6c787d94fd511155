//! SQLite-backed record store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::debug;

use super::{RecordStore, RoutingGroup, StoreError};
use crate::reading::SourceRecord;

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite record store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS prepaidData (
                idpel TEXT PRIMARY KEY,
                nama TEXT,
                tarif TEXT,
                daya TEXT,
                kdrbm TEXT,
                blth TEXT,
                merk_meter TEXT,
                nomor_meter TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_prepaid_kdrbm ON prepaidData(kdrbm);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SourceRecord> {
        Ok(SourceRecord {
            idpel: row.get(0)?,
            nama: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            tarif: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            daya: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            kdrbm: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            blth: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            merk_meter: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            nomor_meter: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn replace_all(&self, records: &[SourceRecord]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        // Dropping the transaction without commit rolls it back.
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM prepaidData", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO prepaidData (idpel, nama, tarif, daya, kdrbm, blth, merk_meter, nomor_meter)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.idpel,
                    record.nama,
                    record.tarif,
                    record.daya,
                    record.kdrbm,
                    record.blth,
                    record.merk_meter,
                    record.nomor_meter,
                ])
                .map_err(|e| {
                    StoreError::Database(format!("insert failed for idpel {}: {}", record.idpel, e))
                })?;
            }
        }
        tx.commit()?;

        debug!(records = records.len(), "Replaced stored records");
        Ok(())
    }

    fn routing_groups(&self) -> Result<Vec<RoutingGroup>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT kdrbm, COUNT(*) FROM prepaidData GROUP BY kdrbm ORDER BY kdrbm",
        )?;
        let groups = stmt
            .query_map([], |row| {
                Ok(RoutingGroup {
                    code: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    count: row.get::<_, i64>(1)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn records_by_routing_code(&self, code: &str) -> Result<Vec<SourceRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT idpel, nama, tarif, daya, kdrbm, blth, merk_meter, nomor_meter
             FROM prepaidData WHERE kdrbm = ? ORDER BY rowid",
        )?;
        let records = stmt
            .query_map(params![code], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn remove(&self, idpel: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM prepaidData WHERE idpel = ?", params![idpel])?;
        Ok(removed > 0)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM prepaidData", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
