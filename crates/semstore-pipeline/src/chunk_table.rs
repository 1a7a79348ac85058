//! Pipeline-local chunk metadata: which file and snippet each slot belongs to.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use semstore_core::{ChunkPayload, Modality};

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow {
    pub slot: u64,
    pub file_id: String,
    pub source: String,
    pub payload: ChunkPayload,
}

/// One `<modality>_chunks` table; the name comes from the closed `Modality` set.
pub struct ChunkTable {
    conn: Connection,
    table: &'static str,
}

fn table_name(modality: Modality) -> &'static str {
    match modality {
        Modality::Text => "text_chunks",
        Modality::Image => "image_chunks",
        Modality::Audio => "audio_chunks",
    }
}

impl ChunkTable {
    pub fn open(db_path: &Path, modality: Modality) -> Result<Self> {
        let conn = Connection::open(db_path).with_context(|| format!("open chunk db {}", db_path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn, modality)
    }

    pub fn in_memory(modality: Modality) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, modality)
    }

    fn with_connection(conn: Connection, modality: Modality) -> Result<Self> {
        let table = table_name(modality);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                faiss_index INTEGER PRIMARY KEY,
                uuid TEXT NOT NULL,
                file_path TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {table}_uuid ON {table}(uuid);"
        ))?;
        Ok(Self { conn, table })
    }

    /// Writes one row per payload at consecutive slots starting from `first_slot`.
    pub fn insert_chunks(&mut self, file_id: &str, source: &str, first_slot: u64, payloads: &[ChunkPayload]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (faiss_index, uuid, file_path, payload) VALUES (?1, ?2, ?3, ?4)",
                self.table
            ))?;
            for (offset, payload) in payloads.iter().enumerate() {
                let slot = to_sql_slot(first_slot + offset as u64)?;
                stmt.execute(params![slot, file_id, source, serde_json::to_string(payload)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Rows for the requested slots; slots without a row are absent from the map.
    pub fn lookup(&self, slots: &[u64]) -> Result<HashMap<u64, ChunkRow>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT uuid, file_path, payload FROM {} WHERE faiss_index = ?1",
            self.table
        ))?;
        let mut rows = HashMap::with_capacity(slots.len());
        for &slot in slots {
            let found: Option<(String, String, String)> = stmt
                .query_row(params![to_sql_slot(slot)?], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
                .optional()?;
            if let Some((file_id, source, payload)) = found {
                let payload: ChunkPayload = serde_json::from_str(&payload)
                    .with_context(|| format!("decode payload of {} slot {}", self.table, slot))?;
                rows.insert(slot, ChunkRow { slot, file_id, source, payload });
            }
        }
        Ok(rows)
    }

    pub fn remove(&mut self, slots: &[u64]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM {} WHERE faiss_index = ?1", self.table))?;
            for &slot in slots { removed += stmt.execute(params![to_sql_slot(slot)?])?; }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Deletes rows whose slot is not in `live`; returns the removed slots.
    pub fn prune_missing(&mut self, live: &HashSet<u64>) -> Result<Vec<u64>> {
        let stale: Vec<u64> = {
            let mut stmt = self.conn.prepare(&format!("SELECT faiss_index FROM {}", self.table))?;
            let slots = stmt.query_map([], |r| r.get::<_, i64>(0))?.collect::<rusqlite::Result<Vec<i64>>>()?;
            slots.into_iter().filter_map(|s| u64::try_from(s).ok()).filter(|s| !live.contains(s)).collect()
        };
        if !stale.is_empty() { self.remove(&stale)?; }
        Ok(stale)
    }

    pub fn len(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |r| r.get(0))?;
        Ok(usize::try_from(n)?)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }
}

fn to_sql_slot(slot: u64) -> Result<i64> {
    i64::try_from(slot).with_context(|| format!("slot {slot} exceeds SQLite integer range"))
}
