//! Metadata catalog: master file records and the deleted-slot ledger.
//!
//! Slot bounds are stored as TEXT in `master_file_record` so existing catalogs
//! stay readable. Every statement is parameterized.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use semstore_core::{FileRecord, Modality, SlotRange};

use crate::error::{Result, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS master_file_record (
    uuid TEXT PRIMARY KEY,
    file_path TEXT,
    file_type TEXT,
    faiss_start_index TEXT,
    faiss_end_index TEXT
);
CREATE TABLE IF NOT EXISTS deleted_ids (
    table_type TEXT,
    faiss_index INTEGER
);
";

const RECORD_COLUMNS: &str = "uuid, file_path, file_type, faiss_start_index, faiss_end_index";

type RawRecord = (String, String, String, String, String);

pub struct Catalog {
    conn: Connection,
    defer_writes: bool,
}

impl Catalog {
    /// Opens or creates the catalog at `path`.
    ///
    /// With `defer_writes` the first write opens a transaction that stays open
    /// until [`Catalog::flush`]; otherwise every write is durable on return.
    pub fn open(path: &Path, defer_writes: bool) -> Result<Self> {
        let connection_error = |source| StoreError::Connection { path: path.to_path_buf(), source };
        let conn = Connection::open(path).map_err(connection_error)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(connection_error)?;
        conn.execute_batch(SCHEMA).map_err(connection_error)?;
        Ok(Self { conn, defer_writes })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, defer_writes: false })
    }

    fn begin_deferred(&self) -> Result<()> {
        if self.defer_writes && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Holds every following write back until [`Catalog::flush`], whatever
    /// `defer_writes` says.
    pub fn begin_batch(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    pub fn has_pending_writes(&self) -> bool { !self.conn.is_autocommit() }

    pub fn insert_record(&mut self, record: &FileRecord) -> Result<()> {
        self.begin_deferred()?;
        self.conn.execute(
            &format!("INSERT INTO master_file_record ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                record.id,
                record.source,
                record.modality.as_str(),
                record.slot_range.start.to_string(),
                record.slot_range.end.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<FileRecord>> {
        let raw: Option<RawRecord> = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM master_file_record WHERE uuid = ?1"),
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .optional()?;
        raw.map(parse_record).transpose()
    }

    /// Records in insertion order, optionally restricted to one modality.
    pub fn records(&self, modality: Option<Modality>) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM master_file_record
             WHERE ?1 IS NULL OR file_type = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params![modality.map(|m| m.as_str())], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })?
            .collect::<rusqlite::Result<Vec<RawRecord>>>()?;
        rows.into_iter().map(parse_record).collect()
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM master_file_record", [], |r| r.get(0))?;
        usize::try_from(n).map_err(|_| StoreError::CorruptRecord(format!("negative record count {n}")))
    }

    /// Moves the record's slots into the ledger and removes its row.
    /// Returns the removed record, or `None` when `id` is unknown.
    pub fn delete_into_ledger(&mut self, id: &str) -> Result<Option<FileRecord>> {
        let Some(record) = self.get(id)? else { return Ok(None) };
        self.begin_deferred()?;
        let sp = self.conn.savepoint()?;
        {
            let mut stmt = sp.prepare("INSERT INTO deleted_ids (table_type, faiss_index) VALUES (?1, ?2)")?;
            for slot in record.slot_range.slots() {
                stmt.execute(params![record.modality.as_str(), to_sql_slot(slot)?])?;
            }
        }
        sp.execute("DELETE FROM master_file_record WHERE uuid = ?1", params![id])?;
        sp.commit()?;
        Ok(Some(record))
    }

    /// Ledgered slots of `modality` in the order they were recorded.
    pub fn ledger(&self, modality: Modality) -> Result<Vec<u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT faiss_index FROM deleted_ids WHERE table_type = ?1 ORDER BY rowid")?;
        let slots = stmt
            .query_map(params![modality.as_str()], |r| r.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        slots
            .into_iter()
            .map(|s| u64::try_from(s).map_err(|_| StoreError::CorruptRecord(format!("negative ledger slot {s}"))))
            .collect()
    }

    pub fn ledger_set(&self, modality: Modality) -> Result<HashSet<u64>> {
        Ok(self.ledger(modality)?.into_iter().collect())
    }

    /// Drops ledger entries once their slots have been compacted away.
    pub fn clear_ledger(&mut self, modality: Modality, slots: &[u64]) -> Result<usize> {
        self.begin_deferred()?;
        let sp = self.conn.savepoint()?;
        let mut cleared = 0;
        {
            let mut stmt = sp.prepare("DELETE FROM deleted_ids WHERE table_type = ?1 AND faiss_index = ?2")?;
            for &slot in slots {
                cleared += stmt.execute(params![modality.as_str(), to_sql_slot(slot)?])?;
            }
        }
        sp.commit()?;
        Ok(cleared)
    }

    /// Commits writes held back by `defer_writes`.
    pub fn flush(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }
}

fn parse_record((id, source, file_type, start, end): RawRecord) -> Result<FileRecord> {
    let modality: Modality = file_type
        .parse()
        .map_err(|_| StoreError::CorruptRecord(format!("record {id} has file_type {file_type:?}")))?;
    let bound = |value: &str| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| StoreError::CorruptRecord(format!("record {id} has slot bound {value:?}")))
    };
    let (start, end) = (bound(&start)?, bound(&end)?);
    if start > end {
        return Err(StoreError::CorruptRecord(format!("record {id} has inverted range {start}..{end}")));
    }
    Ok(FileRecord { id, source, modality, slot_range: SlotRange::new(start, end) })
}

fn to_sql_slot(slot: u64) -> Result<i64> {
    i64::try_from(slot).map_err(|_| StoreError::InvalidArgument(format!("slot {slot} exceeds SQLite integer range")))
}
