//! Persistence port for the student collection.
//!
//! The whole collection lives in a single key-value slot as a JSON array, so
//! every save rewrites the slot and every load reads it back in one go.

use crate::db::{self, STUDENTS_SLOT};
use crate::model::StudentRecord;
use anyhow::Context;
use rusqlite::Connection;

pub trait SlotStorage {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> anyhow::Result<Option<Vec<StudentRecord>>>;
    fn save(&mut self, records: &[StudentRecord]) -> anyhow::Result<()>;
}

pub fn decode_records(json: &str) -> anyhow::Result<Vec<StudentRecord>> {
    let v: Option<Vec<StudentRecord>> =
        serde_json::from_str(json).context("stored students are not a valid record list")?;
    Ok(v.unwrap_or_default())
}

pub fn encode_records(records: &[StudentRecord]) -> anyhow::Result<String> {
    serde_json::to_string(records).context("failed to serialize students")
}

/// Slot storage backed by the workspace database.
pub struct SqliteSlotStorage {
    conn: Connection,
}

impl SqliteSlotStorage {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl SlotStorage for SqliteSlotStorage {
    fn load(&self) -> anyhow::Result<Option<Vec<StudentRecord>>> {
        let Some(raw) = db::slot_get(&self.conn, STUDENTS_SLOT)? else {
            return Ok(None);
        };
        decode_records(&raw).map(Some)
    }

    fn save(&mut self, records: &[StudentRecord]) -> anyhow::Result<()> {
        let json = encode_records(records)?;
        db::slot_set(&self.conn, STUDENTS_SLOT, &json)
            .with_context(|| format!("failed to write slot {STUDENTS_SLOT}"))
    }
}

/// In-memory slot used by unit tests. Keeps the serialized text so loads go
/// through the same decoding as the database slot.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    pub payload: Option<String>,
    pub fail_writes: bool,
    pub save_count: usize,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn with_payload(payload: &str) -> Self {
        Self {
            payload: Some(payload.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl SlotStorage for MemoryStorage {
    fn load(&self) -> anyhow::Result<Option<Vec<StudentRecord>>> {
        match self.payload.as_deref() {
            Some(raw) => decode_records(raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, records: &[StudentRecord]) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("storage is read-only");
        }
        self.payload = Some(encode_records(records)?);
        self.save_count += 1;
        Ok(())
    }
}
