use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "boletim.sqlite3";
/// Slot holding the student collection as a JSON array.
pub const STUDENTS_SLOT: &str = "students";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    open_db_at(&workspace.join(DB_FILE_NAME))
}

/// Opens (or creates) a database file at an explicit path.
pub fn open_db_at(db_path: &Path) -> anyhow::Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_slots(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    Ok(conn)
}

pub fn slot_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let v = conn
        .query_row(
            "SELECT value_json FROM kv_slots WHERE key = ?",
            [key],
            |r| r.get::<_, String>(0),
        )
        .optional()?;
    Ok(v)
}

pub fn slot_set(conn: &Connection, key: &str, value_json: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO kv_slots(key, value_json, updated_at)
         VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
         ON CONFLICT(key) DO UPDATE SET
           value_json = excluded.value_json,
           updated_at = excluded.updated_at",
        (key, value_json),
    )?;
    Ok(())
}
