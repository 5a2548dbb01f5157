//! Workspace bundles.
//!
//! A bundle is a zip with three entries: `manifest.json`, the SQLite database
//! and `students.json`, a readable copy of the students slot. Import prefers
//! the database entry. A bundle carrying only `students.json` (hand-edited or
//! produced by another tool) is rebuilt into a fresh database. A plain SQLite
//! file is accepted too and copied as-is.

use crate::db::{self, DB_FILE_NAME, STUDENTS_SLOT};
use anyhow::{bail, Context};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/boletim.sqlite3";
const STUDENTS_ENTRY: &str = "students.json";
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

pub const BUNDLE_FORMAT_V1: &str = "boletim-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    #[serde(default)]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exported_at: Option<String>,
    /// Absent in hand-made bundles; verified only when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    student_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
    pub student_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoredFrom {
    Database,
    StudentsJson,
    RawSqlite,
}

impl RestoredFrom {
    pub fn as_str(self) -> &'static str {
        match self {
            RestoredFrom::Database => "database",
            RestoredFrom::StudentsJson => "studentsJson",
            RestoredFrom::RawSqlite => "rawSqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub restored_from: RestoredFrom,
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        bail!("workspace database not found: {}", db_path.display());
    }

    let (students_json, student_count) = students_snapshot(&db_path)?;
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.display()))?;
    let db_sha256 = sha256_hex(&db_bytes);

    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        version: 1,
        app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        exported_at: Some(chrono::Utc::now().to_rfc3339()),
        db_sha256: Some(db_sha256.clone()),
        student_count: Some(student_count),
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("failed to serialize manifest")?;

    let entries: [(&str, &[u8]); 3] = [
        (MANIFEST_ENTRY, manifest_bytes.as_slice()),
        (DB_ENTRY, db_bytes.as_slice()),
        (STUDENTS_ENTRY, students_json.as_bytes()),
    ];
    write_zip(out_path, &entries)?;

    Ok(ExportSummary {
        bundle_format: manifest.format,
        entry_count: entries.len(),
        db_sha256,
        student_count,
    })
}

/// Replaces the workspace database with the contents of `in_path`. The
/// current database is only touched once the replacement is fully staged.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create workspace {}", workspace_path.display()))?;
    let dst = workspace_path.join(DB_FILE_NAME);

    if !is_zip_file(in_path)? {
        std::fs::copy(in_path, &dst).with_context(|| {
            format!(
                "failed to copy sqlite backup from {} to {}",
                in_path.display(),
                dst.display()
            )
        })?;
        return Ok(ImportSummary {
            bundle_format_detected: RAW_SQLITE_FORMAT.to_string(),
            restored_from: RestoredFrom::RawSqlite,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let Some(manifest_bytes) = read_entry(&mut archive, MANIFEST_ENTRY)? else {
        bail!("bundle missing {MANIFEST_ENTRY}");
    };
    let manifest: Manifest =
        serde_json::from_slice(&manifest_bytes).context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let staged = workspace_path.join(format!("{DB_FILE_NAME}.importing"));
    if staged.exists() {
        let _ = std::fs::remove_file(&staged);
    }
    let restored_from = match stage_database(&mut archive, &manifest, &staged) {
        Ok(v) => v,
        Err(e) => {
            let _ = std::fs::remove_file(&staged);
            return Err(e);
        }
    };

    if dst.exists() {
        std::fs::remove_file(&dst)
            .with_context(|| format!("failed to remove existing database {}", dst.display()))?;
    }
    std::fs::rename(&staged, &dst)
        .with_context(|| format!("failed to move staged database to {}", dst.display()))?;

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
        restored_from,
    })
}

/// Writes the replacement database to `staged`, from the database entry when
/// the bundle has one and from `students.json` otherwise.
fn stage_database<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    manifest: &Manifest,
    staged: &Path,
) -> anyhow::Result<RestoredFrom> {
    if let Some(db_bytes) = read_entry(archive, DB_ENTRY)? {
        if let Some(expected) = manifest.db_sha256.as_deref() {
            let actual = sha256_hex(&db_bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                bail!("database checksum mismatch: manifest {expected}, bundle {actual}");
            }
        }
        std::fs::write(staged, &db_bytes)
            .with_context(|| format!("failed to write staged database {}", staged.display()))?;
        return Ok(RestoredFrom::Database);
    }

    let Some(students_bytes) = read_entry(archive, STUDENTS_ENTRY)? else {
        bail!("bundle has neither {DB_ENTRY} nor {STUDENTS_ENTRY}");
    };
    let students: serde_json::Value =
        serde_json::from_slice(&students_bytes).context("students.json is invalid JSON")?;
    if !students.is_array() {
        bail!("students.json must hold a JSON array");
    }
    let conn = db::open_db_at(staged)?;
    db::slot_set(&conn, STUDENTS_SLOT, &students.to_string())
        .context("failed to write students slot")?;
    Ok(RestoredFrom::StudentsJson)
}

/// Pretty-printed students slot and its length. A missing or unreadable slot
/// exports as an empty list, which is also what the store would load.
fn students_snapshot(db_path: &Path) -> anyhow::Result<(String, usize)> {
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let raw = db::slot_get(&conn, STUDENTS_SLOT).context("failed to read students slot")?;

    let students = match raw.as_deref().map(serde_json::from_str::<serde_json::Value>) {
        Some(Ok(v)) if v.is_array() => v,
        _ => serde_json::Value::Array(Vec::new()),
    };
    let count = students.as_array().map_or(0, Vec::len);
    let text = serde_json::to_string_pretty(&students).context("failed to serialize students")?;
    Ok((text, count))
}

fn write_zip(out_path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(*name, opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write entry {name}"))?;
    }
    zip.finish().context("failed to finalize zip bundle")?;
    Ok(())
}

/// `Ok(None)` when the archive has no entry called `name`.
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Option<Vec<u8>>> {
    let mut entry = match archive.by_name(name) {
        Ok(v) => v,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to open entry {name}")),
    };
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read entry {name}"))?;
    Ok(Some(bytes))
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    Ok(read == sig.len() && sig == ZIP_SIGNATURE)
}
