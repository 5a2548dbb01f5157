use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::storage::SqliteSlotStorage;
use crate::store::RecordStore;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Opens (or creates) the workspace database and hydrates the store from it.
/// Returns the number of students loaded.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<usize> {
    // Release the previous connection before opening a new one.
    state.store = None;
    let conn = db::open_db(path)?;
    let store = RecordStore::load(SqliteSlotStorage::new(conn));
    let count = store.len();
    state.workspace = Some(path.to_path_buf());
    state.store = Some(store);
    info!(workspace = %path.display(), students = count, "workspace opened");
    Ok(count)
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(count) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "studentCount": count
            }),
        ),
        Err(e) => {
            warn!(workspace = %path.display(), error = %format!("{e:#}"), "workspace open failed");
            state.workspace = None;
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
