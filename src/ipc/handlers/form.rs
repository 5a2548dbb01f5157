use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{form_view, parse_form_patch};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_form_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    ok(&req.id, json!({ "form": form_view(store.form()) }))
}

fn handle_form_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let patch = match parse_form_patch(raw) {
        Ok(p) => p,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    store.update_form(patch);
    ok(&req.id, json!({ "form": form_view(store.form()) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "form.get" => Some(handle_form_get(state, req)),
        "form.update" => Some(handle_form_update(state, req)),
        _ => None,
    }
}
