use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{form_view, parse_optional_form, parse_student_id, student_view};
use crate::ipc::types::{AppState, Request};
use crate::store::DeleteOutcome;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let students: Vec<serde_json::Value> = store.records().iter().map(student_view).collect();
    ok(
        &req.id,
        json!({
            "count": students.len(),
            "students": students
        }),
    )
}

fn handle_students_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let patch = match parse_optional_form(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    if let Some(patch) = patch {
        store.update_form(patch);
    }
    if store.form().is_editing() {
        return err(
            &req.id,
            "bad_params",
            "form is in edit mode; use students.edit or students.cancelEdit",
            None,
        );
    }

    match store.add() {
        Ok(record) => ok(
            &req.id,
            json!({
                "student": student_view(&record),
                "form": form_view(store.form())
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_begin_edit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let id = match parse_student_id(&req.params, "id") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing id", None),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    match store.begin_edit(id) {
        Ok(()) => ok(&req.id, json!({ "form": form_view(store.form()) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_edit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let id = match parse_student_id(&req.params, "id") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let patch = match parse_optional_form(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let Some(id) = id.or(store.form().editing_id) else {
        return err(&req.id, "bad_params", "missing id and no student is being edited", None);
    };
    if let Some(patch) = patch {
        store.update_form(patch);
    }

    match store.edit(id) {
        Ok(record) => ok(
            &req.id,
            json!({
                "student": student_view(&record),
                "form": form_view(store.form())
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_cancel_edit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    store.cancel_edit();
    ok(&req.id, json!({ "form": form_view(store.form()) }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let id = match parse_student_id(&req.params, "id") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing id", None),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    // The UI owns the yes/no prompt and reports the answer here.
    let confirmed = match req.params.get("confirmed") {
        Some(v) => match v.as_bool() {
            Some(b) => b,
            None => return err(&req.id, "bad_params", "confirmed must be a boolean", None),
        },
        None => return err(&req.id, "bad_params", "missing confirmed", None),
    };

    match store.delete(id, |_| confirmed) {
        Ok(DeleteOutcome::Removed(record)) => ok(
            &req.id,
            json!({
                "removed": true,
                "student": student_view(&record),
                "count": store.len()
            }),
        ),
        Ok(DeleteOutcome::Declined) => ok(
            &req.id,
            json!({ "removed": false, "reason": "declined", "count": store.len() }),
        ),
        Ok(DeleteOutcome::NotFound) => ok(
            &req.id,
            json!({ "removed": false, "reason": "not_found", "count": store.len() }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.add" => Some(handle_students_add(state, req)),
        "students.beginEdit" => Some(handle_students_begin_edit(state, req)),
        "students.edit" => Some(handle_students_edit(state, req)),
        "students.cancelEdit" => Some(handle_students_cancel_edit(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
