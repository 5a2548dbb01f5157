use serde_json::{json, Value};

use crate::grade;
use crate::model::{FormPatch, FormState, StudentId, StudentRecord};

/// Reads an id param. UIs send ids either as JSON numbers or as strings.
pub fn parse_student_id(params: &Value, key: &str) -> Result<Option<StudentId>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("{key} must be an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<StudentId>()
            .map(Some)
            .map_err(|_| format!("{key} must be an integer")),
        Some(_) => Err(format!("{key} must be an integer")),
    }
}

fn parse_input_text(v: &Value, key: &str) -> Result<String, String> {
    match v {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(format!("{key} must be a string or number")),
    }
}

pub fn parse_form_patch(raw: &Value) -> Result<FormPatch, String> {
    let Some(obj) = raw.as_object() else {
        return Err("form patch must be an object".into());
    };
    let mut patch = FormPatch::default();
    for (k, v) in obj {
        match k.as_str() {
            "name" => match v {
                Value::String(s) => patch.name = Some(s.clone()),
                Value::Null => patch.name = Some(String::new()),
                _ => return Err("name must be a string".into()),
            },
            "score1" => patch.score1 = Some(parse_input_text(v, k)?),
            "score2" => patch.score2 = Some(parse_input_text(v, k)?),
            "score3" => patch.score3 = Some(parse_input_text(v, k)?),
            _ => return Err(format!("unknown form field: {}", k)),
        }
    }
    Ok(patch)
}

/// Optional `params.form`, applied before add/edit.
pub fn parse_optional_form(params: &Value) -> Result<Option<FormPatch>, String> {
    match params.get("form") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_form_patch(v).map(Some),
    }
}

pub fn form_view(form: &FormState) -> Value {
    json!({
        "name": form.name,
        "score1": form.score1,
        "score2": form.score2,
        "score3": form.score3,
        "editingId": form.editing_id,
        "mode": if form.is_editing() { "edit" } else { "create" },
    })
}

pub fn student_view(record: &StudentRecord) -> Value {
    let ev = grade::evaluate(record);
    json!({
        "id": record.id,
        "name": record.name,
        "score1": record.score1,
        "score2": record.score2,
        "score3": record.score3,
        "scoreTexts": ev.score_texts,
        "average": ev.average,
        "averageText": ev.average_text,
        "situation": ev.situation,
    })
}
