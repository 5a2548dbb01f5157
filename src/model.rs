use serde::{Deserialize, Serialize};

pub type StudentId = i64;

/// One student's persisted name and three scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: StudentId,
    pub name: String,
    pub score1: f64,
    pub score2: f64,
    pub score3: f64,
}

impl StudentRecord {
    pub fn scores(&self) -> [f64; 3] {
        [self.score1, self.score2, self.score3]
    }
}

/// Ephemeral input buffer for the create/edit form. Scores stay as the raw
/// text the user typed until a record is built from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub name: String,
    pub score1: String,
    pub score2: String,
    pub score3: String,
    pub editing_id: Option<StudentId>,
}

impl FormState {
    pub fn is_editing(&self) -> bool {
        self.editing_id.is_some()
    }

    pub fn apply(&mut self, patch: FormPatch) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.score1 {
            self.score1 = v;
        }
        if let Some(v) = patch.score2 {
            self.score2 = v;
        }
        if let Some(v) = patch.score3 {
            self.score3 = v;
        }
    }

    /// Copies a record's current values into the form and targets it for editing.
    pub fn load_record(&mut self, record: &StudentRecord) {
        self.name = record.name.clone();
        self.score1 = record.score1.to_string();
        self.score2 = record.score2.to_string();
        self.score3 = record.score3.to_string();
        self.editing_id = Some(record.id);
    }

    pub fn parsed_scores(&self) -> [f64; 3] {
        [
            parse_score(&self.score1),
            parse_score(&self.score2),
            parse_score(&self.score3),
        ]
    }
}

/// Partial form update, one entry per changed input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPatch {
    pub name: Option<String>,
    pub score1: Option<String>,
    pub score2: Option<String>,
    pub score3: Option<String>,
}

/// Lenient score parsing: takes the longest leading decimal number and ignores
/// trailing garbage (`"7.5abc"` -> 7.5). Empty, unparseable or non-finite
/// input coerces to 0.
pub fn parse_score(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();

    let mut end = 0usize;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            end = j;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut j = end + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    match s[..end].parse::<f64>() {
        // Folds -0 into 0.
        Ok(v) if v.is_finite() && v != 0.0 => v,
        _ => 0.0,
    }
}
