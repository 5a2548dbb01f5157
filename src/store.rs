use crate::model::{FormPatch, FormState, StudentId, StudentRecord};
use crate::storage::SlotStorage;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("student name is required")]
    MissingName,
    #[error("student {0} not found")]
    NotFound(StudentId),
    #[error("failed to persist students: {0:#}")]
    PersistenceFailed(#[source] anyhow::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::MissingName => "missing_name",
            StoreError::NotFound(_) => "not_found",
            StoreError::PersistenceFailed(_) => "persistence_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Removed(StudentRecord),
    Declined,
    NotFound,
}

/// Ordered student collection plus the form buffer that edits it.
///
/// Every mutation builds the next collection, writes it through the slot
/// storage and only then swaps it in. A failed write leaves both the
/// collection and the form untouched.
pub struct RecordStore<S> {
    storage: S,
    records: Vec<StudentRecord>,
    form: FormState,
}

impl<S: SlotStorage> RecordStore<S> {
    /// Hydrates from storage. Missing or unreadable state starts empty.
    pub fn load(storage: S) -> Self {
        let records = match storage.load() {
            Ok(Some(v)) => v,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "discarding unreadable students slot");
                Vec::new()
            }
        };
        info!(count = records.len(), "students loaded");
        Self {
            storage,
            records,
            form: FormState::default(),
        }
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn update_form(&mut self, patch: FormPatch) {
        self.form.apply(patch);
    }

    /// Appends a record built from the form and resets the form.
    pub fn add(&mut self) -> Result<StudentRecord, StoreError> {
        let name = validated_name(&self.form)?;
        let [score1, score2, score3] = self.form.parsed_scores();
        let record = StudentRecord {
            id: self.next_id(),
            name,
            score1,
            score2,
            score3,
        };

        let mut next = self.records.clone();
        next.push(record.clone());
        self.commit(next)?;
        self.form = FormState::default();
        debug!(id = record.id, "student added");
        Ok(record)
    }

    /// Replaces name and scores of `id` in place from the form, then leaves
    /// edit mode.
    pub fn edit(&mut self, id: StudentId) -> Result<StudentRecord, StoreError> {
        let name = validated_name(&self.form)?;
        let Some(pos) = self.records.iter().position(|r| r.id == id) else {
            return Err(StoreError::NotFound(id));
        };
        let [score1, score2, score3] = self.form.parsed_scores();

        let mut next = self.records.clone();
        let record = &mut next[pos];
        record.name = name;
        record.score1 = score1;
        record.score2 = score2;
        record.score3 = score3;
        let updated = record.clone();

        self.commit(next)?;
        self.form = FormState::default();
        debug!(id, "student updated");
        Ok(updated)
    }

    pub fn begin_edit(&mut self, id: StudentId) -> Result<(), StoreError> {
        let Some(record) = self.records.iter().find(|r| r.id == id) else {
            return Err(StoreError::NotFound(id));
        };
        self.form.load_record(record);
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.form = FormState::default();
    }

    /// Removes `id` once `confirm` agrees. Declining is not an error.
    pub fn delete<F>(&mut self, id: StudentId, confirm: F) -> Result<DeleteOutcome, StoreError>
    where
        F: FnOnce(&StudentRecord) -> bool,
    {
        let Some(pos) = self.records.iter().position(|r| r.id == id) else {
            return Ok(DeleteOutcome::NotFound);
        };
        if !confirm(&self.records[pos]) {
            debug!(id, "delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let mut next = self.records.clone();
        let removed = next.remove(pos);
        self.commit(next)?;
        // The form must not keep pointing at a record that no longer exists.
        if self.form.editing_id == Some(id) {
            self.form = FormState::default();
        }
        debug!(id, "student deleted");
        Ok(DeleteOutcome::Removed(removed))
    }

    fn commit(&mut self, next: Vec<StudentRecord>) -> Result<(), StoreError> {
        if let Err(e) = self.storage.save(&next) {
            error!(error = %format!("{e:#}"), "students slot write failed");
            return Err(StoreError::PersistenceFailed(e));
        }
        self.records = next;
        Ok(())
    }

    /// Creation time in milliseconds, bumped past every existing id. When
    /// the largest stored id is `i64::MAX`, falls back to the lowest unused
    /// non-negative id.
    fn next_id(&self) -> StudentId {
        let now = chrono::Utc::now().timestamp_millis();
        let Some(max) = self.records.iter().map(|r| r.id).max() else {
            return now;
        };
        match max.checked_add(1) {
            Some(floor) => now.max(floor),
            None => {
                let taken: HashSet<StudentId> = self.records.iter().map(|r| r.id).collect();
                // At most `len` ids are taken, so a free one exists below it.
                (0..).find(|id| !taken.contains(id)).unwrap_or_default()
            }
        }
    }
}

/// Only an empty name is missing. The name is stored exactly as typed.
fn validated_name(form: &FormState) -> Result<String, StoreError> {
    if form.name.is_empty() {
        return Err(StoreError::MissingName);
    }
    Ok(form.name.clone())
}
