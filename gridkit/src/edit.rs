//! Edit session coordinator.
//!
//! One coordinator per grid. It owns at most one session: the row being
//! edited, a working copy of it and, with tracking enabled, a snapshot of the
//! row as it was when editing began.
//!
//! With tracking the working copy *is* the live row: renderers show it in
//! place of the fetched row, so every edit is visible immediately and cancel
//! restores the snapshot. Without tracking the working copy stays a private
//! draft until commit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use gridkit_lib::error::ValidationErrors;
use gridkit_lib::model::{Row, RowId, Value};
use log::{debug, warn};
use serde::Deserialize;
use serde::Serialize;

use crate::error::EditError;

/// Where fields are edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// A separate form; one session at a time.
    #[default]
    Modal,
    /// Directly in the row's cells; starting another cell edit retargets.
    InPlace,
}

impl EditMode {
    fn name(self) -> &'static str {
        match self {
            Self::Modal => "modal",
            Self::InPlace => "in-place",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// A new row that does not exist in the data set yet.
    Add,
    /// An existing row.
    Edit,
}

/// Observable state of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditState {
    Idle,
    Editing {
        row: RowId,
        mode: EditMode,
        kind: EditKind,
    },
    Saving {
        row: RowId,
    },
}

/// What to do with an open in-place edit when another cell edit starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetargetPolicy {
    /// Commit when the row validates, revert otherwise.
    #[default]
    CommitIfValidElseRevert,
    /// Commit; if that fails the new edit does not start.
    AlwaysCommit,
    /// Discard the open edit.
    AlwaysRevert,
}

/// How the previous in-place edit ended when a new one started.
#[derive(Debug, Clone, PartialEq)]
pub enum RetargetOutcome<T> {
    /// Nothing was being edited.
    Started,
    /// The same row was already being edited.
    Unchanged,
    /// The previous row was saved.
    Committed(T),
    /// The previous row was reverted; carries the restored snapshot, if any.
    Reverted(Option<T>),
}

/// Persistence callback for commits.
#[async_trait]
pub trait RowPersister<T>: Send + Sync {
    /// Checks a row before saving. The default accepts everything.
    fn validate(&self, row: &T) -> ValidationErrors {
        let _ = row;
        ValidationErrors::new()
    }

    /// Saves the row and returns its committed form.
    async fn save(&self, row: &T, kind: EditKind) -> Result<T, ValidationErrors>;
}

#[derive(Debug)]
struct Session<T> {
    row: RowId,
    kind: EditKind,
    mode: EditMode,
    snapshot: Option<T>,
    draft: T,
    changed: bool,
    errors: ValidationErrors,
    saving: bool,
}

#[derive(Debug)]
struct EditInner<T> {
    mode: EditMode,
    tracking: bool,
    retarget: RetargetPolicy,
    session: Option<Session<T>>,
    /// Bumped whenever a session starts or ends, so a save that resolves after
    /// its session was force-cancelled leaves the coordinator alone.
    epoch: u64,
}

/// Coordinates add, edit, commit and cancel for one grid.
#[derive(Debug)]
pub struct EditCoordinator<T> {
    inner: Arc<RwLock<EditInner<T>>>,
    dirty: Arc<AtomicBool>,
}

impl<T> Clone for EditCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            dirty: Arc::clone(&self.dirty),
        }
    }
}

impl<T: Row> EditCoordinator<T> {
    pub fn new(mode: EditMode, tracking: bool, retarget: RetargetPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(EditInner {
                mode,
                tracking,
                retarget,
                session: None,
                epoch: 0,
            })),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mode(&self) -> EditMode {
        self.inner.read().map(|g| g.mode).unwrap_or_default()
    }

    pub fn tracking(&self) -> bool {
        self.inner.read().map(|g| g.tracking).unwrap_or(false)
    }

    pub fn state(&self) -> EditState {
        let Ok(guard) = self.inner.read() else {
            return EditState::Idle;
        };
        match &guard.session {
            None => EditState::Idle,
            Some(s) if s.saving => EditState::Saving { row: s.row.clone() },
            Some(s) => EditState::Editing {
                row: s.row.clone(),
                mode: s.mode,
                kind: s.kind,
            },
        }
    }

    // -------------------------------------------------------------------------
    // Starting
    // -------------------------------------------------------------------------

    /// Opens a session for a new row.
    pub fn begin_add(&self, row: T) -> Result<(), EditError> {
        self.start(row, EditKind::Add)
    }

    /// Opens a session for an existing row.
    pub fn begin_edit(&self, row: T) -> Result<(), EditError> {
        self.start(row, EditKind::Edit)
    }

    fn start(&self, row: T, kind: EditKind) -> Result<(), EditError> {
        let Ok(mut guard) = self.inner.write() else {
            return Err(EditError::NotEditing);
        };
        if guard.session.is_some() {
            return Err(EditError::Busy);
        }
        let snapshot = (guard.tracking && kind == EditKind::Edit).then(|| row.clone());
        let mode = guard.mode;
        debug!("[edit] begin {:?} on {}", kind, row.id());
        guard.session = Some(Session {
            row: row.id(),
            kind,
            mode,
            snapshot,
            draft: row,
            changed: false,
            errors: ValidationErrors::new(),
            saving: false,
        });
        guard.epoch += 1;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Starts an in-place edit on `row`, first ending any edit on another row
    /// according to the retarget policy.
    ///
    /// Two rows are never left in an uncommitted in-place edit at once.
    pub async fn begin_cell_edit<P>(
        &self,
        row: T,
        persister: &P,
    ) -> Result<RetargetOutcome<T>, EditError>
    where
        P: RowPersister<T> + ?Sized,
    {
        let (policy, previous_valid) = {
            let Ok(guard) = self.inner.read() else {
                return Err(EditError::NotEditing);
            };
            if guard.mode != EditMode::InPlace {
                return Err(EditError::WrongMode(guard.mode.name()));
            }
            match &guard.session {
                None => (None, false),
                Some(s) if s.saving => return Err(EditError::Saving),
                Some(s) if s.row == row.id() => return Ok(RetargetOutcome::Unchanged),
                Some(s) => (
                    Some(guard.retarget),
                    persister.validate(&s.draft).is_empty(),
                ),
            }
        };

        let outcome = match policy {
            None => RetargetOutcome::Started,
            Some(RetargetPolicy::AlwaysRevert) => RetargetOutcome::Reverted(self.cancel()?),
            Some(RetargetPolicy::AlwaysCommit) => {
                RetargetOutcome::Committed(self.commit(persister).await?)
            }
            Some(RetargetPolicy::CommitIfValidElseRevert) if previous_valid => {
                match self.commit(persister).await {
                    Ok(saved) => RetargetOutcome::Committed(saved),
                    Err(e) => {
                        debug!("[edit] retarget commit failed ({}), reverting", e);
                        RetargetOutcome::Reverted(self.cancel()?)
                    }
                }
            }
            Some(RetargetPolicy::CommitIfValidElseRevert) => {
                RetargetOutcome::Reverted(self.cancel()?)
            }
        };
        self.start(row, EditKind::Edit)?;
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    /// Writes a field on the working copy.
    pub fn set_field(&self, field: &str, value: impl Into<Value>) -> Result<(), EditError> {
        let Ok(mut guard) = self.inner.write() else {
            return Err(EditError::NotEditing);
        };
        let session = guard.session.as_mut().ok_or(EditError::NotEditing)?;
        if session.saving {
            return Err(EditError::Saving);
        }
        session.draft.set_field(field, value.into())?;
        session.changed = true;
        session.errors.fields.retain(|e| e.field != field);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// The working copy of the row being edited.
    pub fn draft(&self) -> Option<T> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.session.as_ref().map(|s| s.draft.clone()))
    }

    /// The row as renderers should show it, when it differs from the fetched
    /// row. Only tracked sessions write through.
    pub fn live_row(&self, id: &RowId) -> Option<T> {
        let guard = self.inner.read().ok()?;
        let session = guard.session.as_ref()?;
        (guard.tracking && &session.row == id).then(|| session.draft.clone())
    }

    /// Errors reported by the last failed commit.
    pub fn errors(&self) -> ValidationErrors {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.session.as_ref().map(|s| s.errors.clone()))
            .unwrap_or_default()
    }

    /// Whether the working copy differs from the row it started from.
    pub fn has_changes(&self) -> bool {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.session.as_ref().map(|s| s.changed))
            .unwrap_or(false)
    }

    pub fn is_editing(&self, id: &RowId) -> bool {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.session.as_ref().map(|s| &s.row == id))
            .unwrap_or(false)
    }

    /// Kind of the open session.
    pub fn kind(&self) -> Option<EditKind> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.session.as_ref().map(|s| s.kind))
    }

    // -------------------------------------------------------------------------
    // Ending
    // -------------------------------------------------------------------------

    /// Validates and saves the working copy.
    ///
    /// On success the session closes and the committed row is returned. On
    /// failure the session stays open with the errors recorded.
    pub async fn commit<P>(&self, persister: &P) -> Result<T, EditError>
    where
        P: RowPersister<T> + ?Sized,
    {
        let (draft, kind, epoch) = {
            let Ok(mut guard) = self.inner.write() else {
                return Err(EditError::NotEditing);
            };
            let epoch = guard.epoch;
            let session = guard.session.as_mut().ok_or(EditError::NotEditing)?;
            if session.saving {
                return Err(EditError::Saving);
            }
            let errors = persister.validate(&session.draft);
            if !errors.is_empty() {
                debug!("[edit] {} failed validation", session.row);
                session.errors = errors.clone();
                self.dirty.store(true, Ordering::SeqCst);
                return Err(EditError::Validation(errors));
            }
            session.saving = true;
            self.dirty.store(true, Ordering::SeqCst);
            (session.draft.clone(), session.kind, epoch)
        };

        let saved = persister.save(&draft, kind).await;

        let Ok(mut guard) = self.inner.write() else {
            return saved.map_err(EditError::Validation);
        };
        if guard.epoch != epoch {
            debug!("[edit] save of {} resolved after its session ended", draft.id());
            return saved.map_err(EditError::Validation);
        }
        self.dirty.store(true, Ordering::SeqCst);
        match saved {
            Ok(row) => {
                debug!("[edit] committed {}", row.id());
                guard.session = None;
                guard.epoch += 1;
                Ok(row)
            }
            Err(errors) => {
                warn!("[edit] save of {} failed: {}", draft.id(), errors);
                if let Some(session) = guard.session.as_mut() {
                    session.saving = false;
                    session.errors = errors.clone();
                }
                Err(EditError::Validation(errors))
            }
        }
    }

    /// Discards the session.
    ///
    /// Returns the snapshot to restore for tracked edits of existing rows.
    /// New rows are dropped entirely.
    pub fn cancel(&self) -> Result<Option<T>, EditError> {
        let Ok(mut guard) = self.inner.write() else {
            return Err(EditError::NotEditing);
        };
        match &guard.session {
            None => return Err(EditError::NotEditing),
            Some(s) if s.saving => return Err(EditError::Saving),
            Some(_) => {}
        }
        let session = guard.session.take().ok_or(EditError::NotEditing)?;
        guard.epoch += 1;
        self.dirty.store(true, Ordering::SeqCst);
        debug!("[edit] cancelled {}", session.row);
        Ok(session.snapshot)
    }

    /// Ends the session for a row that left the data set, even mid-save.
    pub fn force_cancel(&self, id: &RowId) -> bool {
        if let Ok(mut guard) = self.inner.write()
            && guard.session.as_ref().is_some_and(|s| &s.row == id)
        {
            debug!("[edit] force-cancelled {}", id);
            guard.session = None;
            guard.epoch += 1;
            self.dirty.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    // -------------------------------------------------------------------------
    // Dirty tracking
    // -------------------------------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }
}
