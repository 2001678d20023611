//! Latest known whiteboard document for a live session.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::change::{ChangeAction, classify};
use crate::types::WhiteboardProject;

#[derive(Default)]
struct StoreState {
    latest: Option<WhiteboardProject>,
    stroke_ids: HashSet<String>,
    text_ids: HashSet<String>,
}

impl StoreState {
    fn item_ids(&self) -> HashSet<String> {
        self.stroke_ids.union(&self.text_ids).cloned().collect()
    }

    fn set(&mut self, project: &WhiteboardProject) {
        self.stroke_ids = project.stroke_ids();
        self.text_ids = project.text_ids();
        self.latest = Some(project.clone());
    }
}

/// Owns the canonical document. Every read and write copies, so callers never
/// share a reference with the stored snapshot.
#[derive(Default)]
pub struct ProjectStore {
    state: Mutex<StoreState>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the latest document, or an empty board if none was stored yet.
    pub fn snapshot(&self) -> WhiteboardProject {
        self.state().latest.clone().unwrap_or_default()
    }

    /// Copy of the latest document only if one has been stored.
    pub fn latest(&self) -> Option<WhiteboardProject> {
        self.state().latest.clone()
    }

    pub fn has_project(&self) -> bool {
        self.state().latest.is_some()
    }

    /// Store a copy of `project` as the new latest state.
    pub fn replace(&self, project: &WhiteboardProject) {
        self.state().set(project);
    }

    /// Store `project` and classify the transition from the previous state
    /// in a single step.
    pub fn apply(&self, project: &WhiteboardProject) -> ChangeAction {
        let mut state = self.state();
        let previous = state.item_ids();
        let action = classify(&project.item_ids(), &previous);
        state.set(project);
        action
    }

    /// Cached union of stroke and text identifiers of the latest state.
    pub fn item_ids(&self) -> HashSet<String> {
        self.state().item_ids()
    }
}
