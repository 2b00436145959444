//! Change aggregation for one watched root.
//!
//! Raw events are folded into three insertion-ordered path sets as they
//! arrive. Folding is order-aware, which is what lets a delete followed by a
//! recreate (atomic save) collapse into a modification while a create
//! followed by a delete cancels out.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;

/// Kind of a raw filesystem notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One low-level notification, resolved to an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    /// Root whose watcher produced the event.
    pub root: PathBuf,
}

impl RawEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            root: root.into(),
        }
    }
}

/// A reconciled change-set ready for delivery.
///
/// The three collections are pairwise disjoint. Order within a collection
/// follows first arrival but carries no meaning for consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub created: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total number of paths across all categories.
    pub fn len(&self) -> usize {
        self.created.len() + self.modified.len() + self.deleted.len()
    }
}

/// Pending created/modified/deleted sets for one root.
#[derive(Debug, Default)]
pub struct PendingChangeSet {
    created: IndexSet<PathBuf>,
    modified: IndexSet<PathBuf>,
    deleted: IndexSet<PathBuf>,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the pending sets.
    ///
    /// Precedence:
    /// - a path both created and modified is only created;
    /// - deleted then created again is modified;
    /// - created then deleted again disappears from the batch;
    /// - a modify arriving after a delete is stale and ignored, the path
    ///   stays deleted.
    pub fn record(&mut self, kind: ChangeKind, path: PathBuf) {
        match kind {
            ChangeKind::Created => {
                self.modified.shift_remove(&path);
                if self.deleted.shift_remove(&path) {
                    self.modified.insert(path);
                } else {
                    self.created.insert(path);
                }
            }
            ChangeKind::Modified => {
                if !self.created.contains(&path) && !self.deleted.contains(&path) {
                    self.modified.insert(path);
                }
            }
            ChangeKind::Deleted => {
                self.modified.shift_remove(&path);
                if !self.created.shift_remove(&path) {
                    self.deleted.insert(path);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Whether `path` is pending in any category.
    pub fn contains(&self, path: &Path) -> bool {
        self.created.contains(path) || self.modified.contains(path) || self.deleted.contains(path)
    }

    /// Drain the pending sets into a batch, leaving this set empty.
    pub fn take(&mut self) -> ChangeBatch {
        debug_assert!(self.created.is_disjoint(&self.modified));
        debug_assert!(self.created.is_disjoint(&self.deleted));
        debug_assert!(self.modified.is_disjoint(&self.deleted));

        ChangeBatch {
            created: std::mem::take(&mut self.created).into_iter().collect(),
            modified: std::mem::take(&mut self.modified).into_iter().collect(),
            deleted: std::mem::take(&mut self.deleted).into_iter().collect(),
        }
    }
}
