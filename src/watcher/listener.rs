//! Listener trait for debounced change batches.

use std::path::PathBuf;

/// Whether delivery of the current batch should go on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Continue,
    /// Skip the remaining categories of this batch.
    Halt,
}

/// Receives reconciled change-sets from a `RecursiveWatcher`.
///
/// Each method is called at most once per batch, only with a non-empty
/// slice, in the order created, deleted, modified. Calls come from the
/// watcher's timer thread while it holds the root's lock, so implementations
/// must not call back into the same watcher.
pub trait ChangeListener: Send + Sync {
    fn files_created(&self, paths: &[PathBuf]) -> Delivery;

    fn files_modified(&self, paths: &[PathBuf]) -> Delivery;

    fn files_deleted(&self, paths: &[PathBuf]) -> Delivery;
}
