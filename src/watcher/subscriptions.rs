//! Directory subscription table.
//!
//! Keeps one entry per subscribed directory, indexed both ways: by path to
//! avoid subscribing twice, and by handle to resolve which directory an
//! event belongs to.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Opaque handle for one directory subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Bidirectional path <-> subscription map.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    by_path: HashMap<PathBuf, SubscriptionId>,
    by_id: HashMap<SubscriptionId, PathBuf>,
    next_id: u64,
}

impl SubscriptionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription for `dir`.
    ///
    /// Returns `None` if the directory already has one.
    pub fn insert(&mut self, dir: PathBuf) -> Option<SubscriptionId> {
        if self.by_path.contains_key(&dir) {
            return None;
        }

        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.by_path.insert(dir.clone(), id);
        self.by_id.insert(id, dir);
        Some(id)
    }

    /// Drop the subscription for `dir`, returning its handle.
    pub fn remove(&mut self, dir: &Path) -> Option<SubscriptionId> {
        let id = self.by_path.remove(dir)?;
        self.by_id.remove(&id);
        Some(id)
    }

    /// Check if a directory is subscribed.
    pub fn contains(&self, dir: &Path) -> bool {
        self.by_path.contains_key(dir)
    }

    /// Handle of the subscription covering `dir`.
    pub fn id_of(&self, dir: &Path) -> Option<SubscriptionId> {
        self.by_path.get(dir).copied()
    }

    /// Directory behind a subscription handle.
    pub fn path_of(&self, id: SubscriptionId) -> Option<&Path> {
        self.by_id.get(&id).map(PathBuf::as_path)
    }

    /// Subscribed directories that no longer exist on disk.
    ///
    /// Symlinks are followed: a link whose target directory is gone is stale.
    pub fn stale(&self) -> Vec<PathBuf> {
        self.by_path
            .keys()
            .filter(|dir| !dir.is_dir())
            .cloned()
            .collect()
    }

    /// All subscribed directories.
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.by_path.keys().map(PathBuf::as_path)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Forget every subscription, returning the directories that were held.
    pub fn clear(&mut self) -> Vec<PathBuf> {
        self.by_id.clear();
        self.by_path.drain().map(|(dir, _)| dir).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_is_unique_per_path() {
        let mut table = SubscriptionTable::new();

        let first = table.insert(PathBuf::from("/deploy/app"));
        let second = table.insert(PathBuf::from("/deploy/app"));

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_both_directions() {
        let mut table = SubscriptionTable::new();
        let id = table.insert(PathBuf::from("/deploy/app/lib")).unwrap();

        assert_eq!(table.id_of(Path::new("/deploy/app/lib")), Some(id));
        assert_eq!(table.path_of(id), Some(Path::new("/deploy/app/lib")));
    }

    #[test]
    fn test_remove_clears_reverse_index() {
        let mut table = SubscriptionTable::new();
        let id = table.insert(PathBuf::from("/deploy/app")).unwrap();

        assert_eq!(table.remove(Path::new("/deploy/app")), Some(id));
        assert!(table.path_of(id).is_none());
        assert!(!table.contains(Path::new("/deploy/app")));
        assert!(table.is_empty());
    }

    #[test]
    fn test_handles_are_not_reused() {
        let mut table = SubscriptionTable::new();
        let a = table.insert(PathBuf::from("/a")).unwrap();
        table.remove(Path::new("/a"));
        let b = table.insert(PathBuf::from("/a")).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_stale_reports_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join("live");
        std::fs::create_dir(&live).unwrap();
        let gone = temp_dir.path().join("gone");

        let mut table = SubscriptionTable::new();
        table.insert(live.clone());
        table.insert(gone.clone());

        assert_eq!(table.stale(), vec![gone]);
    }
}
