//! Recursive, debounced watcher for one deployment root.
//!
//! Subscribes one non-recursive notify watch per directory under the root,
//! folds notifications into a `PendingChangeSet`, and hands the reconciled
//! batch to a `ChangeListener` once events have been quiet for the debounce
//! delay. After every batch the directory tree is walked again so that
//! directories created, moved or deleted in the meantime are (un)subscribed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use walkdir::WalkDir;

use super::aggregator::{ChangeBatch, ChangeKind, PendingChangeSet, RawEvent};
use super::error::WatchError;
use super::listener::{ChangeListener, Delivery};
use super::subscriptions::SubscriptionTable;
use super::timer::DebounceTimer;

/// Everything guarded by the root's single lock.
struct RootState {
    pending: PendingChangeSet,
    subscriptions: SubscriptionTable,
    watcher: Option<RecommendedWatcher>,
}

/// State shared between the owner, the observation thread and the timer.
struct Shared {
    root: PathBuf,
    state: Mutex<RootState>,
    listener: Arc<dyn ChangeListener>,
    stopped: AtomicBool,
}

/// Worker threads and the channel whose closing stops them.
#[derive(Default)]
struct Workers {
    shutdown: Option<Sender<()>>,
    threads: Vec<JoinHandle<()>>,
    thread_ids: Vec<ThreadId>,
}

/// Watches one root directory recursively with debounced delivery.
pub struct RecursiveWatcher {
    shared: Arc<Shared>,
    debounce: Duration,
    workers: Mutex<Workers>,
}

impl RecursiveWatcher {
    /// Create a watcher for `root`. Nothing is observed until `start()`.
    pub fn new(
        root: impl Into<PathBuf>,
        debounce: Duration,
        listener: Arc<dyn ChangeListener>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                root: root.into(),
                state: Mutex::new(RootState {
                    pending: PendingChangeSet::new(),
                    subscriptions: SubscriptionTable::new(),
                    watcher: None,
                }),
                listener,
                stopped: AtomicBool::new(false),
            }),
            debounce,
            workers: Mutex::new(Workers::default()),
        }
    }

    /// The watched root.
    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Start observing the root.
    ///
    /// Subscribes every directory currently under the root before returning,
    /// so changes made right after `start()` are seen.
    pub fn start(&self) -> Result<(), WatchError> {
        let root = self.shared.root.clone();
        if !root.is_dir() {
            return Err(WatchError::NotADirectory { path: root });
        }

        let mut workers = self.workers.lock();
        if workers.shutdown.is_some() {
            return Err(WatchError::AlreadyStarted { path: root });
        }

        crate::log_event!("watcher", "watching recursively", "{}", root.display());

        let (event_tx, event_rx) = unbounded::<notify::Result<Event>>();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver is gone only while shutting down.
            let _ = event_tx.send(res);
        })?;

        self.shared.stopped.store(false, Ordering::SeqCst);
        {
            let mut state = self.shared.state.lock();
            state.watcher = Some(watcher);
            self.shared.repair_coverage(&mut state);
            crate::debug_event!(
                "watcher",
                "subscribed",
                "{} directories under {}",
                state.subscriptions.len(),
                root.display()
            );
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let flush_target = self.shared.clone();
        let spawned = DebounceTimer::spawn(
            "hotdeploy-debounce",
            self.debounce,
            shutdown_rx.clone(),
            move || flush_target.flush(),
        );
        let (timer, timer_thread) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                self.shared.release();
                return Err(e);
            }
        };

        let observed = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("hotdeploy-watch".to_string())
            .spawn(move || observed.observe(&event_rx, &shutdown_rx, &timer));
        let watch_thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // Closing the shutdown channel stops the timer thread.
                drop(shutdown_tx);
                let _ = timer_thread.join();
                self.shared.release();
                return Err(WatchError::ThreadSpawn {
                    name: "hotdeploy-watch".to_string(),
                    reason: e.to_string(),
                });
            }
        };

        workers.thread_ids = vec![timer_thread.thread().id(), watch_thread.thread().id()];
        workers.threads = vec![timer_thread, watch_thread];
        workers.shutdown = Some(shutdown_tx);

        Ok(())
    }

    /// Stop observing and release every subscription.
    ///
    /// Idempotent and callable from any thread, including from inside a
    /// `ChangeListener`. Worker threads are joined unless called from one
    /// of them.
    pub fn stop(&self) {
        let (shutdown, threads, thread_ids) = {
            let mut workers = self.workers.lock();
            (
                workers.shutdown.take(),
                std::mem::take(&mut workers.threads),
                std::mem::take(&mut workers.thread_ids),
            )
        };

        let Some(shutdown) = shutdown else {
            return;
        };

        self.shared.stopped.store(true, Ordering::SeqCst);
        drop(shutdown);

        let current = thread::current().id();
        if thread_ids.contains(&current) {
            crate::debug_event!("watcher", "stop requested from worker thread, not joining");
            return;
        }

        for handle in threads {
            if handle.join().is_err() {
                tracing::error!(
                    "[watcher] worker thread for {} panicked",
                    self.shared.root.display()
                );
            }
        }

        crate::log_event!("watcher", "stopped", "{}", self.shared.root.display());
    }

    /// Whether the watcher has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.workers.lock().shutdown.is_some()
    }

    /// Directories currently subscribed, sorted.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let state = self.shared.state.lock();
        let mut dirs: Vec<PathBuf> = state.subscriptions.dirs().map(Path::to_path_buf).collect();
        dirs.sort();
        dirs
    }
}

impl Drop for RecursiveWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    /// Observation loop: block on the next notification and record it.
    fn observe(
        &self,
        events: &Receiver<notify::Result<Event>>,
        shutdown: &Receiver<()>,
        timer: &DebounceTimer,
    ) {
        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(Ok(event)) => self.on_event(event, timer),
                    Ok(Err(e)) => {
                        // Not retried: the root goes unobserved until restarted.
                        tracing::error!(
                            "[watcher] notification error under {}, no longer watching: {e}",
                            self.root.display()
                        );
                        break;
                    }
                    Err(_) => {
                        crate::debug_event!("watcher", "notification channel closed");
                        break;
                    }
                },
                recv(shutdown) -> _ => break,
            }
        }

        self.release();
    }

    /// Resolve one notify event into raw events and record them.
    fn on_event(&self, event: Event, timer: &DebounceTimer) {
        if event.need_rescan() {
            tracing::warn!(
                "[watcher] event queue overflow under {}, changes were dropped; rescanning the root for new artifacts",
                self.root.display()
            );
            self.state
                .lock()
                .pending
                .record(ChangeKind::Modified, self.root.clone());
            timer.arm();
            return;
        }

        let raw_events = translate(&event, &self.root);
        if raw_events.is_empty() {
            return;
        }

        let mut recorded = false;
        {
            let mut state = self.state.lock();
            for raw in raw_events {
                let Some(resolved) = resolve(&state.subscriptions, &raw.path) else {
                    tracing::trace!(
                        "[watcher] ignoring {:?} outside subscribed directories: {}",
                        raw.kind,
                        raw.path.display()
                    );
                    continue;
                };
                tracing::trace!("[watcher] event: {:?} {}", raw.kind, resolved.display());
                state.pending.record(raw.kind, resolved);
                recorded = true;
            }
        }

        if recorded {
            timer.arm();
        }
    }

    /// Timer expiry: deliver the batch, then repair watch coverage.
    fn flush(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut state = self.state.lock();
        let batch = state.pending.take();

        if !batch.is_empty() {
            crate::debug_event!(
                "watcher",
                "batch",
                "{} created, {} modified, {} deleted under {}",
                batch.created.len(),
                batch.modified.len(),
                batch.deleted.len(),
                self.root.display()
            );
            deliver(self.listener.as_ref(), &batch);
        }

        if !self.stopped.load(Ordering::SeqCst) {
            self.repair_coverage(&mut state);
        }
    }

    /// Subscribe directories that appeared and drop those that vanished.
    fn repair_coverage(&self, state: &mut RootState) {
        let RootState {
            subscriptions,
            watcher,
            ..
        } = state;
        let Some(watcher) = watcher.as_mut() else {
            return;
        };

        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    crate::debug_event!("watcher", "walk error", "{e}");
                    continue;
                }
            };
            if !entry.file_type().is_dir() || subscriptions.contains(entry.path()) {
                continue;
            }

            match watcher.watch(entry.path(), RecursiveMode::NonRecursive) {
                Ok(()) => {
                    subscriptions.insert(entry.path().to_path_buf());
                    tracing::trace!("[watcher] subscribed {}", entry.path().display());
                }
                Err(e) => {
                    tracing::warn!("[watcher] failed to watch {}: {e}", entry.path().display());
                }
            }
        }

        for dir in subscriptions.stale() {
            // The OS usually dropped the watch with the directory already.
            if let Err(e) = watcher.unwatch(&dir) {
                tracing::trace!("[watcher] unwatch {}: {e}", dir.display());
            }
            if let Some(id) = subscriptions.remove(&dir) {
                crate::debug_event!(
                    "watcher",
                    "cancelled",
                    "#{} {}",
                    id.value(),
                    dir.display()
                );
            }
        }
    }

    /// Close the notify watcher and forget all subscriptions.
    fn release(&self) {
        let mut state = self.state.lock();
        state.watcher = None;
        state.subscriptions.clear();
        state.pending = PendingChangeSet::new();
    }
}

/// Call the listener once per non-empty category, stopping on `Halt`.
fn deliver(listener: &dyn ChangeListener, batch: &ChangeBatch) {
    if !batch.created.is_empty() && listener.files_created(&batch.created) == Delivery::Halt {
        return;
    }
    if !batch.deleted.is_empty() && listener.files_deleted(&batch.deleted) == Delivery::Halt {
        return;
    }
    if !batch.modified.is_empty() {
        listener.files_modified(&batch.modified);
    }
}

/// Resolve an event path against the subscription of its directory.
fn resolve(subscriptions: &SubscriptionTable, path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    let name = path.file_name()?;
    let id = subscriptions.id_of(dir)?;
    subscriptions.path_of(id).map(|dir| dir.join(name))
}

/// Map a notify event onto created/modified/deleted raw events.
fn translate(event: &Event, root: &Path) -> Vec<RawEvent> {
    let raw = |kind: ChangeKind, path: &PathBuf| RawEvent::new(kind, path.clone(), root);

    match event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| raw(ChangeKind::Created, p))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| raw(ChangeKind::Deleted, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| raw(ChangeKind::Deleted, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|p| raw(ChangeKind::Created, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                out.push(raw(ChangeKind::Deleted, from));
            }
            if let Some(to) = event.paths.get(1) {
                out.push(raw(ChangeKind::Created, to));
            }
            out
        }
        // Backends that cannot tell rename sides apart: decide by existence.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if std::fs::symlink_metadata(p).is_ok() {
                    raw(ChangeKind::Created, p)
                } else {
                    raw(ChangeKind::Deleted, p)
                }
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| raw(ChangeKind::Modified, p))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
