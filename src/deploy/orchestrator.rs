//! Applies deployment decisions to the filesystem and the registry.
//!
//! The [`Deployer`] is used twice: at startup to install everything already
//! present under a root, and afterwards as the `ChangeListener` of every
//! application root watcher.

use std::cmp::Ordering as CmpOrdering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use walkdir::{DirEntry, WalkDir};

use super::decision::{Action, DecisionEngine};
use crate::artifact::{Artifact, has_artifact_extension};
use crate::registry::{ModuleHandle, ModuleRegistry};
use crate::watcher::{ChangeListener, Delivery};

/// Result of processing one candidate artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to start.
    Skipped,
    /// Module installed or updated; it still needs starting.
    Deployed(ModuleHandle),
    /// The runtime was stopped; processing must end.
    Halted,
}

/// Drives decisions for artifacts found on disk.
pub struct Deployer {
    registry: Arc<dyn ModuleRegistry>,
    engine: DecisionEngine,
    extensions: Vec<String>,
    halted: AtomicBool,
    halt_tx: Sender<()>,
    halt_rx: Receiver<()>,
}

impl Deployer {
    pub fn new(
        registry: Arc<dyn ModuleRegistry>,
        engine: DecisionEngine,
        extensions: Vec<String>,
    ) -> Self {
        let (halt_tx, halt_rx) = bounded(1);
        Self {
            registry,
            engine,
            extensions,
            halted: AtomicBool::new(false),
            halt_tx,
            halt_rx,
        }
    }

    /// Whether a `StopAll` has been applied. A halted deployer ignores
    /// every later request.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Receives one message when the deployer halts.
    pub fn halt_signal(&self) -> Receiver<()> {
        self.halt_rx.clone()
    }

    pub fn registry(&self) -> &Arc<dyn ModuleRegistry> {
        &self.registry
    }

    /// Install every artifact under `roots`, then start what was installed.
    ///
    /// Missing roots are skipped. Returns `false` if the runtime was stopped
    /// on the way.
    pub fn deploy_roots(&self, kind: &str, roots: &[PathBuf]) -> bool {
        let listed = roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        crate::log_event!("deploy", format!("installing {kind} modules"), "{listed}");

        let mut handles = Vec::new();
        for root in roots {
            if !root.is_dir() {
                crate::debug_event!("deploy", "skipping missing root", "{}", root.display());
                continue;
            }
            handles.extend(self.install_directory(root));
            if self.is_halted() {
                return false;
            }
        }

        crate::log_event!("deploy", format!("starting {} {kind} modules", handles.len()));
        self.start_all(&handles);
        !self.is_halted()
    }

    /// Install all artifacts under `dir` with updates disallowed.
    ///
    /// Within each directory, files are handled before subdirectories.
    /// Symlinked directories are followed, as the watcher does.
    /// Unreadable entries are logged and skipped.
    pub fn install_directory(&self, dir: &Path) -> Vec<ModuleHandle> {
        let mut handles = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by(files_first)
            .into_iter();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("[deploy] cannot read entry under {}: {e}", dir.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.is_artifact(entry.path()) {
                continue;
            }
            match self.install_or_update(entry.path(), false) {
                Outcome::Deployed(handle) => handles.push(handle),
                Outcome::Skipped => {}
                Outcome::Halted => break,
            }
        }

        handles
    }

    /// Decide and apply the action for the artifact at `path`.
    pub fn install_or_update(&self, path: &Path, update_allowed: bool) -> Outcome {
        if self.is_halted() {
            return Outcome::Halted;
        }

        let artifact = match Artifact::load(path) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!("[deploy] ignoring {}: {e}", path.display());
                return Outcome::Skipped;
            }
        };

        let installed = match artifact.descriptor.symbolic_name.as_deref() {
            Some(name) => self.registry.query_by_symbolic_name(name),
            None => Vec::new(),
        };
        let action = self
            .engine
            .decide(&artifact.descriptor, &installed, update_allowed);
        crate::debug_event!("deploy", "decision", "{} -> {action:?}", path.display());

        self.apply(action, &artifact)
    }

    fn apply(&self, action: Action, artifact: &Artifact) -> Outcome {
        let location = artifact.location_key();
        let path = artifact.path.display();

        match action {
            Action::None => Outcome::Skipped,
            Action::Install => {
                crate::log_event!("deploy", "installing module", "{location}");
                match self.registry.install(&location, &artifact.bytes) {
                    Ok(handle) => Outcome::Deployed(handle),
                    Err(e) => {
                        tracing::error!("[deploy] error installing module at {path}: {e}");
                        Outcome::Skipped
                    }
                }
            }
            Action::Update => {
                let Some(handle) = self.registry.find_by_location(&location) else {
                    tracing::warn!("[deploy] not updating core module {location}");
                    return Outcome::Skipped;
                };
                crate::log_event!("deploy", "updating module", "{location}");
                match self.registry.update(handle, &artifact.bytes) {
                    Ok(()) => Outcome::Deployed(handle),
                    Err(e) => {
                        tracing::error!("[deploy] error updating module at {path}: {e}");
                        Outcome::Skipped
                    }
                }
            }
            Action::WrapAndInstall => {
                crate::log_event!("deploy", "wrapping archive", "{location}");
                let installed = self
                    .registry
                    .wrap(&artifact.bytes, &location)
                    .and_then(|wrapped| self.registry.install(&location, &wrapped));
                match installed {
                    Ok(handle) => Outcome::Deployed(handle),
                    Err(e) => {
                        tracing::error!("[deploy] error installing archive at {path}: {e}");
                        Outcome::Skipped
                    }
                }
            }
            Action::StopAll => {
                self.halt();
                Outcome::Halted
            }
        }
    }

    /// Start every handle; failures are logged and do not stop the rest.
    pub fn start_all(&self, handles: &[ModuleHandle]) {
        for &handle in handles {
            if self.is_halted() {
                return;
            }
            if let Err(e) = self.registry.start(handle) {
                tracing::error!("[deploy] couldn't start module {handle}: {e}");
            }
        }
    }

    fn halt(&self) {
        if self.halted.swap(true, Ordering::SeqCst) {
            return;
        }
        crate::log_event!("deploy", "stopping the runtime");
        if let Err(e) = self.registry.stop_everything() {
            tracing::error!("[deploy] {e}");
        }
        // A pending signal is as good as a new one.
        let _ = self.halt_tx.try_send(());
    }

    fn is_artifact(&self, path: &Path) -> bool {
        has_artifact_extension(path, &self.extensions)
    }

    /// Re-scan changed paths and start whatever got deployed.
    fn redeploy(&self, paths: &[PathBuf], update_allowed: bool) -> Delivery {
        if self.is_halted() {
            return Delivery::Halt;
        }

        let mut handles = Vec::new();
        for path in paths {
            if path.is_dir() {
                handles.extend(self.install_directory(path));
            } else if self.is_artifact(path) {
                if let Outcome::Deployed(handle) = self.install_or_update(path, update_allowed) {
                    handles.push(handle);
                }
            } else {
                tracing::trace!("[deploy] not an artifact: {}", path.display());
            }
            if self.is_halted() {
                return Delivery::Halt;
            }
        }

        self.start_all(&handles);
        Delivery::Continue
    }
}

impl ChangeListener for Deployer {
    fn files_created(&self, paths: &[PathBuf]) -> Delivery {
        self.redeploy(paths, false)
    }

    fn files_modified(&self, paths: &[PathBuf]) -> Delivery {
        self.redeploy(paths, true)
    }

    fn files_deleted(&self, paths: &[PathBuf]) -> Delivery {
        // Removal from disk is left to the runtime's own lifecycle.
        crate::debug_event!("deploy", "deleted", "{} paths, not acted upon", paths.len());
        if self.is_halted() {
            Delivery::Halt
        } else {
            Delivery::Continue
        }
    }
}

fn files_first(a: &DirEntry, b: &DirEntry) -> CmpOrdering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    a_dir
        .cmp(&b_dir)
        .then_with(|| a.file_name().cmp(b.file_name()))
}
