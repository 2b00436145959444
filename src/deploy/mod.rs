//! Deployment: decisions, their application and the running agent.
//!
//! ```text
//!   runtime roots ──┐
//!                   ├─ startup ──► Deployer ──► DecisionEngine
//!   application ────┘                 ▲              │
//!   roots ──► RecursiveWatcher ───────┘              ▼
//!             (one per root)                   ModuleRegistry
//! ```
//!
//! The [`Agent`] owns the deployer and the watchers. It runs the startup
//! sequence, then waits until either the caller shuts it down or a
//! `StopAll` decision halts the runtime.

pub mod decision;
pub mod orchestrator;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::config::Settings;
use crate::registry::ModuleRegistry;
use crate::watcher::RecursiveWatcher;

pub use decision::{Action, DecisionEngine, SingletonPolicy};
pub use orchestrator::{Deployer, Outcome};

/// How the agent finished waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// A singleton conflict stopped the runtime.
    Halted,
    /// The deployer was dropped without halting.
    Closed,
}

/// The running deployment agent.
pub struct Agent {
    deployer: Arc<Deployer>,
    watchers: Vec<RecursiveWatcher>,
    halt: Receiver<()>,
}

impl Agent {
    /// Run the startup sequence against `registry`.
    ///
    /// Runtime roots are installed and started first, then application
    /// roots. Watchers are started for existing application roots only when
    /// `watch` is set and the runtime is still up.
    pub fn start(settings: &Settings, registry: Arc<dyn ModuleRegistry>, watch: bool) -> Self {
        let engine = DecisionEngine::new(
            SingletonPolicy::new(settings.singleton_namespaces.iter().cloned()),
            settings.update_only_snapshots,
        );
        let deployer = Arc::new(Deployer::new(
            registry,
            engine,
            settings.artifact_extensions.clone(),
        ));
        let halt = deployer.halt_signal();

        let mut agent = Self {
            deployer,
            watchers: Vec::new(),
            halt,
        };

        let runtime_roots = resolve_roots(&settings.runtime_dirs);
        let application_roots = resolve_roots(&settings.application_dirs);

        if !agent.deployer.deploy_roots("runtime", &runtime_roots) {
            return agent;
        }
        if !agent.deployer.deploy_roots("application", &application_roots) {
            return agent;
        }

        if watch {
            agent.watch(&application_roots, settings.debounce());
        }
        agent
    }

    fn watch(&mut self, roots: &[PathBuf], debounce: Duration) {
        for root in roots.iter().filter(|root| root.is_dir()) {
            let watcher = RecursiveWatcher::new(root.clone(), debounce, self.deployer.clone());
            match watcher.start() {
                Ok(()) => self.watchers.push(watcher),
                Err(e) => tracing::error!("[deploy] couldn't watch {}: {e}", root.display()),
            }
        }
    }

    pub fn deployer(&self) -> &Arc<Deployer> {
        &self.deployer
    }

    pub fn is_halted(&self) -> bool {
        self.deployer.is_halted()
    }

    /// Roots currently being watched.
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.watchers.iter().map(|w| w.root().to_path_buf()).collect()
    }

    /// Channel that receives a message when the runtime is stopped.
    pub fn halt_signal(&self) -> Receiver<()> {
        self.halt.clone()
    }

    /// Block until the runtime is halted.
    pub fn wait(&self) -> AgentStatus {
        if self.is_halted() {
            return AgentStatus::Halted;
        }
        match self.halt.recv() {
            Ok(()) => AgentStatus::Halted,
            Err(_) => AgentStatus::Closed,
        }
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<AgentStatus> {
        if self.is_halted() {
            return Some(AgentStatus::Halted);
        }
        match self.halt.recv_timeout(timeout) {
            Ok(()) => Some(AgentStatus::Halted),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(AgentStatus::Closed),
        }
    }

    /// Stop every watcher. Idempotent.
    pub fn shutdown(&mut self) {
        for watcher in self.watchers.drain(..) {
            watcher.stop();
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Absolute, symlink-free form of each root where it exists.
fn resolve_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots.iter().map(|root| resolve_root(root)).collect()
}

fn resolve_root(root: &Path) -> PathBuf {
    match root.canonicalize() {
        Ok(path) => path,
        Err(_) => root.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::testing::{archive, manifest};
    use crate::registry::{InMemoryRegistry, ModuleState, RegistryOp};
    use tempfile::TempDir;

    fn settings(root: &Path) -> Settings {
        Settings {
            runtime_dirs: vec![root.join("runtime")],
            application_dirs: vec![root.join("application")],
            singleton_namespaces: vec!["com.acme.".to_string()],
            debounce_ms: 50,
            ..Settings::default()
        }
    }

    fn write_jar(dir: &Path, file: &str, name: &str, version: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(file), archive(Some(&manifest(name, version, None)))).unwrap();
    }

    #[test]
    fn test_runtime_roots_deploy_before_application_roots() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path());
        write_jar(&temp_dir.path().join("application"), "app.jar", "org.app", "1.0.0");
        write_jar(&temp_dir.path().join("runtime"), "core.jar", "org.core", "1.0.0");

        let registry = Arc::new(InMemoryRegistry::new());
        let agent = Agent::start(&settings, registry.clone(), false);

        let names: Vec<_> = registry.modules().into_iter().map(|m| m.symbolic_name).collect();
        assert_eq!(names, vec!["org.core", "org.app"]);
        for module in registry.modules() {
            assert_eq!(registry.state_of(module.handle), Some(ModuleState::Active));
        }
        assert!(agent.watched_roots().is_empty());
        assert_eq!(agent.wait_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_watches_existing_application_roots_only() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = settings(temp_dir.path());
        settings.application_dirs.push(temp_dir.path().join("missing"));
        std::fs::create_dir_all(temp_dir.path().join("application")).unwrap();

        let mut agent = Agent::start(&settings, Arc::new(InMemoryRegistry::new()), true);

        let watched = agent.watched_roots();
        assert_eq!(watched.len(), 1);
        assert!(watched[0].ends_with("application"));

        agent.shutdown();
        assert!(agent.watched_roots().is_empty());
    }

    #[test]
    fn test_conflict_during_startup_halts_before_watching() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path());
        write_jar(&temp_dir.path().join("runtime"), "a.jar", "com.acme.x", "1.0.0");
        write_jar(&temp_dir.path().join("application"), "b.jar", "com.acme.x", "2.0.0");

        let registry = Arc::new(InMemoryRegistry::new());
        let agent = Agent::start(&settings, registry.clone(), true);

        assert!(agent.is_halted());
        assert_eq!(agent.wait(), AgentStatus::Halted);
        assert!(agent.watched_roots().is_empty());
        assert!(registry.operations().contains(&RegistryOp::StopEverything));
        // The conflicting application module is never installed.
        assert_eq!(registry.modules().len(), 1);
        assert_eq!(registry.operations().last(), Some(&RegistryOp::StopEverything));
    }
}
